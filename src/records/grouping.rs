//! Partition records by prompt, category, or test phase
//!
//! Groups are keyed maps with deterministic (sorted) iteration. Within a group,
//! records keep their input order. Every record lands in exactly one group.

use std::collections::BTreeMap;

use super::{ResponseRecord, TestPhase};

/// Records sharing an identical prompt text
pub type PromptGroups<'a> = BTreeMap<String, Vec<&'a ResponseRecord>>;

/// Records sharing a category label
pub type CategoryGroups<'a> = BTreeMap<String, Vec<&'a ResponseRecord>>;

/// Records per test phase; `None` collects records without a phase
pub type PhaseGroups<'a> = BTreeMap<Option<TestPhase>, Vec<&'a ResponseRecord>>;

/// Group records by an arbitrary key
pub fn group_by<'a, K, I, F>(records: I, key_fn: F) -> BTreeMap<K, Vec<&'a ResponseRecord>>
where
    K: Ord,
    I: IntoIterator<Item = &'a ResponseRecord>,
    F: Fn(&ResponseRecord) -> K,
{
    let mut groups: BTreeMap<K, Vec<&'a ResponseRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(key_fn(record)).or_default().push(record);
    }
    groups
}

pub fn by_prompt(records: &[ResponseRecord]) -> PromptGroups<'_> {
    group_by(records, |r| r.prompt().to_string())
}

pub fn by_category(records: &[ResponseRecord]) -> CategoryGroups<'_> {
    group_by(records, |r| r.category().to_string())
}

pub fn by_phase(records: &[ResponseRecord]) -> PhaseGroups<'_> {
    group_by(records, |r| r.test_phase())
}
