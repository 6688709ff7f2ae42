//! JSONL record store
//!
//! ## File Format
//!
//! One JSON object per line, as written by the load harness:
//!
//! ```json
//! {"prompt": "Explain ownership", "category": "short", "max_tokens": 256, "temperature": 0.7,
//!  "response": "...", "response_time_ms": 1840, "truncated": false, "test_phase": "STEADY"}
//! ```
//!
//! Lines that fail to parse or validate are skipped with a warning. Blank lines
//! are ignored. A missing or unreadable file is an error.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{grouping, CategoryGroups, PhaseGroups, PromptGroups, ResponseRecord, TruncationReason};

/// Ordered, read-only collection of records from one run
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    source: Option<PathBuf>,
    records: Vec<ResponseRecord>,
    skipped_lines: usize,
}

impl RecordStore {
    /// Load records from a JSONL file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read records file: {}", path.display()))?;

        let mut store = Self::parse(&content);
        store.source = Some(path.to_path_buf());

        tracing::info!(
            "Loaded {} records from {} ({} malformed lines skipped)",
            store.records.len(),
            path.display(),
            store.skipped_lines
        );

        Ok(store)
    }

    /// Parse JSONL content, skipping malformed lines
    pub fn parse(content: &str) -> Self {
        let mut records = Vec::new();
        let mut skipped_lines = 0;

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<ResponseRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped_lines += 1;
                    tracing::warn!("Skipping malformed record on line {}: {}", index + 1, e);
                }
            }
        }

        Self {
            source: None,
            records,
            skipped_lines,
        }
    }

    /// Build a store from records already in memory
    pub fn from_records(records: Vec<ResponseRecord>) -> Self {
        Self {
            source: None,
            records,
            skipped_lines: 0,
        }
    }

    pub fn records(&self) -> &[ResponseRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResponseRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Lines dropped during parsing
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    pub fn by_prompt(&self) -> PromptGroups<'_> {
        grouping::by_prompt(&self.records)
    }

    pub fn by_category(&self) -> CategoryGroups<'_> {
        grouping::by_category(&self.records)
    }

    pub fn by_phase(&self) -> PhaseGroups<'_> {
        grouping::by_phase(&self.records)
    }

    /// Number of distinct prompt texts
    pub fn unique_prompts(&self) -> usize {
        self.by_prompt().len()
    }

    pub fn truncation_stats(&self) -> TruncationStats {
        TruncationStats::from_records(&self.records)
    }
}

/// Truncation counts and reason breakdown for a set of records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TruncationStats {
    pub total: usize,
    pub truncated: usize,
    /// Fraction of records truncated (0.0 when empty)
    pub truncation_rate: f64,
    /// Truncated records per reason
    pub by_reason: BTreeMap<TruncationReason, usize>,
}

impl TruncationStats {
    pub fn from_records<R: Borrow<ResponseRecord>>(records: &[R]) -> Self {
        let mut by_reason = BTreeMap::new();
        let mut truncated = 0;

        for record in records {
            let record: &ResponseRecord = record.borrow();
            if record.is_truncated() {
                truncated += 1;
                *by_reason.entry(record.truncation_reason()).or_insert(0) += 1;
            }
        }

        let total = records.len();
        Self {
            total,
            truncated,
            truncation_rate: if total == 0 { 0.0 } else { truncated as f64 / total as f64 },
            by_reason,
        }
    }

    pub fn format_summary(&self) -> String {
        let reasons: Vec<String> = self
            .by_reason
            .iter()
            .map(|(reason, count)| format!("{}={}", reason.name(), count))
            .collect();

        format!(
            "{}/{} truncated ({:.1}%){}",
            self.truncated,
            self.total,
            self.truncation_rate * 100.0,
            if reasons.is_empty() {
                String::new()
            } else {
                format!(" [{}]", reasons.join(", "))
            }
        )
    }
}
