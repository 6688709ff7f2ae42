//! Response records captured by the load harness
//!
//! One [`ResponseRecord`] per prompt invocation. Records are built once from a
//! [`RecordDraft`] (the JSONL line shape) and are read-only afterwards.
//!
//! ## Invariants
//!
//! - `response_length` is always the character count of `response` (0 when absent)
//! - a truncation reason other than `NONE` forces `truncated = true`
//! - `max_tokens` is positive and `temperature` is finite

pub mod grouping;
pub mod loader;

use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub use grouping::{by_category, by_phase, by_prompt, group_by, CategoryGroups, PhaseGroups, PromptGroups};
pub use loader::{RecordStore, TruncationStats};

/// Why a streamed response stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TruncationReason {
    #[default]
    None,
    Timeout,
    BufferOverflow,
}

impl TruncationReason {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Timeout => "TIMEOUT",
            Self::BufferOverflow => "BUFFER_OVERFLOW",
        }
    }
}

/// Load-test window a record was captured in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestPhase {
    /// Initial ramp-up of virtual users
    Ramp,
    /// Sustained load after the ramp
    Steady,
}

impl TestPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ramp => "RAMP",
            Self::Steady => "STEADY",
        }
    }
}

/// Mutable staging shape of a record, as written by the load harness
///
/// Also serves as a builder for tests and tooling:
///
/// ```rust
/// use consistency_benchmark::records::{RecordDraft, TruncationReason};
///
/// let record = RecordDraft::new("Explain ownership")
///     .with_category("short")
///     .with_response("Ownership moves values between bindings.")
///     .truncated_by(TruncationReason::Timeout)
///     .build()
///     .unwrap();
/// assert!(record.is_truncated());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordDraft {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub chunk_id: Option<String>,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub category: String,
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub response: Option<String>,
    /// Accepted for schema compatibility; always recomputed from `response`
    #[serde(default)]
    pub response_length: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response_time_ms: u64,
    #[serde(default)]
    pub ttft_ms: u64,
    #[serde(default)]
    pub total_chunks: u32,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub truncation_reason: Option<TruncationReason>,
    #[serde(default)]
    pub test_phase: Option<TestPhase>,
    #[serde(default)]
    pub timeout_used_ms: u64,
}

impl RecordDraft {
    /// Start a draft with sensible defaults for everything but the prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 256,
            temperature: 0.7,
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn without_response(mut self) -> Self {
        self.response = None;
        self
    }

    pub fn with_latency_ms(mut self, response_time_ms: u64) -> Self {
        self.response_time_ms = response_time_ms;
        self
    }

    pub fn with_ttft_ms(mut self, ttft_ms: u64) -> Self {
        self.ttft_ms = ttft_ms;
        self
    }

    pub fn with_phase(mut self, phase: TestPhase) -> Self {
        self.test_phase = Some(phase);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Mark as truncated without a specific reason
    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    pub fn truncated_by(mut self, reason: TruncationReason) -> Self {
        self.truncation_reason = Some(reason);
        self
    }

    /// Validate and freeze into an immutable record
    pub fn build(self) -> Result<ResponseRecord> {
        ResponseRecord::try_from(self)
    }
}

/// One captured response to one prompt invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordDraft")]
pub struct ResponseRecord {
    session_id: Option<String>,
    chunk_id: Option<String>,
    user_id: i64,
    category: String,
    prompt: String,
    max_tokens: u32,
    temperature: f64,
    response: Option<String>,
    response_length: usize,
    timestamp: Option<DateTime<Utc>>,
    response_time_ms: u64,
    ttft_ms: u64,
    total_chunks: u32,
    truncated: bool,
    truncation_reason: TruncationReason,
    test_phase: Option<TestPhase>,
    timeout_used_ms: u64,
}

impl TryFrom<RecordDraft> for ResponseRecord {
    type Error = anyhow::Error;

    fn try_from(draft: RecordDraft) -> Result<Self> {
        ensure!(draft.max_tokens > 0, "max_tokens must be a positive integer");
        ensure!(
            draft.temperature.is_finite(),
            "temperature must be a real number, got {}",
            draft.temperature
        );

        let truncation_reason = draft.truncation_reason.unwrap_or_default();
        let response_length = draft
            .response
            .as_deref()
            .map(|text| text.chars().count())
            .unwrap_or(0);

        Ok(Self {
            session_id: draft.session_id,
            chunk_id: draft.chunk_id,
            user_id: draft.user_id,
            category: draft.category,
            prompt: draft.prompt,
            max_tokens: draft.max_tokens,
            temperature: draft.temperature,
            response: draft.response,
            response_length,
            timestamp: draft.timestamp,
            response_time_ms: draft.response_time_ms,
            ttft_ms: draft.ttft_ms,
            total_chunks: draft.total_chunks,
            truncated: draft.truncated || truncation_reason != TruncationReason::None,
            truncation_reason,
            test_phase: draft.test_phase,
            timeout_used_ms: draft.timeout_used_ms,
        })
    }
}

impl ResponseRecord {
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn chunk_id(&self) -> Option<&str> {
        self.chunk_id.as_deref()
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Response text, or `None` if the harness captured nothing
    pub fn response_text(&self) -> Option<&str> {
        self.response.as_deref()
    }

    /// Response text with a missing response read as empty
    pub fn response(&self) -> &str {
        self.response.as_deref().unwrap_or("")
    }

    /// Character count of the response
    pub fn response_length(&self) -> usize {
        self.response_length
    }

    pub fn has_empty_response(&self) -> bool {
        self.response.as_deref().map_or(true, str::is_empty)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn response_time_ms(&self) -> u64 {
        self.response_time_ms
    }

    pub fn ttft_ms(&self) -> u64 {
        self.ttft_ms
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn truncation_reason(&self) -> TruncationReason {
        self.truncation_reason
    }

    pub fn test_phase(&self) -> Option<TestPhase> {
        self.test_phase
    }

    pub fn timeout_used_ms(&self) -> u64 {
        self.timeout_used_ms
    }

    /// Non-truncated with non-empty text: eligible for similarity analysis
    pub fn is_complete(&self) -> bool {
        !self.truncated && !self.has_empty_response()
    }
}

/// Accept RFC 3339 strings or (fractional) epoch seconds
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Text(String),
        Seconds(f64),
    }

    match Option::<RawTimestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawTimestamp::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
        Some(RawTimestamp::Seconds(seconds)) => {
            let whole = seconds.floor();
            let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);
            DateTime::from_timestamp(whole as i64, nanos)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", seconds)))
        }
    }
}
