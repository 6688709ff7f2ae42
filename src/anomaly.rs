//! Record-level anomaly detection and descriptive statistics
//!
//! Runs over the full ungrouped record set. Findings are informational: they
//! are reported next to the consistency score but never weighted into it.

use std::borrow::Borrow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::{group_by, ResponseRecord};
use crate::stats::{self, record_ref};

pub use crate::stats::percentile;

/// Standard deviations above the mean that make a latency an outlier
pub const LATENCY_SIGMA: f64 = 3.0;
/// Category whose prompts are expected to always complete
pub const SHORT_CATEGORY: &str = "short";

const ANOMALY_PROMPT_PREVIEW_LEN: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalySeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl AnomalySeverity {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    LatencyOutlier,
    ShortPromptTruncated,
    EmptyResponse,
}

impl AnomalyKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LatencyOutlier => "LATENCY_OUTLIER",
            Self::ShortPromptTruncated => "SHORT_PROMPT_TRUNCATED",
            Self::EmptyResponse => "EMPTY_RESPONSE",
        }
    }

    /// Fixed severity per kind
    pub fn severity(&self) -> AnomalySeverity {
        match self {
            Self::LatencyOutlier => AnomalySeverity::Warning,
            Self::ShortPromptTruncated | Self::EmptyResponse => AnomalySeverity::Error,
        }
    }
}

/// A flagged record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    kind: AnomalyKind,
    prompt: String,
    description: String,
    severity: AnomalySeverity,
}

impl Anomaly {
    fn new(kind: AnomalyKind, record: &ResponseRecord, description: String) -> Self {
        Self {
            kind,
            prompt: record.prompt().to_string(),
            description,
            severity: kind.severity(),
        }
    }

    pub fn kind(&self) -> AnomalyKind {
        self.kind
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn severity(&self) -> AnomalySeverity {
        self.severity
    }

    /// `[SEVERITY] KIND: description (prompt: first 40 chars)`
    pub fn format_line(&self) -> String {
        let prompt: String = self.prompt.chars().take(ANOMALY_PROMPT_PREVIEW_LEN).collect();
        format!(
            "[{}] {}: {} (prompt: {})",
            self.severity.name(),
            self.kind.name(),
            self.description,
            prompt
        )
    }
}

/// Flag latency outliers, truncated short prompts and empty responses
///
/// A single record may produce several anomalies.
pub fn detect_anomalies<R: Borrow<ResponseRecord>>(records: &[R]) -> Vec<Anomaly> {
    let latencies = stats::latencies(records);
    let threshold = stats::mean(&latencies) + LATENCY_SIGMA * stats::std_dev(&latencies);

    let mut anomalies = Vec::new();
    for record in records.iter().map(record_ref) {
        let latency = record.response_time_ms() as f64;
        if latency > threshold {
            anomalies.push(Anomaly::new(
                AnomalyKind::LatencyOutlier,
                record,
                format!("Latency {:.0}ms exceeds threshold {:.0}ms", latency, threshold),
            ));
        }

        if record.category() == SHORT_CATEGORY && record.is_truncated() {
            anomalies.push(Anomaly::new(
                AnomalyKind::ShortPromptTruncated,
                record,
                format!("Short prompt was truncated after {}ms", record.response_time_ms()),
            ));
        }

        if record.has_empty_response() {
            anomalies.push(Anomaly::new(
                AnomalyKind::EmptyResponse,
                record,
                "Response was empty".to_string(),
            ));
        }
    }

    anomalies
}

/// Anomalies with per-severity counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub total: usize,
    pub by_severity: BTreeMap<AnomalySeverity, usize>,
    pub anomalies: Vec<Anomaly>,
}

impl AnomalyReport {
    pub fn from_records<R: Borrow<ResponseRecord>>(records: &[R]) -> Self {
        Self::from_anomalies(detect_anomalies(records))
    }

    pub fn from_anomalies(anomalies: Vec<Anomaly>) -> Self {
        let mut by_severity = BTreeMap::new();
        for anomaly in &anomalies {
            *by_severity.entry(anomaly.severity()).or_insert(0) += 1;
        }
        Self {
            total: anomalies.len(),
            by_severity,
            anomalies,
        }
    }

    pub fn count(&self, severity: AnomalySeverity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    pub fn format_summary(&self) -> String {
        let parts: Vec<String> = self
            .by_severity
            .iter()
            .rev()
            .map(|(severity, count)| format!("{} {}", count, severity.name()))
            .collect();
        if parts.is_empty() {
            "No anomalies".to_string()
        } else {
            format!("{} anomalies ({})", self.total, parts.join(", "))
        }
    }
}

// =============================================================================
// DISTRIBUTIONS
// =============================================================================

/// Response length distribution in characters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LengthDistribution {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    /// Upper median (`sorted[n / 2]`)
    pub median: usize,
    pub std_dev: f64,
}

pub fn length_distribution<R: Borrow<ResponseRecord>>(records: &[R]) -> LengthDistribution {
    let mut lengths: Vec<usize> = records.iter().map(|r| record_ref(r).response_length()).collect();
    if lengths.is_empty() {
        return LengthDistribution::default();
    }
    lengths.sort_unstable();

    let as_f64: Vec<f64> = lengths.iter().map(|&l| l as f64).collect();
    LengthDistribution {
        min: lengths[0],
        max: lengths[lengths.len() - 1],
        mean: stats::mean(&as_f64),
        median: lengths[lengths.len() / 2],
        std_dev: stats::std_dev(&as_f64),
    }
}

/// Latency summary in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl LatencyStats {
    pub fn from_values(values: &[f64]) -> Self {
        let (min, max) = stats::min_max(values).unwrap_or((0.0, 0.0));
        Self {
            mean: stats::mean(values),
            min,
            max,
            std_dev: stats::std_dev(values),
        }
    }
}

/// Nearest-rank latency percentiles in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl LatencyPercentiles {
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            p50: percentile(values, 50.0),
            p90: percentile(values, 90.0),
            p95: percentile(values, 95.0),
            p99: percentile(values, 99.0),
        }
    }
}

/// Truncation rate per category label
pub fn truncation_by_category(records: &[ResponseRecord]) -> BTreeMap<String, f64> {
    group_by(records, |r| r.category().to_string())
        .into_iter()
        .map(|(category, group)| (category, stats::truncation_rate(&group)))
        .collect()
}

/// Latency summary per category label
pub fn latency_by_category(records: &[ResponseRecord]) -> BTreeMap<String, LatencyStats> {
    group_by(records, |r| r.category().to_string())
        .into_iter()
        .map(|(category, group)| (category, LatencyStats::from_values(&stats::latencies(&group))))
        .collect()
}

/// Descriptive statistics over a full record set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordStatistics {
    pub response_length: LengthDistribution,
    pub latency: LatencyStats,
    pub latency_percentiles: LatencyPercentiles,
    pub truncation_by_category: BTreeMap<String, f64>,
    pub latency_by_category: BTreeMap<String, LatencyStats>,
}

impl RecordStatistics {
    pub fn from_records(records: &[ResponseRecord]) -> Self {
        let latencies = stats::latencies(records);
        Self {
            response_length: length_distribution(records),
            latency: LatencyStats::from_values(&latencies),
            latency_percentiles: LatencyPercentiles::from_values(&latencies),
            truncation_by_category: truncation_by_category(records),
            latency_by_category: latency_by_category(records),
        }
    }
}
