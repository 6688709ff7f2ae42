//! Small statistics helpers shared by the scorers
//!
//! All helpers return 0.0 for empty input rather than NaN.

use std::borrow::Borrow;

use crate::records::ResponseRecord;

/// Arithmetic mean
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Nearest-rank percentile (`p` in 0..=100)
///
/// Index is `ceil(p/100 * n) - 1`, clamped to the valid range.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p / 100.0 * sorted.len() as f64).ceil() as i64 - 1;
    let index = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    sorted[index]
}

/// Minimum and maximum, or `None` for empty input
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

pub(crate) fn record_ref<R: Borrow<ResponseRecord>>(record: &R) -> &ResponseRecord {
    record.borrow()
}

/// Fraction of records marked truncated
pub fn truncation_rate<R: Borrow<ResponseRecord>>(records: &[R]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let truncated = records.iter().filter(|r| record_ref(*r).is_truncated()).count();
    truncated as f64 / records.len() as f64
}

/// Response latencies in milliseconds
pub fn latencies<R: Borrow<ResponseRecord>>(records: &[R]) -> Vec<f64> {
    records
        .iter()
        .map(|r| record_ref(r).response_time_ms() as f64)
        .collect()
}

/// Mean response latency in milliseconds
pub fn average_latency_ms<R: Borrow<ResponseRecord>>(records: &[R]) -> f64 {
    mean(&latencies(records))
}

/// Mean time to first token in milliseconds
pub fn average_ttft_ms<R: Borrow<ResponseRecord>>(records: &[R]) -> f64 {
    let ttfts: Vec<f64> = records.iter().map(|r| record_ref(r).ttft_ms() as f64).collect();
    mean(&ttfts)
}
