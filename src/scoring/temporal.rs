//! Temporal degradation: RAMP vs STEADY truncation

use serde::{Deserialize, Serialize};

use crate::records::{PhaseGroups, ResponseRecord, TestPhase};
use crate::stats;

/// Truncation-rate increase that counts as degradation
pub const DEGRADATION_THRESHOLD: f64 = 0.10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalResult {
    /// `1 - max(0, degradation_magnitude)`
    pub score: f64,
    pub ramp_truncation_rate: f64,
    pub steady_truncation_rate: f64,
    pub ramp_avg_response_time_ms: f64,
    pub steady_avg_response_time_ms: f64,
    pub degradation_detected: bool,
    /// Steady minus ramp truncation rate; negative means steady improved
    pub degradation_magnitude: f64,
}

/// Compare two phases directly
pub fn compare_phases(ramp: &[&ResponseRecord], steady: &[&ResponseRecord]) -> TemporalResult {
    let ramp_truncation_rate = stats::truncation_rate(ramp);
    let steady_truncation_rate = stats::truncation_rate(steady);
    let degradation = steady_truncation_rate - ramp_truncation_rate;

    TemporalResult {
        score: 1.0 - degradation.max(0.0),
        ramp_truncation_rate,
        steady_truncation_rate,
        ramp_avg_response_time_ms: stats::average_latency_ms(ramp),
        steady_avg_response_time_ms: stats::average_latency_ms(steady),
        degradation_detected: degradation > DEGRADATION_THRESHOLD,
        degradation_magnitude: degradation,
    }
}

/// Score phase groups; a missing phase is treated as empty
pub fn score_temporal(phases: &PhaseGroups<'_>) -> TemporalResult {
    let ramp = phases.get(&Some(TestPhase::Ramp)).map(Vec::as_slice).unwrap_or(&[]);
    let steady = phases.get(&Some(TestPhase::Steady)).map(Vec::as_slice).unwrap_or(&[]);
    compare_phases(ramp, steady)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{by_phase, RecordDraft, TruncationReason};

    fn phase_records(phase: TestPhase, total: usize, truncated: usize) -> Vec<ResponseRecord> {
        (0..total)
            .map(|i| {
                let draft = RecordDraft::new("p").with_response("ok").with_phase(phase).with_latency_ms(100);
                if i < truncated {
                    draft.truncated_by(TruncationReason::Timeout)
                } else {
                    draft
                }
                .build()
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_degradation_detected() {
        let mut records = phase_records(TestPhase::Ramp, 10, 0);
        records.extend(phase_records(TestPhase::Steady, 10, 2));

        let result = score_temporal(&by_phase(&records));
        assert_eq!(result.ramp_truncation_rate, 0.0);
        assert!((result.steady_truncation_rate - 0.20).abs() < 1e-12);
        assert!((result.degradation_magnitude - 0.20).abs() < 1e-12);
        assert!(result.degradation_detected);
        assert!((result.score - 0.80).abs() < 1e-12);
    }

    #[test]
    fn test_improvement_not_rewarded() {
        let mut records = phase_records(TestPhase::Ramp, 10, 5);
        records.extend(phase_records(TestPhase::Steady, 10, 0));

        let result = score_temporal(&by_phase(&records));
        assert!(result.degradation_magnitude < 0.0);
        assert!(!result.degradation_detected);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_missing_phases() {
        let records = vec![RecordDraft::new("p").truncated().build().unwrap()];
        let result = score_temporal(&by_phase(&records));
        assert_eq!(result.ramp_truncation_rate, 0.0);
        assert_eq!(result.steady_truncation_rate, 0.0);
        assert_eq!(result.score, 1.0);
        assert!(!result.degradation_detected);
    }

    #[test]
    fn test_small_degradation_below_threshold() {
        let mut records = phase_records(TestPhase::Ramp, 10, 0);
        records.extend(phase_records(TestPhase::Steady, 10, 1));
        let result = score_temporal(&by_phase(&records));
        assert!(!result.degradation_detected);
        assert!((result.score - 0.9).abs() < 1e-12);
        assert_eq!(result.steady_avg_response_time_ms, 100.0);
    }

    #[test]
    fn test_order_independent() {
        let mut records = phase_records(TestPhase::Ramp, 10, 1);
        records.extend(phase_records(TestPhase::Steady, 10, 4));
        let expected = score_temporal(&by_phase(&records));

        records.reverse();
        let result = score_temporal(&by_phase(&records));
        assert_eq!(result.degradation_detected, expected.degradation_detected);
        assert!((result.score - expected.score).abs() < 1e-12);
        assert!((result.degradation_magnitude - expected.degradation_magnitude).abs() < 1e-12);
    }
}
