//! Category impact: truncation and latency per prompt category

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::CategoryGroups;
use crate::stats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub response_count: usize,
    pub truncation_rate: f64,
    pub avg_response_time_ms: f64,
    /// `1 - truncation_rate`
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    /// Unweighted mean of category scores; 1.0 with no categories
    pub score: f64,
    pub categories: BTreeMap<String, CategoryScore>,
}

pub fn score_categories(groups: &CategoryGroups<'_>) -> CategoryResult {
    let categories: BTreeMap<String, CategoryScore> = groups
        .iter()
        .map(|(category, records)| {
            let truncation_rate = stats::truncation_rate(records);
            let score = CategoryScore {
                response_count: records.len(),
                truncation_rate,
                avg_response_time_ms: stats::average_latency_ms(records),
                score: 1.0 - truncation_rate,
            };
            (category.clone(), score)
        })
        .collect();

    let scores: Vec<f64> = categories.values().map(|c| c.score).collect();
    CategoryResult {
        score: if scores.is_empty() { 1.0 } else { stats::mean(&scores) },
        categories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{by_category, RecordDraft, ResponseRecord};

    #[test]
    fn test_score_categories() {
        let records: Vec<ResponseRecord> = vec![
            RecordDraft::new("a").with_category("short").with_latency_ms(100).build().unwrap(),
            RecordDraft::new("b").with_category("short").with_latency_ms(300).build().unwrap(),
            RecordDraft::new("c").with_category("long").with_latency_ms(900).truncated().build().unwrap(),
            RecordDraft::new("d").with_category("long").with_latency_ms(1100).build().unwrap(),
        ];
        let result = score_categories(&by_category(&records));

        let short = &result.categories["short"];
        assert_eq!(short.response_count, 2);
        assert_eq!(short.score, 1.0);
        assert_eq!(short.avg_response_time_ms, 200.0);

        let long = &result.categories["long"];
        assert_eq!(long.truncation_rate, 0.5);
        assert_eq!(long.score, 0.5);

        assert_eq!(result.score, 0.75);
    }

    #[test]
    fn test_no_categories() {
        let result = score_categories(&by_category(&[]));
        assert_eq!(result.score, 1.0);
        assert!(result.categories.is_empty());
    }

    #[test]
    fn test_order_independent() {
        let mut records: Vec<ResponseRecord> = vec![
            RecordDraft::new("a").with_category("short").with_latency_ms(100).build().unwrap(),
            RecordDraft::new("c").with_category("long").with_latency_ms(900).truncated().build().unwrap(),
            RecordDraft::new("b").with_category("short").with_latency_ms(300).truncated().build().unwrap(),
            RecordDraft::new("d").with_category("long").with_latency_ms(1100).build().unwrap(),
        ];
        let expected = score_categories(&by_category(&records));

        records.reverse();
        let result = score_categories(&by_category(&records));
        assert_eq!(result.categories.keys().collect::<Vec<_>>(), expected.categories.keys().collect::<Vec<_>>());
        assert!((result.score - expected.score).abs() < 1e-12);
        for (name, category) in &result.categories {
            assert_eq!(category.truncation_rate, expected.categories[name].truncation_rate);
            assert!((category.avg_response_time_ms - expected.categories[name].avg_response_time_ms).abs() < 1e-9);
        }
    }
}
