//! Derived statistics snapshots.
//!
//! All of these are computed fresh on each call and never cached.

use std::collections::BTreeMap;

use serde::Serialize;

/// Summary of one numeric column.
///
/// `count` is the number of non-null values; every field always yields one
/// of these, so "no data" (`count == 0`, all aggregates `None`) stays
/// distinguishable from a zero value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub stddev: Option<f64>,
    pub count: u64,
    pub null_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_count: u64,
    /// field -> category -> count
    pub breakdowns: BTreeMap<String, BTreeMap<String, u64>>,
    /// field -> summary
    pub numeric: BTreeMap<String, NumericStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramResult {
    pub field: String,
    pub bins: Vec<HistogramBin>,
    pub min: f64,
    pub max: f64,
    pub bin_width: f64,
    pub total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub label: String,
    pub sample_ids: Vec<String>,
    pub total_variants: u64,
    pub unique_variants: u64,
    pub avg_variants_per_sample: f64,
    pub type_distribution: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapAnalysis {
    pub group1_only: u64,
    pub group2_only: u64,
    pub shared: u64,
    pub jaccard_index: f64,
    pub overlap_percentage: f64,
}

impl OverlapAnalysis {
    pub fn new(group1_only: u64, group2_only: u64, shared: u64) -> Self {
        let total = group1_only + group2_only + shared;
        let jaccard_index = if total > 0 {
            shared as f64 / total as f64
        } else {
            0.0
        };
        Self {
            group1_only,
            group2_only,
            shared,
            jaccard_index,
            overlap_percentage: jaccard_index * 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldComparison {
    pub field: String,
    pub group1: NumericStats,
    pub group2: NumericStats,
    /// Group 1 mean minus group 2 mean. `None` when either group has no
    /// values for the field.
    pub mean_difference: Option<f64>,
    /// The difference as a percentage of the group 1 mean.
    pub percent_difference: Option<f64>,
}

impl FieldComparison {
    pub fn new(field: impl Into<String>, group1: NumericStats, group2: NumericStats) -> Self {
        let mean_difference = match (group1.mean, group2.mean) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        };
        let percent_difference = match (mean_difference, group1.mean) {
            (Some(diff), Some(base)) if base != 0.0 => Some(diff / base.abs() * 100.0),
            _ => None,
        };
        Self {
            field: field.into(),
            group1,
            group2,
            mean_difference,
            percent_difference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub group1: GroupStats,
    pub group2: GroupStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap: Option<OverlapAnalysis>,
    pub field_comparisons: Vec<FieldComparison>,
}

/// Dense row-by-column count matrix. Missing combinations are zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossTabResult {
    pub row_field: String,
    pub column_field: String,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub data: Vec<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_totals: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_totals: Option<Vec<u64>>,
    pub grand_total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(2, 3, 5, 0.5)]
    #[case(0, 0, 4, 1.0)]
    #[case(3, 1, 0, 0.0)]
    #[case(0, 0, 0, 0.0)]
    fn test_overlap_jaccard(
        #[case] g1: u64,
        #[case] g2: u64,
        #[case] shared: u64,
        #[case] expected: f64,
    ) {
        let overlap = OverlapAnalysis::new(g1, g2, shared);
        assert!((overlap.jaccard_index - expected).abs() < 1e-9);
        assert!((overlap.overlap_percentage - expected * 100.0).abs() < 1e-9);
    }

    #[rstest]
    fn test_mean_difference_requires_both_means() {
        let with_mean = |m: Option<f64>| NumericStats {
            mean: m,
            ..Default::default()
        };
        let both = FieldComparison::new("quality", with_mean(Some(30.0)), with_mean(Some(20.0)));
        assert_eq!(both.mean_difference, Some(10.0));
        let pct = both.percent_difference.unwrap();
        assert!((pct - 33.333_333).abs() < 1e-3);

        let zero_base = FieldComparison::new("depth", with_mean(Some(0.0)), with_mean(Some(5.0)));
        assert_eq!(zero_base.mean_difference, Some(-5.0));
        assert_eq!(zero_base.percent_difference, None);

        let missing = FieldComparison::new("quality", with_mean(None), with_mean(Some(20.0)));
        assert_eq!(missing.mean_difference, None);
    }
}
