//! Statistics over an analytical table, computed in the engine.
//!
//! Every figure comes from an aggregate query; no result set larger than the
//! number of categories or bins is ever pulled into memory. Results are
//! fresh snapshots and are never cached.

mod sql;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::backend::Value;
use crate::client::Client;
use crate::error::DbError;
use crate::query_builder::CompiledQuery;
use crate::types::{
    ComparisonResult, CrossTabResult, FieldComparison, GroupStats, HistogramBin,
    HistogramResult, NumericStats, OverlapAnalysis, QueryResult, Statistics,
};

pub const DEFAULT_HISTOGRAM_BINS: u32 = 20;

/// Equality filter: the column must equal one of `values`. An empty value
/// list matches no rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub values: Vec<Value>,
}

impl Filter {
    pub fn new<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            values: vec![value.into()],
        }
    }
}

/// Which table and columns the statistics run against.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub table: String,
    pub sample_column: String,
    /// Identity used for distinct counts and group overlap.
    pub id_column: String,
    /// Category reported as each group's type distribution.
    pub type_field: String,
    pub categorical_fields: Vec<String>,
    pub numeric_fields: Vec<String>,
    pub compare_fields: Vec<String>,
}

impl Default for TableLayout {
    fn default() -> Self {
        let strings = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            table: "variants".to_string(),
            sample_column: "sampleId".to_string(),
            id_column: "id".to_string(),
            type_field: "variantType".to_string(),
            categorical_fields: strings(&["variantType", "chromosome", "clinicalSignificance"]),
            numeric_fields: strings(&[
                "populationFrequency",
                "quality",
                "depth",
                "caddScore",
                "revelScore",
            ]),
            compare_fields: strings(&["populationFrequency", "caddScore", "quality"]),
        }
    }
}

impl TableLayout {
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Restrict to rows belonging to these samples.
    pub fn sample_filter(&self, sample_ids: &[String]) -> Filter {
        Filter::new(self.sample_column.clone(), sample_ids.iter().cloned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatisticsParams {
    pub filters: Vec<Filter>,
    /// Categorical fields to break down. Defaults to the layout's.
    pub group_by: Option<Vec<String>>,
    /// Numeric fields to summarize. Defaults to the layout's.
    pub numeric_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct HistogramParams {
    pub field: String,
    pub bins: u32,
    /// Explicit lower bound. Detected from the data when absent.
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub filters: Vec<Filter>,
}

impl HistogramParams {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            bins: DEFAULT_HISTOGRAM_BINS,
            min: None,
            max: None,
            filters: Vec::new(),
        }
    }

    pub fn with_bins(mut self, bins: u32) -> Self {
        self.bins = bins;
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleGroup {
    pub name: String,
    pub sample_ids: Vec<String>,
}

impl SampleGroup {
    pub fn new<I, S>(name: impl Into<String>, sample_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            sample_ids: sample_ids.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompareGroupsParams {
    pub group1: SampleGroup,
    pub group2: SampleGroup,
    /// Numeric fields to compare. Defaults to the layout's compare fields.
    pub fields: Option<Vec<String>>,
    pub include_overlap: bool,
}

#[derive(Debug, Clone)]
pub struct CrossTabParams {
    pub row_field: String,
    pub column_field: String,
    pub filters: Vec<Filter>,
    pub include_totals: bool,
}

impl CrossTabParams {
    pub fn new(row_field: impl Into<String>, column_field: impl Into<String>) -> Self {
        Self {
            row_field: row_field.into(),
            column_field: column_field.into(),
            filters: Vec::new(),
            include_totals: true,
        }
    }
}

pub struct StatisticsService {
    client: Arc<Client>,
    layout: TableLayout,
}

impl StatisticsService {
    pub fn new(client: Arc<Client>) -> Self {
        Self::with_layout(client, TableLayout::default())
    }

    pub fn with_layout(client: Arc<Client>, layout: TableLayout) -> Self {
        Self { client, layout }
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    async fn run(&self, query: CompiledQuery) -> Result<QueryResult, DbError> {
        self.client.execute(&query.sql, &query.params).await
    }

    /// Total count, one breakdown per categorical field, and one summary per
    /// numeric field.
    #[instrument(skip_all, fields(table = %self.layout.table))]
    pub async fn get_statistics(&self, params: &StatisticsParams) -> Result<Statistics, DbError> {
        let table = &self.layout.table;
        let total = sql::total_count(table, &params.filters);
        let total_count = self.client.execute_count(&total.sql, &total.params).await?;

        let group_by = params
            .group_by
            .as_ref()
            .unwrap_or(&self.layout.categorical_fields);
        let mut breakdowns = BTreeMap::new();
        for field in group_by {
            let counts = self.counts_by(field, &params.filters).await?;
            breakdowns.insert(field.clone(), counts);
        }

        let numeric_fields = params
            .numeric_fields
            .as_ref()
            .unwrap_or(&self.layout.numeric_fields);
        let mut numeric = BTreeMap::new();
        for field in numeric_fields {
            let stats = self.numeric_stats(field, &params.filters).await?;
            numeric.insert(field.clone(), stats);
        }

        debug!(total_count, breakdowns = breakdowns.len(), "statistics computed");
        Ok(Statistics {
            total_count,
            breakdowns,
            numeric,
        })
    }

    async fn counts_by(
        &self,
        field: &str,
        filters: &[Filter],
    ) -> Result<BTreeMap<String, u64>, DbError> {
        let result = self.run(sql::breakdown(&self.layout.table, field, filters)).await?;
        Ok(result
            .rows()
            .iter()
            .map(|row| {
                let label = row.get("value").map(Value::to_label).unwrap_or_default();
                (label, count_of(row.get_i64("count")))
            })
            .collect())
    }

    async fn numeric_stats(&self, field: &str, filters: &[Filter]) -> Result<NumericStats, DbError> {
        let result = self
            .run(sql::numeric_stats(&self.layout.table, field, filters))
            .await?;
        let Some(row) = result.first() else {
            return Ok(NumericStats::default());
        };
        Ok(NumericStats {
            min: row.get_f64("min"),
            max: row.get_f64("max"),
            mean: row.get_f64("mean"),
            median: row.get_f64("median"),
            stddev: row.get_f64("stddev"),
            count: count_of(row.get_i64("count")),
            null_count: count_of(row.get_i64("null_count")),
        })
    }

    /// Dense histogram of `bins` bins over `[min, max]`.
    ///
    /// Bins are half-open except the last, which includes `max`. Bounds
    /// given in reverse are swapped. With a zero-width range every value
    /// lands in the first bin.
    #[instrument(skip_all, fields(field = %params.field, bins = params.bins))]
    pub async fn get_histogram(&self, params: &HistogramParams) -> Result<HistogramResult, DbError> {
        if params.bins == 0 {
            return Err(DbError::invalid_config("Histogram needs at least one bin"));
        }
        let table = &self.layout.table;
        let field = &params.field;

        let (low, high) = match (params.min, params.max) {
            (Some(low), Some(high)) => (low, high),
            (min, max) => {
                let range = self.run(sql::value_range(table, field, &params.filters)).await?;
                let row = range.first();
                let detected_min = row.and_then(|r| r.get_f64("min"));
                let detected_max = row.and_then(|r| r.get_f64("max"));
                (
                    min.or(detected_min).unwrap_or(0.0),
                    max.or(detected_max).unwrap_or(0.0),
                )
            }
        };
        let (low, high) = if high < low { (high, low) } else { (low, high) };
        let bin_count = params.bins as usize;
        let bin_width = (high - low) / f64::from(params.bins);

        let mut counts = vec![0u64; bin_count];
        if bin_width > 0.0 {
            let query = sql::histogram_buckets(table, field, &params.filters, low, high, params.bins);
            for row in self.run(query).await?.rows() {
                let Some(bucket) = row.get_i64("bucket") else {
                    continue;
                };
                if (1..=bin_count as i64).contains(&bucket) {
                    counts[(bucket - 1) as usize] += count_of(row.get_i64("count"));
                }
            }
        } else {
            let query = sql::range_count(table, field, &params.filters, low, high);
            counts[0] = self.client.execute_count(&query.sql, &query.params).await?;
        }

        let total_count: u64 = counts.iter().sum();
        let bins = counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                start: low + i as f64 * bin_width,
                end: if i + 1 == bin_count {
                    high
                } else {
                    low + (i + 1) as f64 * bin_width
                },
                count,
                percentage: if total_count > 0 {
                    count as f64 / total_count as f64 * 100.0
                } else {
                    0.0
                },
            })
            .collect();

        Ok(HistogramResult {
            field: field.clone(),
            bins,
            min: low,
            max: high,
            bin_width,
            total_count,
        })
    }

    /// Independent statistics for two sample groups, optional overlap of
    /// their distinct ids, and per-field mean comparisons.
    #[instrument(skip_all, fields(group1 = %params.group1.name, group2 = %params.group2.name))]
    pub async fn compare_groups(
        &self,
        params: &CompareGroupsParams,
    ) -> Result<ComparisonResult, DbError> {
        let group1 = self.group_stats(&params.group1).await?;
        let group2 = self.group_stats(&params.group2).await?;

        let overlap = if params.include_overlap {
            let query = sql::overlap(
                &self.layout,
                &params.group1.sample_ids,
                &params.group2.sample_ids,
            );
            let result = self.run(query).await?;
            let row = result.first();
            let read = |column: &str| count_of(row.and_then(|r| r.get_i64(column)));
            Some(OverlapAnalysis::new(
                read("group1_only"),
                read("group2_only"),
                read("shared"),
            ))
        } else {
            None
        };

        let fields = params
            .fields
            .as_ref()
            .unwrap_or(&self.layout.compare_fields);
        let g1_filter = [self.layout.sample_filter(&params.group1.sample_ids)];
        let g2_filter = [self.layout.sample_filter(&params.group2.sample_ids)];
        let mut field_comparisons = Vec::with_capacity(fields.len());
        for field in fields {
            let a = self.numeric_stats(field, &g1_filter).await?;
            let b = self.numeric_stats(field, &g2_filter).await?;
            field_comparisons.push(FieldComparison::new(field.clone(), a, b));
        }

        Ok(ComparisonResult {
            group1,
            group2,
            overlap,
            field_comparisons,
        })
    }

    async fn group_stats(&self, group: &SampleGroup) -> Result<GroupStats, DbError> {
        let result = self
            .run(sql::group_counts(&self.layout, &group.sample_ids))
            .await?;
        let row = result.first();
        let total_variants = count_of(row.and_then(|r| r.get_i64("total")));
        let unique_variants = count_of(row.and_then(|r| r.get_i64("unique_count")));

        let filter = [self.layout.sample_filter(&group.sample_ids)];
        let type_distribution = self.counts_by(&self.layout.type_field, &filter).await?;

        let avg_variants_per_sample = if group.sample_ids.is_empty() {
            0.0
        } else {
            total_variants as f64 / group.sample_ids.len() as f64
        };

        Ok(GroupStats {
            label: group.name.clone(),
            sample_ids: group.sample_ids.clone(),
            total_variants,
            unique_variants,
            avg_variants_per_sample,
            type_distribution,
        })
    }

    /// Dense row-by-column count matrix over two categorical fields.
    #[instrument(skip_all, fields(row = %params.row_field, column = %params.column_field))]
    pub async fn get_cross_tab(&self, params: &CrossTabParams) -> Result<CrossTabResult, DbError> {
        let table = &self.layout.table;
        let row_labels = self
            .distinct_labels(&params.row_field, &params.filters)
            .await?;
        let column_labels = self
            .distinct_labels(&params.column_field, &params.filters)
            .await?;

        let query = sql::cross_counts(table, &params.row_field, &params.column_field, &params.filters);
        let mut cells: HashMap<(String, String), u64> = HashMap::new();
        for row in self.run(query).await?.rows() {
            let r = row.get("row_val").map(Value::to_label).unwrap_or_default();
            let c = row.get("col_val").map(Value::to_label).unwrap_or_default();
            *cells.entry((r, c)).or_default() += count_of(row.get_i64("count"));
        }

        let data: Vec<Vec<u64>> = row_labels
            .iter()
            .map(|r| {
                column_labels
                    .iter()
                    .map(|c| cells.get(&(r.clone(), c.clone())).copied().unwrap_or(0))
                    .collect()
            })
            .collect();

        let row_totals: Vec<u64> = data.iter().map(|row| row.iter().sum()).collect();
        let column_totals: Vec<u64> = (0..column_labels.len())
            .map(|j| data.iter().map(|row| row[j]).sum())
            .collect();
        let grand_total = row_totals.iter().sum();

        Ok(CrossTabResult {
            row_field: params.row_field.clone(),
            column_field: params.column_field.clone(),
            row_labels,
            column_labels,
            data,
            row_totals: params.include_totals.then_some(row_totals),
            column_totals: params.include_totals.then_some(column_totals),
            grand_total,
        })
    }

    async fn distinct_labels(&self, field: &str, filters: &[Filter]) -> Result<Vec<String>, DbError> {
        let result = self
            .run(sql::distinct_values(&self.layout.table, field, filters))
            .await?;
        Ok(result
            .rows()
            .iter()
            .map(|row| row.get("value").map(Value::to_label).unwrap_or_default())
            .collect())
    }
}

fn count_of(value: Option<i64>) -> u64 {
    value.map(|n| n.max(0) as u64).unwrap_or(0)
}
