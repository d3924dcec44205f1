//! SQL generation for the statistics service.
//!
//! These shapes (bucket arithmetic, correlated overlap subqueries) are outside
//! the query builder's grammar, so they are assembled here. Identifiers go
//! through the same escaping as the builder, and every value is bound.

use super::{Filter, TableLayout};
use crate::backend::Value;
use crate::query_builder::{escape_column, escape_identifier, CompiledQuery};
use crate::query_builder::params::ParamBuilder;

fn filter_condition(filter: &Filter, params: &mut ParamBuilder) -> String {
    let column = escape_column(&filter.column);
    match filter.values.as_slice() {
        [] => "1 = 0".to_string(),
        [single] => format!("{column} = {}", params.push(single.clone())),
        many => format!(
            "{column} IN ({})",
            params.push_all(many.iter().cloned()).join(", ")
        ),
    }
}

fn conditions(filters: &[Filter], params: &mut ParamBuilder) -> Vec<String> {
    filters.iter().map(|f| filter_condition(f, params)).collect()
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn finish(sql: String, params: ParamBuilder) -> CompiledQuery {
    CompiledQuery {
        sql,
        params: params.finish(),
    }
}

pub(crate) fn total_count(table: &str, filters: &[Filter]) -> CompiledQuery {
    let mut params = ParamBuilder::new();
    let conds = conditions(filters, &mut params);
    let sql = format!(
        "SELECT COUNT(*) AS count FROM {}{}",
        escape_identifier(table),
        where_clause(&conds)
    );
    finish(sql, params)
}

/// Row per category: `value`, `count`.
pub(crate) fn breakdown(table: &str, field: &str, filters: &[Filter]) -> CompiledQuery {
    let mut params = ParamBuilder::new();
    let conds = conditions(filters, &mut params);
    let field = escape_column(field);
    let sql = format!(
        "SELECT {field} AS value, COUNT(*) AS count FROM {}{} GROUP BY {field} ORDER BY {field} NULLS LAST",
        escape_identifier(table),
        where_clause(&conds)
    );
    finish(sql, params)
}

/// Always exactly one row, even over no input.
pub(crate) fn numeric_stats(table: &str, field: &str, filters: &[Filter]) -> CompiledQuery {
    let mut params = ParamBuilder::new();
    let conds = conditions(filters, &mut params);
    let f = escape_column(field);
    let sql = format!(
        "SELECT CAST(MIN({f}) AS DOUBLE) AS min, CAST(MAX({f}) AS DOUBLE) AS max, \
         CAST(AVG({f}) AS DOUBLE) AS mean, CAST(MEDIAN({f}) AS DOUBLE) AS median, \
         CAST(STDDEV({f}) AS DOUBLE) AS stddev, COUNT({f}) AS count, \
         COUNT(*) - COUNT({f}) AS null_count FROM {}{}",
        escape_identifier(table),
        where_clause(&conds)
    );
    finish(sql, params)
}

/// `min`, `max` and `count` over the non-null values of `field`.
pub(crate) fn value_range(table: &str, field: &str, filters: &[Filter]) -> CompiledQuery {
    let mut params = ParamBuilder::new();
    let mut conds = conditions(filters, &mut params);
    let f = escape_column(field);
    conds.push(format!("{f} IS NOT NULL"));
    let sql = format!(
        "SELECT CAST(MIN({f}) AS DOUBLE) AS min, CAST(MAX({f}) AS DOUBLE) AS max, COUNT({f}) AS count FROM {}{}",
        escape_identifier(table),
        where_clause(&conds)
    );
    finish(sql, params)
}

fn range_conditions(
    field: &str,
    filters: &[Filter],
    low: f64,
    high: f64,
    params: &mut ParamBuilder,
) -> Vec<String> {
    let mut conds = conditions(filters, params);
    let f = escape_column(field);
    let low = params.push(Value::Float(low));
    let high = params.push(Value::Float(high));
    conds.push(format!("{f} >= {low}"));
    conds.push(format!("{f} <= {high}"));
    conds
}

/// Bucket numbers `1..=bins` with counts. Bins are half-open `[start, end)`
/// except the last, which also takes `high`.
pub(crate) fn histogram_buckets(
    table: &str,
    field: &str,
    filters: &[Filter],
    low: f64,
    high: f64,
    bins: u32,
) -> CompiledQuery {
    let mut params = ParamBuilder::new();
    let conds = range_conditions(field, filters, low, high, &mut params);
    let f = escape_column(field);
    let origin = params.push(Value::Float(low));
    let width = params.push(Value::Float((high - low) / f64::from(bins)));
    let sql = format!(
        "SELECT LEAST(CAST(FLOOR(({f} - {origin}) / {width}) AS BIGINT) + 1, {bins}) AS bucket, \
         COUNT(*) AS count FROM {}{} GROUP BY bucket ORDER BY bucket",
        escape_identifier(table),
        where_clause(&conds)
    );
    finish(sql, params)
}

/// Count for a zero-width range, where every value lands in the first bin.
pub(crate) fn range_count(
    table: &str,
    field: &str,
    filters: &[Filter],
    low: f64,
    high: f64,
) -> CompiledQuery {
    let mut params = ParamBuilder::new();
    let conds = range_conditions(field, filters, low, high, &mut params);
    let sql = format!(
        "SELECT COUNT(*) AS count FROM {}{}",
        escape_identifier(table),
        where_clause(&conds)
    );
    finish(sql, params)
}

/// `total` rows and `unique_count` distinct ids for one sample group.
pub(crate) fn group_counts(layout: &TableLayout, sample_ids: &[String]) -> CompiledQuery {
    let mut params = ParamBuilder::new();
    let conds = conditions(&[layout.sample_filter(sample_ids)], &mut params);
    let sql = format!(
        "SELECT COUNT(*) AS total, COUNT(DISTINCT {}) AS unique_count FROM {}{}",
        escape_column(&layout.id_column),
        escape_identifier(&layout.table),
        where_clause(&conds)
    );
    finish(sql, params)
}

/// `group1_only`, `group2_only` and `shared` distinct id counts.
pub(crate) fn overlap(layout: &TableLayout, group1: &[String], group2: &[String]) -> CompiledQuery {
    let mut params = ParamBuilder::new();
    let table = escape_identifier(&layout.table);
    let id = escape_column(&layout.id_column);
    let g1 = filter_condition(&layout.sample_filter(group1), &mut params);
    let g2 = filter_condition(&layout.sample_filter(group2), &mut params);
    let sql = format!(
        "WITH g1 AS (SELECT DISTINCT {id} AS id FROM {table} WHERE {g1}), \
         g2 AS (SELECT DISTINCT {id} AS id FROM {table} WHERE {g2}) \
         SELECT \
         (SELECT COUNT(*) FROM g1 WHERE NOT EXISTS (SELECT 1 FROM g2 WHERE g2.id = g1.id)) AS group1_only, \
         (SELECT COUNT(*) FROM g2 WHERE NOT EXISTS (SELECT 1 FROM g1 WHERE g1.id = g2.id)) AS group2_only, \
         (SELECT COUNT(*) FROM g1 WHERE EXISTS (SELECT 1 FROM g2 WHERE g2.id = g1.id)) AS shared"
    );
    finish(sql, params)
}

pub(crate) fn distinct_values(table: &str, field: &str, filters: &[Filter]) -> CompiledQuery {
    let mut params = ParamBuilder::new();
    let conds = conditions(filters, &mut params);
    let f = escape_column(field);
    let sql = format!(
        "SELECT DISTINCT {f} AS value FROM {}{} ORDER BY value NULLS LAST",
        escape_identifier(table),
        where_clause(&conds)
    );
    finish(sql, params)
}

/// `row_val`, `col_val`, `count` for every observed combination.
pub(crate) fn cross_counts(
    table: &str,
    row_field: &str,
    column_field: &str,
    filters: &[Filter],
) -> CompiledQuery {
    let mut params = ParamBuilder::new();
    let conds = conditions(filters, &mut params);
    let r = escape_column(row_field);
    let c = escape_column(column_field);
    let sql = format!(
        "SELECT {r} AS row_val, {c} AS col_val, COUNT(*) AS count FROM {}{} GROUP BY {r}, {c}",
        escape_identifier(table),
        where_clause(&conds)
    );
    finish(sql, params)
}
