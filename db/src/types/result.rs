//! Query results.
//!
//! A [`QueryResult`] is immutable once produced: rows keep the engine's
//! return order and each row maps column names to values.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::backend::{ColumnMetadata, RawResult, Value};
use crate::error::DbError;

/// One result row. Column names are shared across all rows of a result.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Value::as_f64)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate (column, value) pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Deserialize one column into `T`. A missing column reads as null.
    pub fn get_as<T: DeserializeOwned>(&self, column: &str) -> Result<T, serde_json::Error> {
        let value = serde_json::to_value(self.get(column).unwrap_or(&Value::Null))?;
        serde_json::from_value(value)
    }

    /// Deserialize the row into `T`, matching fields by column name.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let map: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .map(|(k, v)| Ok((k.to_string(), serde_json::to_value(v)?)))
            .collect::<Result<_, serde_json::Error>>()?;
        serde_json::from_value(serde_json::Value::Object(map))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// Rows, column metadata, execution time and, for mutating statements, the
/// affected-row count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    rows: Vec<Row>,
    columns: Vec<ColumnMetadata>,
    #[serde(rename = "executionTimeMs", serialize_with = "serialize_millis")]
    execution_time: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows_affected: Option<u64>,
}

impl QueryResult {
    pub fn from_raw(raw: RawResult, execution_time: Duration) -> Self {
        let names: Arc<[String]> = raw.columns.iter().map(|c| c.name.clone()).collect();
        let rows = raw
            .rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&names), values))
            .collect();
        Self {
            rows,
            columns: raw.columns,
            execution_time,
            rows_affected: raw.rows_affected,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn execution_time(&self) -> Duration {
        self.execution_time
    }

    pub fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Decode every row into `T`.
    ///
    /// The first row that fails to decode aborts with a transformation error
    /// carrying its index.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>, DbError> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.decode().map_err(|e| DbError::Transformation {
                    message: e.to_string(),
                    row_index: Some(i),
                    field_name: None,
                })
            })
            .collect()
    }
}

/// One page of a result plus the total count across all pages.
///
/// Pages are numbered from 1.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult {
    #[serde(flatten)]
    pub result: QueryResult,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PaginatedResult {
    pub fn new(result: QueryResult, total: u64, page: u64, page_size: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        Self {
            result,
            total,
            page,
            page_size,
            total_pages,
            has_next_page: page < total_pages,
            has_previous_page: page > 1,
        }
    }

    pub fn rows(&self) -> &[Row] {
        self.result.rows()
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>, DbError> {
        self.result.decode()
    }
}
