//! Engine boundary.
//!
//! The analytical engine is an opaque SQL-executing collaborator reached only
//! through an open/connect/query/close contract. These traits describe that
//! contract so the pool and the client façade never depend on a concrete
//! engine, and tests can swap in a scripted one.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend-agnostic scalar value exchanged with the engine.
///
/// Used both for bound query parameters and for result cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integers, and floats with no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Any numeric value widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Render the value as a category label. NULL becomes `"null"`.
    pub fn to_label(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Schema entry for one result column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
        }
    }
}

/// Tabular result as produced by an engine connection, before it is wrapped
/// into a [`crate::QueryResult`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<Value>>,
    /// Set for mutating statements only.
    pub rows_affected: Option<u64>,
}

/// Failure reported by the engine. The message is the engine's own text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Where the engine keeps its data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseMode {
    #[default]
    Memory,
    File { path: PathBuf },
}

/// Options used when starting an engine instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    pub mode: DatabaseMode,
    /// Memory limit in bytes.
    pub memory_limit: u64,
}

/// Starts engine instances.
pub trait Engine: Send + Sync {
    fn open(&self, options: &EngineOptions) -> Result<Box<dyn EngineInstance>, EngineError>;
}

/// A live engine instance that hands out connections.
pub trait EngineInstance: Send + Sync {
    /// Opens a new logical session.
    fn connect(&self) -> Result<Box<dyn EngineConnection>, EngineError>;

    /// Shuts the instance down. Called once all connections are closed.
    fn terminate(&self) -> Result<(), EngineError>;
}

/// One session with the engine. Safe for a single query in flight.
pub trait EngineConnection: Send {
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<RawResult, EngineError>;

    fn close(self: Box<Self>) -> Result<(), EngineError>;
}

#[cfg(feature = "backend-duckdb")]
pub mod duckdb;

/// The engine compiled into this build.
#[cfg(feature = "backend-duckdb")]
pub fn default_engine() -> Arc<dyn Engine> {
    Arc::new(duckdb::DuckDbEngine)
}

/// The engine compiled into this build.
///
/// Without an engine backend every open fails; inject one with
/// [`crate::Client::with_engine`].
#[cfg(not(feature = "backend-duckdb"))]
pub fn default_engine() -> Arc<dyn Engine> {
    struct NoEngine;

    impl Engine for NoEngine {
        fn open(&self, _options: &EngineOptions) -> Result<Box<dyn EngineInstance>, EngineError> {
            Err(EngineError::new(
                "no engine backend compiled in; enable the backend-duckdb feature",
            ))
        }
    }

    Arc::new(NoEngine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Value::Int(42), Some(42), Some(42.0))]
    #[case(Value::Float(3.0), Some(3), Some(3.0))]
    #[case(Value::Float(2.5), None, Some(2.5))]
    #[case(Value::Str("7".into()), None, None)]
    #[case(Value::Null, None, None)]
    fn test_value_numeric_accessors(
        #[case] value: Value,
        #[case] as_int: Option<i64>,
        #[case] as_float: Option<f64>,
    ) {
        assert_eq!(value.as_i64(), as_int);
        assert_eq!(value.as_f64(), as_float);
    }

    #[rstest]
    fn test_value_labels() {
        assert_eq!(Value::Null.to_label(), "null");
        assert_eq!(Value::from("SNV").to_label(), "SNV");
        assert_eq!(Value::from(12).to_label(), "12");
    }

    #[rstest]
    fn test_value_serializes_untagged() {
        let values = vec![Value::Null, Value::from(true), Value::from(1), Value::from("x")];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,true,1,"x"]"#);
    }

    #[rstest]
    fn test_option_into_value() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("chr1")), Value::Str("chr1".into()));
    }

    #[rstest]
    fn test_database_mode_serde() {
        let mode: DatabaseMode =
            serde_json::from_str(r#"{"type": "file", "path": "/tmp/g.duckdb"}"#).unwrap();
        assert_eq!(
            mode,
            DatabaseMode::File {
                path: PathBuf::from("/tmp/g.duckdb")
            }
        );
        let mem: DatabaseMode = serde_json::from_str(r#"{"type": "memory"}"#).unwrap();
        assert_eq!(mem, DatabaseMode::Memory);
    }
}
