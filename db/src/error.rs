//! Error taxonomy shared by the pool, the client façade, the query builder
//! and the statistics service.
//!
//! Every failure surfaced by this crate is a [`DbError`]. Each variant maps to
//! a stable [`ErrorCode`] and can render structured details through
//! [`DbError::details`], so callers can display an error without re-deriving
//! its context.

use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use crate::backend::EngineError;

/// Stable, machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ConnectionFailed,
    PoolDisposed,
    NotInitialized,
    QuerySyntaxError,
    QueryTimeout,
    OutOfMemory,
    DataLoadFailed,
    SchemaValidationFailed,
    TransformationFailed,
    InvalidConfig,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConnectionFailed => "CONNECTION_FAILED",
            ErrorCode::PoolDisposed => "POOL_DISPOSED",
            ErrorCode::NotInitialized => "NOT_INITIALIZED",
            ErrorCode::QuerySyntaxError => "QUERY_SYNTAX_ERROR",
            ErrorCode::QueryTimeout => "QUERY_TIMEOUT",
            ErrorCode::OutOfMemory => "OUT_OF_MEMORY",
            ErrorCode::DataLoadFailed => "DATA_LOAD_FAILED",
            ErrorCode::SchemaValidationFailed => "SCHEMA_VALIDATION_FAILED",
            ErrorCode::TransformationFailed => "TRANSFORMATION_FAILED",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single per-column problem found while validating a table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    pub column: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection {
        message: String,
        retry_count: Option<u32>,
        #[source]
        cause: Option<EngineError>,
    },

    #[error("Connection pool has been disposed")]
    PoolDisposed,

    #[error("Client not initialized. Call initialize() first.")]
    NotInitialized,

    #[error("Query syntax error: {message}")]
    QuerySyntax {
        message: String,
        sql: String,
        position: Option<usize>,
        suggestion: Option<String>,
        #[source]
        cause: Option<EngineError>,
    },

    #[error("Query timed out after {}ms", .timeout.as_millis())]
    QueryTimeout { sql: String, timeout: Duration },

    #[error("Out of memory: {current_usage} bytes used of {limit} byte limit")]
    OutOfMemory {
        current_usage: u64,
        limit: u64,
        #[source]
        cause: Option<EngineError>,
    },

    #[error("Failed to load data from '{source_name}': {message}")]
    DataLoad { source_name: String, message: String },

    #[error("Schema validation failed with {} violation(s)", .violations.len())]
    SchemaValidation { violations: Vec<SchemaViolation> },

    #[error("Transformation failed: {message}")]
    Transformation {
        message: String,
        row_index: Option<usize>,
        field_name: Option<String>,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("{message}")]
    Unknown {
        message: String,
        #[source]
        cause: Option<EngineError>,
    },
}

impl DbError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DbError::Connection { .. } => ErrorCode::ConnectionFailed,
            DbError::PoolDisposed => ErrorCode::PoolDisposed,
            DbError::NotInitialized => ErrorCode::NotInitialized,
            DbError::QuerySyntax { .. } => ErrorCode::QuerySyntaxError,
            DbError::QueryTimeout { .. } => ErrorCode::QueryTimeout,
            DbError::OutOfMemory { .. } => ErrorCode::OutOfMemory,
            DbError::DataLoad { .. } => ErrorCode::DataLoadFailed,
            DbError::SchemaValidation { .. } => ErrorCode::SchemaValidationFailed,
            DbError::Transformation { .. } => ErrorCode::TransformationFailed,
            DbError::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            DbError::Unknown { .. } => ErrorCode::Unknown,
        }
    }

    /// Structured details for rendering, keyed by field name.
    pub fn details(&self) -> JsonValue {
        match self {
            DbError::Connection {
                retry_count, cause, ..
            } => json!({
                "retryCount": retry_count,
                "cause": cause.as_ref().map(|c| c.to_string()),
            }),
            DbError::PoolDisposed | DbError::NotInitialized => json!({}),
            DbError::QuerySyntax {
                sql,
                position,
                suggestion,
                ..
            } => json!({
                "sql": sql,
                "position": position,
                "suggestion": suggestion,
            }),
            DbError::QueryTimeout { sql, timeout } => json!({
                "sql": sql,
                "timeoutMs": timeout.as_millis() as u64,
            }),
            DbError::OutOfMemory {
                current_usage,
                limit,
                ..
            } => json!({
                "currentUsage": current_usage,
                "limit": limit,
            }),
            DbError::DataLoad { source_name, .. } => json!({ "source": source_name }),
            DbError::SchemaValidation { violations } => json!({ "violations": violations }),
            DbError::Transformation {
                row_index,
                field_name,
                ..
            } => json!({
                "rowIndex": row_index,
                "fieldName": field_name,
            }),
            DbError::InvalidConfig { message } => json!({ "message": message }),
            DbError::Unknown { cause, .. } => json!({
                "cause": cause.as_ref().map(|c| c.to_string()),
            }),
        }
    }

    /// Whether retrying the same operation could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::Connection { .. } | DbError::QueryTimeout { .. }
        )
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        DbError::InvalidConfig {
            message: message.into(),
        }
    }
}
