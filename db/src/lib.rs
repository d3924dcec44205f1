//! Analytical query client for clinical genomics data - connection pool,
//! query builder and statistics over an embedded columnar engine

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod pool;
pub mod query_builder;
pub mod statistics;
pub mod types;
pub mod variants;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used items
pub use backend::{ColumnMetadata, DatabaseMode, Value};
pub use client::Client;
pub use config::{ClientConfig, ConfigFile, LogLevel, LogSink};
pub use error::{DbError, ErrorCode};
pub use pool::{ConnectionPool, PoolStats};

pub use query_builder::{CompiledQuery, Operator, QueryBuilder, SortDirection};

pub use statistics::{
    CompareGroupsParams, CrossTabParams, Filter, HistogramParams, SampleGroup,
    StatisticsParams, StatisticsService, TableLayout,
};

pub use types::{
    ComparisonResult, CrossTabResult, ExportOptions, HistogramResult, PaginatedResult,
    QueryResult, Row, Statistics,
};

pub use variants::{GeneRef, Region, Variant, VariantFilter, VariantQueryService};
