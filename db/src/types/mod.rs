//! Result and statistics value types returned by the client and services.

mod export;
mod result;
mod stats;

pub use export::ExportOptions;

pub use result::{PaginatedResult, QueryResult, Row};
pub use stats::{
    ComparisonResult, CrossTabResult, FieldComparison, GroupStats, HistogramBin,
    HistogramResult, NumericStats, OverlapAnalysis, Statistics,
};
