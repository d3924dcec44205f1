//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - The command struct with clap attributes for CLI parsing
//! - An `Execute` implementation that runs it against a client
//! - CLI parsing and execution tests

mod compare;
mod crosstab;
mod histogram;
mod select;
mod sql;
mod stats;
mod variants;

pub use compare::CompareCmd;
pub use crosstab::CrossTabCmd;
pub use histogram::HistogramCmd;
pub use select::SelectCmd;
pub use sql::SqlCmd;
pub use stats::StatsCmd;
pub use variants::VariantsCmd;

use std::error::Error;
use std::sync::Arc;

use clap::Subcommand;
use genoquery_db::{Client, Operator, QueryBuilder, SortDirection, Value};

use crate::output::{OutputFormat, Outputable};

/// Trait for executing commands with command-specific result types.
pub trait Execute {
    type Output: Outputable;

    async fn execute(self, client: &Arc<Client>) -> Result<Self::Output, Box<dyn Error>>;
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a raw SQL statement
    Sql(SqlCmd),

    /// Query a table with filters, ordering and pagination
    Select(SelectCmd),

    /// Summary statistics: counts, categorical breakdowns, numeric summaries
    Stats(StatsCmd),

    /// Dense histogram of a numeric field
    Histogram(HistogramCmd),

    /// Compare two sample groups
    Compare(CompareCmd),

    /// Cross-tabulate two categorical fields
    #[command(name = "crosstab")]
    CrossTab(CrossTabCmd),

    /// Look up variants by region, gene or attribute filters
    Variants(VariantsCmd),
}

impl Command {
    /// Execute the command and return formatted output
    pub async fn run(
        self,
        client: &Arc<Client>,
        format: OutputFormat,
    ) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Sql(cmd) => Ok(cmd.execute(client).await?.format(format)),
            Command::Select(cmd) => Ok(cmd.execute(client).await?.format(format)),
            Command::Stats(cmd) => Ok(cmd.execute(client).await?.format(format)),
            Command::Histogram(cmd) => Ok(cmd.execute(client).await?.format(format)),
            Command::Compare(cmd) => Ok(cmd.execute(client).await?.format(format)),
            Command::CrossTab(cmd) => Ok(cmd.execute(client).await?.format(format)),
            Command::Variants(cmd) => Ok(cmd.execute(client).await?.format(format)),
        }
    }
}

/// Interpret a command-line literal as a typed parameter.
///
/// `null`, `true` and `false` are keywords; integers and floats parse as
/// numbers; anything else is a string. Surrounding single quotes force a
/// string.
pub fn parse_value(raw: &str) -> Value {
    let raw = raw.trim();
    if let Some(quoted) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Value::Str(quoted.to_string());
    }
    match raw {
        "null" | "NULL" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| raw.parse::<f64>().map(Value::Float))
            .unwrap_or_else(|_| Value::Str(raw.to_string())),
    }
}

/// A `--where` filter of the form `<column> <op> <value>`.
///
/// `IN` and `NOT IN` take a comma-separated list.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereArg {
    pub column: String,
    pub op: Operator,
    pub value: String,
}

impl WhereArg {
    pub fn apply<'a>(&self, builder: QueryBuilder<'a>) -> QueryBuilder<'a> {
        match self.op {
            Operator::In => builder.where_in(&self.column, self.list()),
            Operator::NotIn => builder.where_not_in(&self.column, self.list()),
            op => builder.where_(&self.column, op, parse_value(&self.value)),
        }
    }

    fn list(&self) -> Vec<Value> {
        self.value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_value)
            .collect()
    }
}

pub fn parse_where(s: &str) -> Result<WhereArg, String> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    if let [column, rest @ ..] = tokens.as_slice() {
        // Two-word operators first so "NOT LIKE" is not read as "NOT".
        for width in [2, 1] {
            if rest.len() <= width {
                continue;
            }
            if let Ok(op) = rest[..width].join(" ").parse::<Operator>() {
                return Ok(WhereArg {
                    column: column.to_string(),
                    op,
                    value: rest[width..].join(" "),
                });
            }
        }
    }
    Err(format!("expected '<column> <op> <value>', got '{s}'"))
}

/// An `--order-by` key: `column` or `column:asc|desc`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderArg {
    pub column: String,
    pub direction: SortDirection,
}

pub fn parse_order(s: &str) -> Result<OrderArg, String> {
    let (column, direction) = match s.rsplit_once(':') {
        Some((column, dir)) => {
            let direction = match dir.to_ascii_lowercase().as_str() {
                "asc" => SortDirection::Asc,
                "desc" => SortDirection::Desc,
                other => return Err(format!("sort direction must be asc or desc, got '{other}'")),
            };
            (column, direction)
        }
        None => (s, SortDirection::Asc),
    };
    if column.trim().is_empty() {
        return Err("order column is empty".to_string());
    }
    Ok(OrderArg {
        column: column.trim().to_string(),
        direction,
    })
}

/// Split a comma-separated list, dropping empty entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(all(test, feature = "backend-duckdb"))]
pub(crate) mod test_support {
    use std::sync::Arc;

    use genoquery_db::{Client, ClientConfig};

    const SEED: [&str; 2] = [
        "CREATE TABLE variants (
            id VARCHAR, chromosome VARCHAR, position BIGINT, reference VARCHAR,
            alternate VARCHAR, variantType VARCHAR, sampleId VARCHAR, gene VARCHAR,
            clinicalSignificance VARCHAR, populationFrequency DOUBLE, quality DOUBLE,
            depth BIGINT, caddScore DOUBLE, revelScore DOUBLE
        )",
        "INSERT INTO variants VALUES
            ('v1', 'chr1', 100, 'A', 'G', 'SNV', 'S1', 'BRCA1', 'PATHOGENIC', 0.001, 30.0, 25, 12.5, 0.4),
            ('v2', 'chr1', 200, 'AT', 'A', 'DELETION', 'S1', 'BRCA1', 'BENIGN', 0.2, 60.0, 40, 5.0, 0.1),
            ('v3', 'chr2', 150, 'G', 'C', 'SNV', 'S2', 'TP53', 'PATHOGENIC', 0.0005, 90.0, 10, NULL, 0.9),
            ('v1', 'chr1', 100, 'A', 'G', 'SNV', 'S3', 'BRCA1', 'PATHOGENIC', 0.001, 50.0, 30, 12.5, 0.4)",
    ];

    /// In-memory client with a small `variants` table.
    pub async fn seeded_client() -> Arc<Client> {
        let client = Arc::new(Client::new(ClientConfig::default()));
        client.initialize().await.expect("Failed to initialize client");
        for sql in SEED {
            client.execute(sql, &[]).await.expect("Failed to seed database");
        }
        client
    }
}
