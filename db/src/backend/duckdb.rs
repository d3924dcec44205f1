//! DuckDB engine backend.
//!
//! One root `duckdb::Connection` is opened per instance; every pooled
//! connection is a `try_clone` of it, so all sessions share the same
//! database and memory budget. Each clone keeps a handle on the root so the
//! database outlives any connection still finishing a query after shutdown.

use std::sync::{Arc, Mutex};

use duckdb::types::{ToSql, ToSqlOutput, Value as DuckValue, ValueRef};
use duckdb::{params_from_iter, Config, Connection};
use tracing::{debug, info, instrument};

use super::{
    ColumnMetadata, DatabaseMode, Engine, EngineConnection, EngineError, EngineInstance,
    EngineOptions, RawResult, Value,
};

const MUTATING_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER", "COPY",
];

impl From<duckdb::Error> for EngineError {
    fn from(e: duckdb::Error) -> Self {
        EngineError::new(e.to_string())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(DuckValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(DuckValue::Boolean(*b)),
            Value::Int(i) => ToSqlOutput::Owned(DuckValue::BigInt(*i)),
            Value::Float(f) => ToSqlOutput::Owned(DuckValue::Double(*f)),
            Value::Str(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

pub struct DuckDbEngine;

impl Engine for DuckDbEngine {
    #[instrument(skip(self), fields(memory_limit = options.memory_limit))]
    fn open(&self, options: &EngineOptions) -> Result<Box<dyn EngineInstance>, EngineError> {
        let limit_mib = (options.memory_limit / (1024 * 1024)).max(1);
        let config = Config::default().max_memory(&format!("{limit_mib}MiB"))?;

        let root = match &options.mode {
            DatabaseMode::Memory => Connection::open_in_memory_with_flags(config)?,
            DatabaseMode::File { path } => Connection::open_with_flags(path, config)?,
        };
        info!(mode = ?options.mode, "DuckDB instance opened");

        Ok(Box::new(DuckDbInstance {
            root: Mutex::new(Some(Arc::new(Mutex::new(root)))),
        }))
    }
}

type SharedRoot = Arc<Mutex<Connection>>;

pub struct DuckDbInstance {
    root: Mutex<Option<SharedRoot>>,
}

impl EngineInstance for DuckDbInstance {
    fn connect(&self) -> Result<Box<dyn EngineConnection>, EngineError> {
        let guard = self.root.lock().unwrap_or_else(|e| e.into_inner());
        let root = guard
            .as_ref()
            .ok_or_else(|| EngineError::new("DuckDB instance has been terminated"))?;
        let conn = root.lock().unwrap_or_else(|e| e.into_inner()).try_clone()?;
        debug!("DuckDB connection cloned from root");
        Ok(Box::new(DuckDbConnection {
            conn,
            _root: Arc::clone(root),
        }))
    }

    fn terminate(&self) -> Result<(), EngineError> {
        let root = self.root.lock().unwrap_or_else(|e| e.into_inner()).take();
        if root.is_some() {
            info!("DuckDB instance terminated");
        }
        Ok(())
    }
}

pub struct DuckDbConnection {
    conn: Connection,
    // Dropped after `conn`.
    _root: SharedRoot,
}

impl EngineConnection for DuckDbConnection {
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<RawResult, EngineError> {
        if sql.contains('\0') {
            return Err(EngineError::new("SQL contains null bytes"));
        }

        let mut stmt = self.conn.prepare(sql)?;

        if is_mutation(sql) {
            let affected = stmt.execute(params_from_iter(params.iter()))?;
            debug!(affected, "executed statement");
            return Ok(RawResult {
                columns: Vec::new(),
                rows: Vec::new(),
                rows_affected: Some(affected as u64),
            });
        }

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let columns = match rows.as_ref() {
            Some(stmt) => (0..stmt.column_count())
                .map(|i| {
                    let name = stmt.column_name(i).map(|n| n.to_string())?;
                    Ok(ColumnMetadata::new(name, stmt.column_type(i).to_string()))
                })
                .collect::<Result<Vec<_>, duckdb::Error>>()?,
            None => Vec::new(),
        };

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(from_value_ref(row.get_ref(i)?));
            }
            out.push(values);
        }

        debug!(row_count = out.len(), "executed query");
        Ok(RawResult {
            columns,
            rows: out,
            rows_affected: None,
        })
    }

    fn close(self: Box<Self>) -> Result<(), EngineError> {
        let DuckDbConnection { conn, _root } = *self;
        conn.close().map_err(|(_, e)| EngineError::from(e))
    }
}

fn is_mutation(sql: &str) -> bool {
    let first = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    MUTATING_KEYWORDS.contains(&first.as_str())
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::Int(i as i64),
        ValueRef::SmallInt(i) => Value::Int(i as i64),
        ValueRef::Int(i) => Value::Int(i as i64),
        ValueRef::BigInt(i) => Value::Int(i),
        ValueRef::HugeInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or(Value::Float(i as f64)),
        ValueRef::UTinyInt(i) => Value::Int(i as i64),
        ValueRef::USmallInt(i) => Value::Int(i as i64),
        ValueRef::UInt(i) => Value::Int(i as i64),
        ValueRef::UBigInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or(Value::Float(i as f64)),
        ValueRef::Float(f) => Value::Float(f as f64),
        ValueRef::Double(f) => Value::Float(f),
        ValueRef::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::Null),
        ValueRef::Text(s) => Value::Str(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Str(String::from_utf8_lossy(b).to_string()),
        ValueRef::Date32(d) => Value::Int(d as i64),
        ValueRef::Timestamp(_unit, t) => Value::Int(t),
        other => Value::Str(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn conn() -> Box<dyn EngineConnection> {
        let instance = DuckDbEngine
            .open(&EngineOptions {
                mode: DatabaseMode::Memory,
                memory_limit: 256 * 1024 * 1024,
            })
            .expect("open in-memory DuckDB");
        instance.connect().expect("connect")
    }

    #[rstest]
    #[case("INSERT INTO t VALUES (1)", true)]
    #[case("  create table t (a INT)", true)]
    #[case("SELECT * FROM t", false)]
    #[case("WITH x AS (SELECT 1) SELECT * FROM x", false)]
    fn test_is_mutation(#[case] sql: &str, #[case] expected: bool) {
        assert_eq!(is_mutation(sql), expected);
    }

    #[rstest]
    fn test_query_returns_columns_and_rows(mut conn: Box<dyn EngineConnection>) {
        let result = conn
            .query(
                "SELECT $1::BIGINT AS n, $2::VARCHAR AS s, NULL AS z",
                &[Value::Int(7), Value::from("chr1")],
            )
            .unwrap();

        let names: Vec<_> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["n", "s", "z"]);
        assert_eq!(
            result.rows,
            vec![vec![Value::Int(7), Value::from("chr1"), Value::Null]]
        );
        assert_eq!(result.rows_affected, None);
    }

    #[rstest]
    fn test_mutation_reports_rows_affected(mut conn: Box<dyn EngineConnection>) {
        conn.query("CREATE TABLE t (a INTEGER)", &[]).unwrap();
        let inserted = conn
            .query("INSERT INTO t VALUES ($1), ($2)", &[Value::Int(1), Value::Int(2)])
            .unwrap();
        assert_eq!(inserted.rows_affected, Some(2));
    }

    #[rstest]
    fn test_syntax_error_text_is_preserved(mut conn: Box<dyn EngineConnection>) {
        let err = conn.query("SELEC 1", &[]).unwrap_err();
        assert!(err.message.contains("Parser Error"), "got: {}", err.message);
    }

    #[rstest]
    fn test_null_bytes_rejected(mut conn: Box<dyn EngineConnection>) {
        let err = conn.query("SELECT 1\0", &[]).unwrap_err();
        assert_eq!(err.message, "SQL contains null bytes");
    }

    #[rstest]
    fn test_connect_after_terminate_fails() {
        let instance = DuckDbEngine
            .open(&EngineOptions {
                mode: DatabaseMode::Memory,
                memory_limit: 64 * 1024 * 1024,
            })
            .unwrap();
        instance.terminate().unwrap();
        assert!(instance.connect().is_err());
    }
}
