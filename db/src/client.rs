//! Client façade over the engine and the connection pool.
//!
//! The client starts the engine with bounded retry, owns the pool, runs raw
//! SQL under a timeout, and is the only place where engine failures are
//! classified into the [`DbError`] taxonomy.

use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use std::time::{Duration, Instant};

use regex::Regex;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, error, info, warn};

use crate::backend::{
    default_engine, Engine, EngineError, EngineInstance, EngineOptions, RawResult, Value,
};
use crate::config::{ClientConfig, LogLevel};
use crate::error::DbError;
use crate::pool::{ConnectionInfo, ConnectionPool, PoolOptions, PoolStats};
use crate::query_builder::QueryBuilder;
use crate::types::{QueryResult, Row};

static NEAR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"at or near "([^"]*)""#).unwrap_or_else(|_| unreachable!()));
static EXPLICIT_POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)position:?\s*(\d+)").unwrap_or_else(|_| unreachable!()));
static LINE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(LINE (\d+): )(.*)\n( *)\^").unwrap_or_else(|_| unreachable!())
});

/// 1-based character position from a `LINE n: <source>` echo followed by a
/// caret line. Truncated echoes (leading `...`) are ignored.
fn line_marker_position(message: &str, sql: &str) -> Option<usize> {
    let caps = LINE_MARKER.captures(message)?;
    if caps[3].starts_with("...") {
        return None;
    }
    let line: usize = caps[2].parse().ok()?;
    let column = caps[4].len().checked_sub(caps[1].len())?;
    let mut lines = sql.split('\n');
    let before: usize = lines
        .by_ref()
        .take(line.checked_sub(1)?)
        .map(|l| l.chars().count() + 1)
        .sum();
    let target = lines.next()?;
    (column <= target.chars().count()).then_some(before + column + 1)
}

/// Upper bound on the pause between startup attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// `base * 2^attempt`, saturating at [`MAX_RETRY_DELAY`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

#[derive(Clone)]
struct Live {
    instance: Arc<dyn EngineInstance>,
    pool: ConnectionPool,
}

/// Why a pooled query did not produce rows, before classification.
enum ExecFailure {
    Pool(DbError),
    Engine(EngineError),
}

impl From<DbError> for ExecFailure {
    fn from(e: DbError) -> Self {
        ExecFailure::Pool(e)
    }
}

pub struct Client {
    config: ClientConfig,
    engine: Arc<dyn Engine>,
    live: RwLock<Option<Live>>,
    init_lock: tokio::sync::Mutex<()>,
}

impl Client {
    /// A client on the engine compiled into this build.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_engine(config, default_engine())
    }

    pub fn with_engine(config: ClientConfig, engine: Arc<dyn Engine>) -> Self {
        Self {
            config,
            engine,
            live: RwLock::new(None),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.live.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Start the engine and build the pool. Idempotent.
    ///
    /// Startup is retried `init_attempts` times with exponential backoff
    /// (`retry_base_delay * 2^attempt`, capped at [`MAX_RETRY_DELAY`]) before
    /// giving up with a connection error wrapping the last engine failure.
    pub async fn initialize(&self) -> Result<(), DbError> {
        self.config.validate()?;
        let _guard = self.init_lock.lock().await;
        if self.is_initialized() {
            return Ok(());
        }

        let options = EngineOptions {
            mode: self.config.mode.clone(),
            memory_limit: self.config.memory_limit,
        };
        self.log(
            LogLevel::Info,
            "Initializing client",
            json!({
                "mode": options.mode,
                "maxConnections": self.config.max_connections,
                "queryTimeoutMs": self.config.query_timeout.as_millis() as u64,
            }),
        );

        let attempts = self.config.init_attempts;
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.open_engine(&options).await {
                Ok(instance) => {
                    let pool = ConnectionPool::new(
                        Arc::clone(&instance),
                        PoolOptions {
                            max_connections: self.config.max_connections,
                            idle_timeout: self.config.idle_timeout,
                        },
                    );
                    *self.live.write().unwrap_or_else(PoisonError::into_inner) =
                        Some(Live { instance, pool });
                    self.log(LogLevel::Info, "Client initialized", json!({ "attempt": attempt }));
                    return Ok(());
                }
                Err(e) => {
                    self.log(
                        LogLevel::Warn,
                        &format!("Initialization attempt {attempt} failed"),
                        json!({ "error": e.message }),
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(backoff_delay(self.config.retry_base_delay, attempt))
                            .await;
                    }
                }
            }
        }

        let message = last_error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_default();
        self.log(
            LogLevel::Error,
            "Failed to initialize client",
            json!({ "error": message }),
        );
        Err(DbError::Connection {
            message: format!("Failed to initialize after {attempts} attempts: {message}"),
            retry_count: Some(attempts),
            cause: last_error,
        })
    }

    async fn open_engine(
        &self,
        options: &EngineOptions,
    ) -> Result<Arc<dyn EngineInstance>, EngineError> {
        let engine = Arc::clone(&self.engine);
        let options = options.clone();
        tokio::task::spawn_blocking(move || engine.open(&options).map(Arc::from))
            .await
            .map_err(|e| EngineError::new(format!("engine startup task failed: {e}")))?
    }

    fn live(&self) -> Result<Live, DbError> {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DbError::NotInitialized)
    }

    /// Run one statement with bound positional parameters.
    ///
    /// On timeout the in-flight engine call is abandoned, not cancelled: its
    /// connection stays busy until the engine finishes and releases it.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult, DbError> {
        let live = self.live()?;
        self.log(
            LogLevel::Debug,
            "Executing query",
            json!({ "sql": sql, "params": params }),
        );

        let pool = live.pool.clone();
        let owned_sql = sql.to_string();
        let owned_params = params.to_vec();
        let task = tokio::spawn(async move {
            pool.with_connection(move |conn| {
                let started = Instant::now();
                conn.query(&owned_sql, &owned_params)
                    .map(|raw| (raw, started.elapsed()))
                    .map_err(ExecFailure::Engine)
            })
            .await
        });

        let outcome = match tokio::time::timeout(self.config.query_timeout, task).await {
            Err(_) => Err(DbError::QueryTimeout {
                sql: sql.to_string(),
                timeout: self.config.query_timeout,
            }),
            Ok(Err(join_error)) => Err(DbError::Unknown {
                message: format!("query task failed: {join_error}"),
                cause: None,
            }),
            Ok(Ok(Err(ExecFailure::Pool(e)))) => Err(e),
            Ok(Ok(Err(ExecFailure::Engine(e)))) => Err(self.classify(e, sql, &live.pool)),
            Ok(Ok(Ok((raw, elapsed)))) => Ok(self.finish(raw, elapsed)),
        };

        if let Err(e) = &outcome {
            self.log(
                LogLevel::Error,
                "Query failed",
                json!({ "sql": sql, "code": e.code(), "error": e.to_string() }),
            );
        }
        outcome
    }

    fn finish(&self, raw: RawResult, elapsed: Duration) -> QueryResult {
        let result = QueryResult::from_raw(raw, elapsed);
        self.log(
            LogLevel::Debug,
            "Query completed",
            json!({
                "executionTimeMs": elapsed.as_secs_f64() * 1000.0,
                "rowCount": result.len(),
            }),
        );
        result
    }

    /// First row of the result, if any.
    pub async fn execute_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, DbError> {
        Ok(self.execute(sql, params).await?.into_rows().into_iter().next())
    }

    /// Read a count from the first row: the `count` column if present,
    /// otherwise the first column. An empty result counts as zero.
    pub async fn execute_count(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let Some(row) = self.execute_one(sql, params).await? else {
            return Ok(0);
        };
        let value = row.get("count").or_else(|| row.get_index(0));
        Ok(value
            .and_then(Value::as_i64)
            .map(|n| n.max(0) as u64)
            .unwrap_or(0))
    }

    /// Start a query builder over `table`.
    pub fn table(&self, table: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(self, table)
    }

    /// Pool statistics. All zero before initialization.
    pub fn stats(&self) -> PoolStats {
        self.live()
            .map(|live| live.pool.stats())
            .unwrap_or_default()
    }

    pub fn connection_info(&self) -> Vec<ConnectionInfo> {
        self.live()
            .map(|live| live.pool.connection_info())
            .unwrap_or_default()
    }

    /// Record the engine's current memory use, in bytes.
    pub fn update_memory_usage(&self, bytes: u64) -> Result<(), DbError> {
        self.live()?.pool.update_memory_usage(bytes);
        Ok(())
    }

    /// Dispose the pool, then terminate the engine. Safe to call repeatedly;
    /// the client must be initialized again before reuse.
    pub async fn dispose(&self) {
        let live = self
            .live
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(live) = live else {
            return;
        };

        self.log(LogLevel::Info, "Disposing client", JsonValue::Null);
        live.pool.dispose().await;

        let instance = live.instance;
        match tokio::task::spawn_blocking(move || instance.terminate()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "engine terminate failed"),
            Err(e) => warn!(error = %e, "engine terminate task failed"),
        }
        self.log(LogLevel::Info, "Client disposed", JsonValue::Null);
    }

    /// Map an engine failure onto the taxonomy by inspecting its message.
    fn classify(&self, err: EngineError, sql: &str, pool: &ConnectionPool) -> DbError {
        let message = err.message.clone();

        if message.contains("Parser Error") || message.contains("syntax error") {
            let token = NEAR_TOKEN
                .captures(&message)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string());
            let position = EXPLICIT_POSITION
                .captures(&message)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .or_else(|| line_marker_position(&message, sql))
                .or_else(|| {
                    token
                        .as_deref()
                        .filter(|t| !t.is_empty())
                        .and_then(|t| sql.find(t))
                        .map(|byte| sql[..byte].chars().count() + 1)
                });
            return DbError::QuerySyntax {
                message,
                sql: sql.to_string(),
                position,
                suggestion: token.map(|t| format!("Check the SQL near \"{t}\"")),
                cause: Some(err),
            };
        }

        if message.to_lowercase().contains("out of memory") || message.contains("OutOfMemory") {
            return DbError::OutOfMemory {
                current_usage: pool.current_memory_usage(),
                limit: self.config.memory_limit,
                cause: Some(err),
            };
        }

        DbError::Unknown {
            message,
            cause: Some(err),
        }
    }

    fn log(&self, level: LogLevel, message: &str, data: JsonValue) {
        if !self.config.enable_logging {
            return;
        }
        if let Some(sink) = &self.config.logger {
            sink.log(level, message, &data);
            return;
        }
        match level {
            LogLevel::Debug => debug!(data = %data, "{message}"),
            LogLevel::Info => info!(data = %data, "{message}"),
            LogLevel::Warn => warn!(data = %data, "{message}"),
            LogLevel::Error => error!(data = %data, "{message}"),
        }
    }
}
