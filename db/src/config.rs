//! Client configuration.
//!
//! A [`ClientConfig`] can be built directly with the `with_*` setters, parsed
//! from a connection URL, read from environment variables, or loaded from a
//! `.genoquery.json` file.
//!
//! Resolution priority: config file > environment > defaults.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub use crate::backend::DatabaseMode;
use crate::error::DbError;

pub const CONFIG_FILE_NAME: &str = ".genoquery.json";

pub const DEFAULT_MAX_CONNECTIONS: usize = 4;
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MEMORY_LIMIT: u64 = 512 * 1024 * 1024;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_INIT_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

type SinkFn = dyn Fn(LogLevel, &str, &JsonValue) + Send + Sync;

/// Injectable log destination receiving (level, message, structured data).
#[derive(Clone)]
pub struct LogSink(Arc<SinkFn>);

impl LogSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(LogLevel, &str, &JsonValue) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn log(&self, level: LogLevel, message: &str, data: &JsonValue) {
        (self.0)(level, message, data)
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink(..)")
    }
}

/// Configuration for a [`crate::Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub mode: DatabaseMode,
    pub max_connections: usize,
    pub query_timeout: Duration,
    /// Engine memory limit in bytes.
    pub memory_limit: u64,
    /// Idle connections older than this are evicted on acquire. `None` keeps
    /// them until the pool is disposed.
    pub idle_timeout: Option<Duration>,
    pub init_attempts: u32,
    pub retry_base_delay: Duration,
    pub enable_logging: bool,
    pub logger: Option<LogSink>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            mode: DatabaseMode::Memory,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            init_attempts: DEFAULT_INIT_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            enable_logging: false,
            logger: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: DatabaseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_file(self, path: impl Into<PathBuf>) -> Self {
        self.with_mode(DatabaseMode::File { path: path.into() })
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = bytes;
        self
    }

    /// Set the memory limit in megabytes.
    pub fn with_memory_limit_mb(self, mb: u64) -> Result<Self, DbError> {
        Ok(self.with_memory_limit(megabytes(mb)?))
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_init_retry(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.init_attempts = attempts;
        self.retry_base_delay = base_delay;
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    pub fn with_logger(mut self, sink: LogSink) -> Self {
        self.logger = Some(sink);
        self.enable_logging = true;
        self
    }

    pub fn validate(&self) -> Result<(), DbError> {
        if self.max_connections == 0 {
            return Err(DbError::invalid_config("max_connections must be greater than 0"));
        }
        if self.query_timeout.is_zero() {
            return Err(DbError::invalid_config("query_timeout must be greater than 0"));
        }
        if self.memory_limit == 0 {
            return Err(DbError::invalid_config("memory_limit must be greater than 0"));
        }
        if self.init_attempts == 0 {
            return Err(DbError::invalid_config("init_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Parse a database location.
    ///
    /// Supported formats:
    /// - `:memory:` or `memory://` → in-memory database
    /// - `duckdb:///path/to/db` or `file:///path/to/db` → file database
    /// - anything else is treated as a file path
    pub fn mode_from_url(url: &str) -> Result<DatabaseMode, DbError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DbError::invalid_config("database URL is empty"));
        }
        if url == ":memory:" || url == "memory://" {
            return Ok(DatabaseMode::Memory);
        }

        let path = url
            .strip_prefix("duckdb://")
            .or_else(|| url.strip_prefix("file://"))
            .unwrap_or(url);
        if path.is_empty() {
            return Err(DbError::invalid_config(format!("missing path in URL '{url}'")));
        }
        Ok(DatabaseMode::File {
            path: PathBuf::from(path),
        })
    }

    pub fn from_url(url: &str) -> Result<Self, DbError> {
        Ok(Self::default().with_mode(Self::mode_from_url(url)?))
    }

    /// Load from environment variables.
    ///
    /// Reads `GENOQUERY_DATABASE_URL`, `GENOQUERY_MAX_CONNECTIONS`,
    /// `GENOQUERY_QUERY_TIMEOUT_MS` and `GENOQUERY_MEMORY_LIMIT_MB`. Returns
    /// `None` when none of them is set.
    pub fn from_env() -> Result<Option<Self>, DbError> {
        let url = std::env::var("GENOQUERY_DATABASE_URL").ok();
        let max = env_number("GENOQUERY_MAX_CONNECTIONS")?;
        let timeout_ms = env_number("GENOQUERY_QUERY_TIMEOUT_MS")?;
        let memory_mb = env_number("GENOQUERY_MEMORY_LIMIT_MB")?;

        if url.is_none() && max.is_none() && timeout_ms.is_none() && memory_mb.is_none() {
            return Ok(None);
        }

        let mut config = match url {
            Some(url) => Self::from_url(&url)?,
            None => Self::default(),
        };
        if let Some(max) = max {
            config.max_connections = max as usize;
        }
        if let Some(ms) = timeout_ms {
            config.query_timeout = Duration::from_millis(ms);
        }
        if let Some(mb) = memory_mb {
            config = config.with_memory_limit_mb(mb)?;
        }
        Ok(Some(config))
    }

    /// Resolve configuration from a config file and the environment.
    ///
    /// Priority: `config_path` > environment > defaults (in-memory). Callers
    /// decide where to look for the file.
    pub fn resolve(config_path: Option<&Path>) -> Result<Self, DbError> {
        if let Some(path) = config_path {
            return ConfigFile::load_from(path)?.into_client_config();
        }

        if let Some(config) = Self::from_env()? {
            return Ok(config);
        }

        Ok(Self::default())
    }
}

fn megabytes(mb: u64) -> Result<u64, DbError> {
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| DbError::invalid_config(format!("memory limit of {mb} MB is too large")))
}

fn env_number(key: &str) -> Result<Option<u64>, DbError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| DbError::invalid_config(format!("{key} must be a number, got '{raw}'"))),
        Err(_) => Ok(None),
    }
}

/// Top-level structure of `.genoquery.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: DatabaseMode,
    #[serde(default)]
    pub pool: PoolSection,
}

/// Optional overrides; missing fields keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolSection {
    pub max_connections: Option<usize>,
    pub query_timeout_ms: Option<u64>,
    pub memory_limit_mb: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
    pub enable_logging: Option<bool>,
}

impl ConfigFile {
    pub fn load_from(path: &Path) -> Result<Self, DbError> {
        let content = fs::read_to_string(path).map_err(|e| {
            DbError::invalid_config(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            DbError::invalid_config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    pub fn into_client_config(self) -> Result<ClientConfig, DbError> {
        let mut config = ClientConfig::default().with_mode(self.database);
        let pool = self.pool;
        if let Some(max) = pool.max_connections {
            config.max_connections = max;
        }
        if let Some(ms) = pool.query_timeout_ms {
            config.query_timeout = Duration::from_millis(ms);
        }
        if let Some(mb) = pool.memory_limit_mb {
            config = config.with_memory_limit_mb(mb)?;
        }
        if let Some(ms) = pool.idle_timeout_ms {
            config.idle_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(enabled) = pool.enable_logging {
            config.enable_logging = enabled;
        }
        Ok(config)
    }
}
