//! CLI argument definitions.
//!
//! This module contains the top-level CLI structure and shared types.
//! Individual command definitions are in the `commands` module.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use genoquery_db::config::CONFIG_FILE_NAME;
use genoquery_db::{ClientConfig, DbError};

use crate::commands::Command;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Database location: a file path, `duckdb:///path`, or `:memory:`
    ///
    /// Overrides the location from the config file or environment.
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Path to a JSON config file
    ///
    /// If not specified, searches for a config file in:
    ///   1. ./.genoquery.json (project-local)
    ///   2. ~/.genoquery.json (user-global)
    /// and falls back to GENOQUERY_* environment variables, then defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    /// Maximum number of pooled connections
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_connections: Option<u64>,

    /// Per-query timeout in milliseconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,

    /// Engine memory limit in megabytes
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub memory_limit_mb: Option<u64>,

    /// Log query execution to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Resolve the config file by checking multiple locations in order of preference
pub fn resolve_config_path(explicit_path: Option<PathBuf>) -> Option<PathBuf> {
    // An explicit path is used even if missing, so loading reports the error
    if let Some(path) = explicit_path {
        return Some(path);
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    home::home_dir()
        .map(|home_dir| home_dir.join(CONFIG_FILE_NAME))
        .filter(|global| global.exists())
}

/// Build the client configuration: config file or environment first, then
/// command-line overrides.
pub fn client_config(args: &Args) -> Result<ClientConfig, DbError> {
    let config_path = resolve_config_path(args.config.clone());
    let mut config = ClientConfig::resolve(config_path.as_deref())?;

    if let Some(db) = &args.db {
        config = config.with_mode(ClientConfig::mode_from_url(db)?);
    }
    if let Some(max) = args.max_connections {
        config = config.with_max_connections(max as usize);
    }
    if let Some(ms) = args.timeout_ms {
        config = config.with_query_timeout(Duration::from_millis(ms));
    }
    if let Some(mb) = args.memory_limit_mb {
        config = config.with_memory_limit_mb(mb)?;
    }
    if args.verbose {
        config = config.with_logging(true);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use genoquery_db::DatabaseMode;
    use rstest::rstest;
    use std::io::Write;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["genoquery"];
        argv.extend_from_slice(extra);
        argv.extend_from_slice(&["sql", "SELECT 1"]);
        Args::try_parse_from(argv).unwrap()
    }

    #[rstest]
    fn test_global_defaults() {
        let args = parse(&[]);
        assert_eq!(args.format, OutputFormat::Table);
        assert!(args.db.is_none());
        assert!(!args.verbose);
    }

    #[rstest]
    fn test_global_options_after_subcommand() {
        let args = Args::try_parse_from([
            "genoquery", "sql", "SELECT 1", "-o", "json", "--db", ":memory:",
        ])
        .unwrap();
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.db.as_deref(), Some(":memory:"));
    }

    #[rstest]
    #[case("csv", OutputFormat::Csv)]
    #[case("jsonl", OutputFormat::Jsonl)]
    fn test_row_export_formats(#[case] value: &str, #[case] expected: OutputFormat) {
        let args = parse(&["-o", value]);
        assert_eq!(args.format, expected);
    }

    #[rstest]
    fn test_zero_connections_rejected() {
        let result =
            Args::try_parse_from(["genoquery", "--max-connections", "0", "sql", "SELECT 1"]);
        assert!(result.is_err());
    }

    #[rstest]
    fn test_overrides_apply_on_top_of_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"database": {{"type": "memory"}}, "pool": {{"max_connections": 2, "query_timeout_ms": 5000}}}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let args = parse(&["--config", path, "--db", "/tmp/cohort.duckdb", "--timeout-ms", "250", "-v"]);
        let config = client_config(&args).unwrap();

        assert_eq!(
            config.mode,
            DatabaseMode::File {
                path: PathBuf::from("/tmp/cohort.duckdb")
            }
        );
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.query_timeout, Duration::from_millis(250));
        assert!(config.enable_logging);
    }

    #[rstest]
    fn test_missing_explicit_config_is_an_error() {
        let args = parse(&["--config", "/nonexistent/genoquery.json"]);
        let err = client_config(&args).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[rstest]
    fn test_explicit_config_path_wins() {
        let path = PathBuf::from("custom.json");
        assert_eq!(resolve_config_path(Some(path.clone())), Some(path));
    }

    #[rstest]
    fn test_memory_limit_flag() {
        let args = parse(&["--memory-limit-mb", "64"]);
        assert_eq!(args.memory_limit_mb, Some(64));
    }

    #[rstest]
    fn test_oversized_memory_limit_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{}").unwrap();
        let path = file.path().to_str().unwrap();

        let args = parse(&["--config", path, "--memory-limit-mb", "18446744073709551615"]);
        let err = client_config(&args).unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig { .. }));
    }
}
