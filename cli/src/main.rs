use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use genoquery_db::Client;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
pub mod output;
#[macro_use]
mod test_macros;
use cli::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = cli::client_config(&args)?;
    tracing::debug!(
        mode = ?config.mode,
        max_connections = config.max_connections,
        "Resolved client configuration"
    );
    let client = Arc::new(Client::new(config));
    client.initialize().await?;

    let output = args.command.run(&client, args.format).await;
    client.dispose().await;
    println!("{}", output?);
    Ok(())
}

/// Logs go to stderr so stdout stays parseable. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "genoquery=debug,genoquery_db=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
