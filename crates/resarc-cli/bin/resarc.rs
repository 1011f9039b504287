//! resarc binary entry point.
//!
//! Thin wrapper around the resarc-cli library that initializes logging,
//! parses arguments and dispatches the subcommand.

use anyhow::Result;
use resarc_cli::{Config, run};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_args();
    tracing::debug!("Configuration loaded: {config:?}");

    let stdout = std::io::stdout();
    run(&config, &mut stdout.lock())
}
