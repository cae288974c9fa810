//! stressjudge - Application Entry Point
//!
//! Initializes logging and delegates to the CLI module for command handling.

use std::process::ExitCode;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse CLI arguments first to get log_level
    let cli = stressjudge::cli::parse_cli();

    // Priority: RUST_LOG env var > --log-level CLI arg
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    stressjudge::cli::run_with_cli(cli).await
}
