//! Command-line interface for stressjudge.
//!
//! Provides the `stress` command and configuration management.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands};
