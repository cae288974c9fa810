//! CLI command definitions and dispatch.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use crate::config::Config;
use crate::console::Console;
use crate::constants::{DEFAULT_LOG_LEVEL, EXIT_INTERRUPTED};
use crate::runner::SystemRunner;
use crate::stress::{RunOutcome, RunReport, StressRequest, StressTester};

/// Differential stress tester for competitive programming solutions.
#[derive(Parser, Debug)]
#[command(name = "stressjudge")]
#[command(about = "Stress test a solution against a brute force on generated inputs")]
#[command(version)]
#[command(
    long_about = "stressjudge compiles a solution, a brute force and a test generator using your code templates, \
then runs them on generated inputs in parallel until their outputs differ.\n\n\
The failing input is saved using the `test_in` naming pattern.\n\n\
Example usage:\n  stressjudge stress A\n  stressjudge stress A --brute A-slow.py --workers 4"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = DEFAULT_LOG_LEVEL, global = true)]
    pub log_level: String,

    /// Configuration file (defaults to $STRESS_CONFIG or ~/.st/config.json).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run generator, brute and solve until their outputs differ.
    #[command(alias = "st")]
    Stress(StressArgs),

    /// Inspect or create the configuration file.
    Config(ConfigArgs),
}

/// Arguments for `stressjudge stress`.
#[derive(Parser, Debug)]
pub struct StressArgs {
    /// Task identifier substituted for $%task%$ in the naming patterns.
    pub task: String,

    /// Solve file pattern, replaces the configured naming.
    #[arg(short, long)]
    pub solve: Option<String>,

    /// Brute force file pattern, replaces the configured naming.
    #[arg(short, long)]
    pub brute: Option<String>,

    /// Generator file pattern, replaces the configured naming.
    #[arg(short, long)]
    pub generator: Option<String>,

    /// Number of parallel workers.
    #[arg(short, long)]
    pub workers: Option<usize>,
}

/// Arguments for `stressjudge config`.
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

/// Config subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Print the effective configuration as JSON.
    Show,

    /// Write a starter configuration with C++ and Python templates.
    Init {
        /// Overwrite an existing configuration file.
        #[arg(long)]
        force: bool,
    },
}

/// Parse command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Execute the parsed command.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = Config::resolve_path(cli.config.as_deref())?;

    match cli.command {
        Commands::Stress(args) => run_stress(args, config_path).await,
        Commands::Config(args) => run_config(args.command, config_path),
    }
}

async fn run_stress(args: StressArgs, config_path: PathBuf) -> anyhow::Result<ExitCode> {
    let config = Config::load(&config_path)?;
    let request = StressRequest {
        solve: args.solve,
        brute: args.brute,
        generator: args.generator,
        workers: args.workers,
        ..StressRequest::new(args.task)
    };
    let tester = StressTester::new(config, request, Arc::new(SystemRunner));
    let mut console = Console::stdout();

    let prepared = tokio::select! {
        prepared = tester.prepare(&mut console) => prepared,
        _ = tokio::signal::ctrl_c() => return interrupted(),
    };
    let prepared = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::debug!(code = e.error_code(), "Stress test aborted before start");
            console.red(&e.to_string())?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let report = tokio::select! {
        report = prepared.execute(Console::stdout()) => Some(report),
        _ = tokio::signal::ctrl_c() => None,
    };
    prepared.cleanup().await;

    match report {
        Some(report) => {
            report_outcome(&report, &mut console)?;
            Ok(ExitCode::FAILURE)
        }
        None => interrupted(),
    }
}

fn interrupted() -> anyhow::Result<ExitCode> {
    tracing::info!("Interrupted, stopping workers");
    Console::stdout().blue("Interrupted")?;
    Ok(ExitCode::from(EXIT_INTERRUPTED))
}

fn report_outcome(report: &RunReport, console: &mut Console) -> std::io::Result<()> {
    match &report.outcome {
        RunOutcome::Counterexample {
            test_id,
            input_path: Some(path),
        } => console.plain(&format!(
            "Input of test #{} saved to {}",
            test_id,
            path.display()
        )),
        RunOutcome::Counterexample {
            input_path: None, ..
        } => Ok(()),
        RunOutcome::PipelineFailure(e) => {
            tracing::debug!(role = %e.role, test_id = e.test_id, "Run stopped by pipeline failure");
            Ok(())
        }
        RunOutcome::Aborted(reason) => console.red(&format!("Stress test aborted: {}", reason)),
    }
}

fn run_config(command: ConfigSubcommand, config_path: PathBuf) -> anyhow::Result<ExitCode> {
    match command {
        ConfigSubcommand::Show => {
            let config = Config::load(&config_path)?;
            let json = serde_json::to_string_pretty(&config)
                .context("Failed to serialize configuration")?;
            println!("{}", json);
        }
        ConfigSubcommand::Init { force } => {
            if config_path.exists() && !force {
                bail!(
                    "{} already exists; pass --force to overwrite it",
                    config_path.display()
                );
            }
            Config::starter().save(&config_path)?;
            println!("Configuration written to {}", config_path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}
