//! Command-line interface for drover
//!
//! The clap surface for `drover run`, `drover check`, and the
//! `drover config` subcommands, plus the tracing setup they share.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

mod commands;
mod output;

pub use commands::check::CheckArgs;
pub use commands::run::{OutputFormat, RunArgs};
pub use output::Output;

/// drover - Run one command across a CSV roster, with retries and a failure ceiling
#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file to use instead of the discovered drover.yml
    #[arg(short, long, value_name = "FILE", global = true, env = "DROVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug-level detail on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command once per roster row (dry-run unless --apply)
    Run(RunArgs),
    /// Validate a roster without running anything
    Check(CheckArgs),
    /// Create, check, or print drover.yml
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a default drover.yml in the current directory
    Init,
    /// Check the config file for problems
    Validate,
    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Dispatch the parsed command.
    pub async fn run(self) -> Result<()> {
        let output = Output::new(self.verbose, self.quiet);

        match self.command {
            Some(Commands::Run(args)) => {
                commands::run::execute(args, self.config.as_deref(), &output).await
            }
            Some(Commands::Check(args)) => {
                commands::check::execute(args, self.config.as_deref(), &output).await
            }
            Some(Commands::Config(cmd)) => {
                commands::config::execute(cmd, self.config.as_deref(), &output).await
            }
            None => {
                // Bare `drover` prints help.
                Cli::command().print_help()?;
                Ok(())
            }
        }
    }
}

/// Wire tracing to stderr, and to the run's log file when one is given.
///
/// The file always records DEBUG and up, so a quiet terminal run still
/// leaves a full account next to its outcome report. RUST_LOG overrides
/// the stderr level.
pub(crate) fn setup_logging(log_file: Option<&Path>, verbose: bool, quiet: bool) -> Result<()> {
    // Option<Layer> is itself a Layer, disabled when None, so one
    // registry composition serves both shapes.
    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    let stderr_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if quiet {
            "error"
        } else if verbose {
            "debug"
        } else {
            "info"
        };
        EnvFilter::new(level)
    });
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}
