//! Roster validation command
//!
//! Reports everything `run` would reject, without running anything.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use regex::Regex;

use crate::action::CommandTemplate;
use crate::cli::{Output, setup_logging};
use crate::config::DroverConfig;
use crate::report::{ReportPaths, write_reject_reports};
use crate::roster::{Roster, partition};

/// Arguments for the check command
#[derive(Args)]
pub struct CheckArgs {
    /// Roster CSV with a header row; the first column is the target
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Only count rows whose target matches this regex
    #[arg(long = "match", value_name = "REGEX")]
    pub match_filter: Option<String>,

    /// Directory for reject reports
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// Optional command to validate against the roster columns
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Execute the check command
pub async fn execute(args: CheckArgs, config_path: Option<&Path>, output: &Output) -> Result<()> {
    let mut config = DroverConfig::load_or_default(config_path)?;
    if let Some(dir) = &args.report_dir {
        config.report.dir = dir.clone();
    }
    setup_logging(None, output.is_verbose(), output.is_quiet())?;

    let roster = Roster::load(&args.input)?;
    let (headers, orders) = roster.into_parts();
    let total = orders.len();

    if !args.command.is_empty() {
        CommandTemplate::compile(&args.command, &headers)?;
        output.success("Command template matches the roster columns");
    }

    let filter = match args.match_filter.as_deref() {
        Some(pattern) => Some(
            Regex::new(pattern).with_context(|| format!("invalid --match pattern {pattern:?}"))?,
        ),
        None => None,
    };
    let parts = partition(orders, filter.as_ref());

    output.header("📋 Roster Check");
    output.table_row("Rows", &total.to_string());
    output.table_row("Runnable", &parts.valid.len().to_string());
    output.table_row("Duplicates", &parts.duplicate_records.len().to_string());
    output.table_row("Conflicts", &parts.conflicting_targets.len().to_string());
    output.table_row("Filtered out", &parts.filtered_out.len().to_string());

    if parts.has_rejects() {
        std::fs::create_dir_all(&config.report.dir)
            .with_context(|| format!("creating report directory {}", config.report.dir.display()))?;
        let paths = ReportPaths::new(&config.report.dir, &config.report.prefix);
        let written = write_reject_reports(&paths, &headers, &parts)?;
        output.blank_line();
        for path in &written {
            output.warning(&format!("Rejected rows written to {}", path.display()));
        }
        std::process::exit(1);
    }

    output.blank_line();
    output.success("Roster is clean");
    Ok(())
}
