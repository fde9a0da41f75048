//! Roster execution command
//!
//! Loads the roster, sets aside rows that cannot run, then drives the
//! rest through the worker pool. Dry-run by default; `--apply` makes it
//! real.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use regex::Regex;

use crate::action::{BulkAction, CommandAction, CommandError, CommandTemplate, RehearsalAction};
use crate::cli::{Output, setup_logging};
use crate::config::{BackoffPolicy, DroverConfig};
use crate::pool::{CancelToken, ErrorClass, PoolConfig, RunReport, WorkerPool};
use crate::report::{ReportPaths, RunSummary, write_outcomes, write_reject_reports};
use crate::roster::{Roster, WorkOrder, partition};

/// Hard ceiling on worker threads
const MAX_THREADS: usize = 100;

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Roster CSV with a header row; the first column is the target
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Worker threads (0 = one per CPU core, capped at 100)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Retries per row after the first attempt
    #[arg(short = 'r', long)]
    pub max_retries: Option<usize>,

    /// Failed rows tolerated before the rest of the roster is discarded
    #[arg(short = 'f', long)]
    pub max_failures: Option<usize>,

    /// Retry delay policy
    #[arg(long, value_enum)]
    pub backoff: Option<BackoffPolicy>,

    /// Delay before the first retry (seconds)
    #[arg(long, value_name = "SECS")]
    pub delay: Option<u64>,

    /// Ceiling for the exponential policy (seconds)
    #[arg(long, value_name = "SECS")]
    pub delay_cap: Option<u64>,

    /// Only run rows whose target matches this regex
    #[arg(long = "match", value_name = "REGEX")]
    pub match_filter: Option<String>,

    /// Exit code that means the target was already in the desired state
    #[arg(long, value_name = "CODE")]
    pub unchanged_exit: Option<i32>,

    /// Exit codes that should never be retried
    #[arg(long, value_name = "CODE", value_delimiter = ',')]
    pub fatal_exit: Vec<i32>,

    /// Directory for log and report files
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// Summary format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Execute the command for real instead of printing what would run
    #[arg(short, long)]
    pub apply: bool,

    /// Command to run per row; {column} expands to that row's value
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Summary output format
#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Execute the run command
pub async fn execute(args: RunArgs, config_path: Option<&Path>, output: &Output) -> Result<()> {
    let config = DroverConfig::load_or_default(config_path)?;
    let config = effective_config(&args, config, output)?;

    std::fs::create_dir_all(&config.report.dir)
        .with_context(|| format!("creating report directory {}", config.report.dir.display()))?;
    let paths = ReportPaths::new(&config.report.dir, &config.report.prefix);
    setup_logging(Some(&paths.log), output.is_verbose(), output.is_quiet())?;

    let rehearsal = !args.apply;
    if rehearsal {
        tracing::info!("dry-run mode, pass --apply to execute for real");
    }

    let roster = Roster::load(&args.input)?;
    let (headers, orders) = roster.into_parts();
    let template = CommandTemplate::compile(&args.command, &headers)?;

    let target_filter = compile_filter(args.match_filter.as_deref())?;
    let parts = partition(orders, target_filter.as_ref());
    if !parts.duplicate_records.is_empty() {
        tracing::warn!("{} duplicate rows dropped", parts.duplicate_records.len());
    }
    if !parts.conflicting_targets.is_empty() {
        tracing::warn!(
            "{} rows with conflicting targets set aside",
            parts.conflicting_targets.len()
        );
    }
    if !parts.filtered_out.is_empty() {
        tracing::info!("{} rows skipped by --match", parts.filtered_out.len());
    }
    let reject_files = write_reject_reports(&paths, &headers, &parts)?;

    if parts.valid.is_empty() {
        anyhow::bail!("no runnable rows in {}", args.input.display());
    }
    tracing::info!(
        "running {} rows from {}",
        parts.valid.len(),
        args.input.display()
    );

    let cancel = CancelToken::default();
    spawn_interrupt_handler(cancel.clone());

    let mut pool = WorkerPool::new(PoolConfig {
        workers: config.pool.threads,
        max_retries: config.pool.max_retries,
        max_failures: config.pool.max_failures,
        backoff: config.pool.backoff.to_backoff(),
    })
    .with_cancel_token(cancel);
    if !args.fatal_exit.is_empty() {
        pool = pool.with_classifier(exit_code_classifier(args.fatal_exit.clone()));
    }

    let report = if rehearsal {
        run_pool(
            pool,
            parts.valid,
            RehearsalAction::new(template),
            output.is_quiet(),
        )
        .await?
    } else {
        let mut action = CommandAction::new(template);
        if let Some(code) = args.unchanged_exit {
            action = action.with_unchanged_exit(code);
        }
        run_pool(pool, parts.valid, action, output.is_quiet()).await?
    };

    write_outcomes(&paths.outcomes, &headers, &report, rehearsal)?;
    tracing::info!(
        "run finished: {} applied, {} unchanged, {} failed, {} discarded in {:.1}s",
        report.applied(),
        report.unchanged(),
        report.failed.len(),
        report.discarded.len(),
        report.elapsed.as_secs_f64()
    );

    let summary = RunSummary::new(
        rehearsal,
        &report,
        (
            parts.duplicate_records.len(),
            parts.conflicting_targets.len(),
            parts.filtered_out.len(),
        ),
        &paths,
    );
    match args.format {
        OutputFormat::Json => println!("{}", summary.to_json()?),
        OutputFormat::Text => print_summary(&summary, &reject_files, output),
    }

    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

/// Apply CLI overrides on top of the file configuration.
fn effective_config(
    args: &RunArgs,
    mut config: DroverConfig,
    output: &Output,
) -> Result<DroverConfig> {
    if let Some(threads) = args.threads {
        config.pool.threads = threads;
    }
    if config.pool.threads > MAX_THREADS {
        output.warning(&format!(
            "{} threads requested, capping at {MAX_THREADS}",
            config.pool.threads
        ));
        config.pool.threads = MAX_THREADS;
    }
    if let Some(value) = args.max_retries {
        config.pool.max_retries = value;
    }
    if let Some(value) = args.max_failures {
        config.pool.max_failures = value;
    }
    if let Some(policy) = args.backoff {
        config.pool.backoff.policy = policy;
    }
    if let Some(secs) = args.delay {
        config.pool.backoff.delay_secs = secs;
    }
    if let Some(secs) = args.delay_cap {
        config.pool.backoff.cap_secs = secs;
    }
    if let Some(dir) = &args.report_dir {
        config.report.dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn compile_filter(pattern: Option<&str>) -> Result<Option<Regex>> {
    match pattern {
        Some(pattern) => {
            let regex = Regex::new(pattern)
                .with_context(|| format!("invalid --match pattern {pattern:?}"))?;
            Ok(Some(regex))
        }
        None => Ok(None),
    }
}

/// Map command exit codes listed in --fatal-exit to non-retryable failures.
fn exit_code_classifier(fatal: Vec<i32>) -> impl Fn(&anyhow::Error) -> ErrorClass + Send + Sync {
    move |error| {
        match error
            .downcast_ref::<CommandError>()
            .and_then(CommandError::exit_code)
        {
            Some(code) if fatal.contains(&code) => ErrorClass::Fatal,
            _ => ErrorClass::Transient,
        }
    }
}

fn spawn_interrupt_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, letting in-flight rows finish");
            cancel.cancel();
        }
    });
}

/// Drive the pool on a blocking thread so the signal handler stays live.
async fn run_pool<A>(
    pool: WorkerPool,
    items: Vec<WorkOrder>,
    action: A,
    quiet: bool,
) -> Result<RunReport<WorkOrder>>
where
    A: BulkAction<WorkOrder> + Send + 'static,
    A::Worker: Send,
{
    tokio::task::spawn_blocking(move || {
        let progress = (!quiet).then_some(|done: usize, total: usize| {
            eprint!("\r{done}/{total} rows processed");
            if done == total {
                eprintln!();
            }
        });
        pool.run(items, &action, progress)
    })
    .await
    .context("worker pool task panicked")?
}

fn print_summary(summary: &RunSummary, reject_files: &[PathBuf], output: &Output) {
    output.header(&format!("🚜 Run Summary ({})", summary.mode));
    output.table_row("Rows run", &summary.total.to_string());
    let applied_label = if summary.mode == "dry-run" {
        "Would apply"
    } else {
        "Applied"
    };
    output.table_row(applied_label, &summary.applied.to_string());
    output.table_row("Unchanged", &summary.unchanged.to_string());
    output.table_row("Failed", &summary.failed.to_string());
    output.table_row("Discarded", &summary.discarded.to_string());
    if summary.duplicate_records > 0 {
        output.table_row("Duplicates", &summary.duplicate_records.to_string());
    }
    if summary.conflicting_targets > 0 {
        output.table_row("Conflicts", &summary.conflicting_targets.to_string());
    }
    if summary.filtered_out > 0 {
        output.table_row("Filtered out", &summary.filtered_out.to_string());
    }
    output.table_row(
        "Elapsed",
        &format!("{:.1} minutes", summary.elapsed_minutes()),
    );
    output.blank_line();

    if !summary.failed_targets.is_empty() {
        output.error(&format!("{} rows failed:", summary.failed_targets.len()));
        for target in &summary.failed_targets {
            output.list_item(target);
        }
    }
    for path in reject_files {
        output.warning(&format!("Rejected rows written to {}", path.display()));
    }
    output.info(&format!(
        "Outcome report: {}",
        summary.outcome_file.display()
    ));
    output.info(&format!("Log file: {}", summary.log_file.display()));

    if summary.failed == 0 && summary.discarded == 0 {
        output.success("All rows completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> RunArgs {
        RunArgs {
            input: PathBuf::from("roster.csv"),
            threads: None,
            max_retries: None,
            max_failures: None,
            backoff: None,
            delay: None,
            delay_cap: None,
            match_filter: None,
            unchanged_exit: None,
            fatal_exit: Vec::new(),
            report_dir: None,
            format: OutputFormat::Text,
            apply: false,
            command: vec!["true".to_string()],
        }
    }

    fn silent() -> Output {
        Output::new(false, true)
    }

    #[test]
    fn cli_flags_override_file_settings() {
        let mut args = bare_args();
        args.max_retries = Some(7);
        args.max_failures = Some(0);
        args.delay = Some(5);

        let config = effective_config(&args, DroverConfig::default(), &silent()).unwrap();
        assert_eq!(config.pool.max_retries, 7);
        assert_eq!(config.pool.max_failures, 0);
        assert_eq!(config.pool.backoff.delay_secs, 5);
    }

    #[test]
    fn thread_counts_are_capped() {
        let mut args = bare_args();
        args.threads = Some(250);
        let config = effective_config(&args, DroverConfig::default(), &silent()).unwrap();
        assert_eq!(config.pool.threads, MAX_THREADS);

        // The cap also applies to values coming from the file
        let mut from_file = DroverConfig::default();
        from_file.pool.threads = 500;
        let config = effective_config(&bare_args(), from_file, &silent()).unwrap();
        assert_eq!(config.pool.threads, MAX_THREADS);
    }

    #[test]
    fn merged_backoff_settings_are_revalidated() {
        let mut args = bare_args();
        args.backoff = Some(BackoffPolicy::Exponential);
        args.delay = Some(10);
        args.delay_cap = Some(5);

        assert!(effective_config(&args, DroverConfig::default(), &silent()).is_err());
    }

    #[test]
    fn fatal_exit_codes_classify_as_fatal() {
        let classifier = exit_code_classifier(vec![64, 78]);

        let fatal: anyhow::Error = CommandError::Exit {
            code: 64,
            stderr: String::new(),
        }
        .into();
        assert_eq!(classifier(&fatal), ErrorClass::Fatal);

        let transient: anyhow::Error = CommandError::Exit {
            code: 1,
            stderr: String::new(),
        }
        .into();
        assert_eq!(classifier(&transient), ErrorClass::Transient);

        // Errors that are not command failures keep their retry budget
        assert_eq!(
            classifier(&anyhow::anyhow!("network glitch")),
            ErrorClass::Transient
        );
    }
}
