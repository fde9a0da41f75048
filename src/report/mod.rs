//! Run artifacts: the log file, the outcome CSV, and reject CSVs
//!
//! Every file from one run shares a single `YYYYmmddHHMMSS` stamp so its
//! artifacts sort together. The outcome CSV repeats the roster's own
//! columns and appends what happened to each row; reject CSVs carry the
//! rows that never ran, one file per reason.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::pool::{Disposition, RunReport};
use crate::roster::{RosterPartition, WorkOrder};

/// Paths for one run's artifacts.
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub log: PathBuf,
    pub outcomes: PathBuf,
    pub duplicate_records: PathBuf,
    pub conflicting_targets: PathBuf,
    pub filtered_out: PathBuf,
}

impl ReportPaths {
    pub fn new(dir: &Path, prefix: &str) -> Self {
        let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();
        Self::with_stamp(dir, prefix, &stamp)
    }

    pub fn with_stamp(dir: &Path, prefix: &str, stamp: &str) -> Self {
        Self {
            log: dir.join(format!("{prefix}_{stamp}.log")),
            outcomes: dir.join(format!("{prefix}_outcomes_{stamp}.csv")),
            duplicate_records: dir.join(format!("duplicate_records_{stamp}.csv")),
            conflicting_targets: dir.join(format!("conflicting_targets_{stamp}.csv")),
            filtered_out: dir.join(format!("filtered_out_{stamp}.csv")),
        }
    }
}

/// Write the outcome CSV: roster columns plus outcome, attempts, error.
/// Succeeded rows come first, then failed, then discarded.
pub fn write_outcomes(
    path: &Path,
    headers: &[String],
    report: &RunReport<WorkOrder>,
    rehearsal: bool,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating outcome report {}", path.display()))?;

    let mut header_row: Vec<&str> = headers.iter().map(String::as_str).collect();
    header_row.extend(["outcome", "attempts", "error"]);
    writer.write_record(&header_row)?;

    for done in &report.succeeded {
        let outcome = match (done.disposition, rehearsal) {
            (Disposition::Applied, true) => "would-apply",
            (Disposition::Applied, false) => "applied",
            (Disposition::Unchanged, _) => "unchanged",
        };
        write_outcome_row(&mut writer, &done.item, outcome, done.attempts, "")?;
    }
    for failed in &report.failed {
        let error = format!("{:#}", failed.error);
        write_outcome_row(&mut writer, &failed.item, "failed", failed.attempts, &error)?;
    }
    for order in &report.discarded {
        write_outcome_row(&mut writer, order, "discarded", 0, "")?;
    }

    writer
        .flush()
        .with_context(|| format!("writing outcome report {}", path.display()))?;
    Ok(())
}

fn write_outcome_row(
    writer: &mut csv::Writer<File>,
    order: &WorkOrder,
    outcome: &str,
    attempts: usize,
    error: &str,
) -> Result<()> {
    let attempts = attempts.to_string();
    let mut row: Vec<&str> = order.fields().iter().map(String::as_str).collect();
    row.extend([outcome, attempts.as_str(), error]);
    writer.write_record(&row)?;
    Ok(())
}

/// Write the reject CSVs for a partition, skipping empty sets. Returns
/// the paths actually written.
pub fn write_reject_reports(
    paths: &ReportPaths,
    headers: &[String],
    partition: &RosterPartition,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (path, orders) in [
        (&paths.duplicate_records, &partition.duplicate_records),
        (&paths.conflicting_targets, &partition.conflicting_targets),
        (&paths.filtered_out, &partition.filtered_out),
    ] {
        if write_rejects(path, headers, orders)? {
            written.push(path.clone());
        }
    }
    Ok(written)
}

fn write_rejects(path: &Path, headers: &[String], orders: &[WorkOrder]) -> Result<bool> {
    if orders.is_empty() {
        return Ok(false);
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating reject report {}", path.display()))?;
    writer.write_record(headers)?;
    for order in orders {
        writer.write_record(order.fields())?;
    }
    writer
        .flush()
        .with_context(|| format!("writing reject report {}", path.display()))?;
    Ok(true)
}

/// End-of-run accounting, printable as text or JSON.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub mode: &'static str,
    pub total: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub discarded: usize,
    pub duplicate_records: usize,
    pub conflicting_targets: usize,
    pub filtered_out: usize,
    pub failed_targets: Vec<String>,
    pub elapsed_secs: f64,
    pub outcome_file: PathBuf,
    pub log_file: PathBuf,
}

impl RunSummary {
    pub fn new(
        rehearsal: bool,
        report: &RunReport<WorkOrder>,
        partition_counts: (usize, usize, usize),
        paths: &ReportPaths,
    ) -> Self {
        let (duplicate_records, conflicting_targets, filtered_out) = partition_counts;
        Self {
            mode: if rehearsal { "dry-run" } else { "apply" },
            total: report.total(),
            applied: report.applied(),
            unchanged: report.unchanged(),
            failed: report.failed.len(),
            discarded: report.discarded.len(),
            duplicate_records,
            conflicting_targets,
            filtered_out,
            failed_targets: report
                .failed
                .iter()
                .map(|failed| failed.item.target().to_string())
                .collect(),
            elapsed_secs: report.elapsed.as_secs_f64(),
            outcome_file: paths.outcomes.clone(),
            log_file: paths.log.clone(),
        }
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed_secs / 60.0
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing run summary")
    }
}
