//! Roster input: the CSV of work orders driving a run
//!
//! The first column names the target of each operation; remaining columns
//! are parameters the command template can splice in. Validation is
//! front-loaded so a malformed roster aborts before anything runs.

mod partition;

pub use partition::{RosterPartition, partition};

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};

/// One row of the roster, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOrder {
    fields: Vec<String>,
}

impl WorkOrder {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// The first column, naming what the operation is aimed at.
    pub fn target(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or("")
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl fmt::Display for WorkOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target())
    }
}

/// A parsed roster: validated header plus its work orders.
#[derive(Debug)]
pub struct Roster {
    headers: Vec<String>,
    orders: Vec<WorkOrder>,
}

impl Roster {
    /// Read and validate a roster CSV.
    ///
    /// Everything here is fail-fast: an unreadable file, a blank or
    /// duplicate column name, a record with the wrong number of fields,
    /// an empty target, or a roster with no rows at all.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("opening roster {}", path.display()))?;

        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("reading the header of {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect();
        validate_headers(&headers)?;

        let mut orders = Vec::new();
        for (row, record) in reader.records().enumerate() {
            // Header is line 1, first record line 2
            let line = row + 2;
            let record = record.with_context(|| format!("reading roster line {line}"))?;
            let fields: Vec<String> = record.iter().map(str::to_string).collect();
            if fields.first().is_none_or(|target| target.is_empty()) {
                bail!("roster line {line} has an empty target");
            }
            orders.push(WorkOrder::new(fields));
        }
        if orders.is_empty() {
            bail!("roster {} has no work orders", path.display());
        }

        Ok(Self { headers, orders })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<WorkOrder>) {
        (self.headers, self.orders)
    }
}

fn validate_headers(headers: &[String]) -> Result<()> {
    if headers.is_empty() {
        bail!("roster header is empty");
    }
    for (idx, name) in headers.iter().enumerate() {
        if name.is_empty() {
            bail!("roster column {} has no name", idx + 1);
        }
        if headers[..idx].iter().any(|earlier| earlier == name) {
            bail!("duplicate roster column {name:?}");
        }
    }
    Ok(())
}
