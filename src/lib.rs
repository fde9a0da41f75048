//! # drover - Roster-Driven Bulk Execution
//!
//! Run one side-effecting command across every row of a CSV roster, with a
//! bounded worker pool, per-row retries, and a global failure ceiling that
//! stops a bad afternoon from becoming a bad week.
//!
//! ## Features
//!
//! - **Dry-run by default**: Nothing executes until you pass `--apply`
//! - **Bounded retries**: Fixed or exponential backoff per row, with a cap
//! - **Failure ceiling**: Too many failures and the rest of the roster is
//!   discarded instead of hammered
//! - **Paper trail**: Timestamped log plus a per-row outcome CSV for every run
//!
//! ## Quick Start
//!
//! ```bash
//! # Install drover
//! cargo install drover
//!
//! # See what would run, row by row
//! drover run -i roster.csv -- some-admin-tool --user {email} --tz {timezone}
//!
//! # Do it for real, two retries per row, give up after 5 failures
//! drover run -i roster.csv -r 2 -f 5 --apply -- some-admin-tool --user {email} --tz {timezone}
//! ```

pub mod action;
pub mod cli;
pub mod config;
pub mod pool;
pub mod report;
pub mod roster;

pub use cli::{Cli, Output};
pub use config::DroverConfig;

/// Result type alias for drover operations
pub type Result<T> = anyhow::Result<T>;
