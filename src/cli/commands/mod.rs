//! Command implementations for drover CLI
//!
//! This module contains the actual implementations for each CLI command.
//! Each command is organized into its own module for better maintainability.

pub mod check;
pub mod config;
pub mod run;
