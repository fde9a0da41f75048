//! Output formatting for drover
//!
//! Styled terminal output for run summaries and check results.
//! Structured logging goes through `tracing`; this is only the
//! human-facing layer on stdout.

use console::style;

/// Console output gated by the global `--verbose`/`--quiet` flags.
pub struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let mark = style("✔").green();
        println!("{mark} {message}");
    }

    /// Errors print to stderr and ignore quiet mode.
    pub fn error(&self, message: &str) {
        let mark = style("✖").red();
        eprintln!("{mark} {message}");
    }

    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let mark = style("⚠").yellow();
        println!("{mark} {message}");
    }

    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let mark = style("ℹ").blue();
        println!("{mark} {message}");
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Section title, bold and underlined, preceded by a blank line.
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        println!("\n{}", style(title).bold().underlined());
    }

    /// Aligned key/value row for summary tables. The key is padded
    /// before styling so ANSI codes do not skew the column width.
    pub fn table_row(&self, key: &str, value: &str) {
        let key = style(format!("{key:<20}")).dim();
        println!("  {key} {value}");
    }

    pub fn list_item(&self, item: &str) {
        println!("  • {item}");
    }

    pub fn blank_line(&self) {
        println!();
    }
}
