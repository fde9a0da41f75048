use std::process::{Command, Stdio};

use anyhow::Result;
use thiserror::Error;

use crate::pool::Disposition;
use crate::roster::WorkOrder;

use super::template::CommandTemplate;
use super::BulkAction;

/// Why a spawned command counts as a failed attempt.
///
/// Kept as a typed error so retry classification can look at the exit
/// code after the fact (`--fatal-exit`).
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("exited with code {code}")]
    Exit { code: i32, stderr: String },
    #[error("terminated by a signal")]
    Signal { stderr: String },
}

impl CommandError {
    /// Exit code, when the command ran and exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Exit { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            CommandError::Exit { stderr, .. } | CommandError::Signal { stderr } => stderr,
            CommandError::Spawn { .. } => "",
        }
    }
}

/// Executes the expanded command once per work order, no shell involved.
///
/// Exit 0 means a change was applied. One exit code can be designated as
/// "was already in the requested state"; everything else is a failed
/// attempt carrying a [`CommandError`].
pub struct CommandAction {
    template: CommandTemplate,
    unchanged_exit: Option<i32>,
}

impl CommandAction {
    pub fn new(template: CommandTemplate) -> Self {
        Self {
            template,
            unchanged_exit: None,
        }
    }

    /// Treat this exit code as success without a change.
    pub fn with_unchanged_exit(mut self, code: i32) -> Self {
        self.unchanged_exit = Some(code);
        self
    }
}

impl BulkAction<WorkOrder> for CommandAction {
    type Worker = ();

    fn init_worker(&self, _slot: usize) -> Result<()> {
        Ok(())
    }

    fn apply(&self, _worker: &mut (), order: &WorkOrder) -> Result<Disposition> {
        let args = self.template.render_args(order.fields());
        tracing::debug!("running {}", self.template.render_line(order.fields()));

        let output = Command::new(self.template.program())
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                program: self.template.program().to_string(),
                source,
            })?;

        if output.status.success() {
            tracing::info!("applied to {}", order.target());
            return Ok(Disposition::Applied);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(code) if self.unchanged_exit == Some(code) => {
                tracing::info!("{} already in the requested state", order.target());
                Ok(Disposition::Unchanged)
            }
            Some(code) => {
                if !stderr.is_empty() {
                    tracing::debug!("{}: stderr: {stderr}", order.target());
                }
                Err(CommandError::Exit { code, stderr }.into())
            }
            None => Err(CommandError::Signal { stderr }.into()),
        }
    }
}
