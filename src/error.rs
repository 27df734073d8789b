//! Error types for shellrun
//!
//! Execution never aborts the caller: engine failures are rendered into the
//! `error` field of a [`CommandResult`](crate::executor::CommandResult)
//! through [`ExecError`]'s `Display`, and submission failures come back as
//! [`SubmitError`] values.

use thiserror::Error;

use crate::shell::ShellKind;

/// Failure while preparing, spawning or waiting on a child process
#[derive(Error, Debug)]
pub enum ExecError {
    /// Command was empty or whitespace only
    #[error("Invalid arguments: command is empty")]
    EmptyCommand,

    /// The interpreter process could not be created
    #[error("Failed to create process '{command}': {error}")]
    SpawnFailed { command: String, error: String },

    /// Waiting on the child failed after it was spawned
    #[error("Failed to wait for process: {0}")]
    WaitFailed(String),

    /// A runtime for blocking calls could not be created or is gone
    #[error("Runtime unavailable: {0}")]
    Runtime(String),
}

/// Reasons an asynchronous submission is refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Command was empty or whitespace only
    #[error("Invalid arguments: command is empty")]
    EmptyCommand,

    /// All worker permits are in use
    #[error("Too many commands running (limit {limit})")]
    AtCapacity { limit: usize },

    /// The manager has been shut down
    #[error("Command manager is shut down")]
    ShutDown,
}

/// Suggest a fix for common failure patterns
///
/// `message` is either a spawn error or the child's stderr.
pub fn suggest_fix(shell: ShellKind, program: &str, message: &str) -> Option<String> {
    let lower = message.to_lowercase();

    // Interpreter missing
    let missing = lower.contains("no such file")
        || lower.contains("not found")
        || lower.contains("cannot find");
    if missing {
        if shell == ShellKind::PowerShell && program == "powershell" && !cfg!(windows) {
            return Some(
                "'powershell' is Windows-only. Install PowerShell 7 and set \
                 [shells].powershell = \"pwsh\"."
                    .to_string(),
            );
        }
        if shell == ShellKind::CommandPrompt && !cfg!(windows) {
            return Some("'cmd.exe' is only available on Windows. Use sh or bash.".to_string());
        }
        return Some(format!(
            "Check that '{}' is installed and on PATH, and that the working directory exists.",
            program
        ));
    }

    // Permission errors
    if lower.contains("permission denied") || lower.contains("access is denied") {
        return Some(
            "Permission denied. Check the interpreter and working directory permissions."
                .to_string(),
        );
    }

    // PowerShell policy refusals
    if lower.contains("running scripts is disabled") || lower.contains("executionpolicy") {
        return Some(
            "PowerShell refused the execution policy. Set a less restrictive policy (e.g. Bypass)."
                .to_string(),
        );
    }

    None
}
