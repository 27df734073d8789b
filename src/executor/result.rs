//! Outcome of one execution attempt

use std::time::Duration;

use serde::Serialize;

use crate::error::ExecError;

/// Exit code reported when the process could not be created, waited on,
/// or had to be force-terminated
pub const FAILED_EXIT_CODE: i32 = -1;

/// Result of running a command
///
/// The zero value (`CommandResult::default()`) is what queries against an
/// unknown or cancelled asynchronous command return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// Child exit status, or [`FAILED_EXIT_CODE`]
    pub exit_code: i32,
    /// Captured standard output
    pub output: String,
    /// Captured standard error, plus any engine error text
    pub error: String,
    /// Wall-clock duration in milliseconds
    pub execution_time_ms: u64,
    /// Whether the command was killed for exceeding its timeout
    pub timed_out: bool,
}

impl CommandResult {
    /// Whether the command exited with status 0 within its timeout
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Result for a command that never ran to completion
    pub(crate) fn from_error(err: &ExecError, hint: Option<String>, elapsed: Duration) -> Self {
        let error = match hint {
            Some(hint) => format!("{}\nHint: {}", err, hint),
            None => err.to_string(),
        };

        Self {
            exit_code: FAILED_EXIT_CODE,
            output: String::new(),
            error,
            execution_time_ms: elapsed.as_millis() as u64,
            timed_out: false,
        }
    }
}
