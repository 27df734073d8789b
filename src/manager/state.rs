//! Lifecycle states and the output callback contract

use std::fmt;

use serde::Serialize;

use crate::executor::CommandResult;

/// Identifier of an asynchronous command, unique for the life of the process
pub type AsyncId = u64;

/// Where an asynchronous command is in its lifecycle
///
/// `Running` is the only initial state. The other four are terminal and a
/// record reaches exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AsyncState {
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl AsyncState {
    /// Whether no further transition can happen
    pub fn is_terminal(self) -> bool {
        !matches!(self, AsyncState::Running)
    }

    /// Terminal state for a finished execution
    pub fn from_result(result: &CommandResult) -> Self {
        if result.timed_out {
            AsyncState::TimedOut
        } else if result.exit_code == 0 {
            AsyncState::Completed
        } else {
            AsyncState::Failed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AsyncState::Running => "running",
            AsyncState::Completed => "completed",
            AsyncState::Failed => "failed",
            AsyncState::TimedOut => "timed_out",
            AsyncState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AsyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which captured stream a callback invocation carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn is_stderr(self) -> bool {
        self == OutputStream::Stderr
    }
}

/// Receives the captured text of a finished command
///
/// Called from the worker task, at most once per stream, only when the
/// command was not cancelled and the stream is non-empty.
pub type OutputCallback = Box<dyn Fn(OutputStream, &str) + Send + Sync>;
