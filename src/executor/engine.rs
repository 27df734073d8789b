//! Command execution with timeout and cancellation support
//!
//! Runs one shell command to completion:
//! - Both output pipes are drained concurrently from the moment of spawn,
//!   so a chatty child never blocks on a full pipe
//! - The wait is multiplexed over process exit, the deadline and an
//!   optional cancellation token
//! - On timeout or cancellation the child (and on Unix its whole process
//!   group) is killed and reaped
//! - Every path produces a [`CommandResult`]; nothing is returned as `Err`

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::{CommandResult, ExecutionContext, FAILED_EXIT_CODE};
use crate::error::{suggest_fix, ExecError};
use crate::shell::ShellKind;

/// How long to keep reading after the child is gone. A descendant that
/// inherited a pipe can hold it open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Read buffer size per stream
const READ_CHUNK: usize = 8 * 1024;

/// Run a command and wait for it
///
/// `timeout_ms == 0` is a deadline that has already passed: the child is
/// started and immediately terminated as timed out.
pub async fn execute(
    command: &str,
    shell: ShellKind,
    timeout_ms: u64,
    context: &ExecutionContext,
) -> CommandResult {
    execute_with_cancel(command, shell, timeout_ms, context, &CancellationToken::new()).await
}

/// Run a command, terminating it early if `cancel` fires
///
/// A cancelled run reports [`FAILED_EXIT_CODE`] with `timed_out = false`.
/// If `cancel` has already fired, nothing is spawned.
pub async fn execute_with_cancel(
    command: &str,
    shell: ShellKind,
    timeout_ms: u64,
    context: &ExecutionContext,
    cancel: &CancellationToken,
) -> CommandResult {
    let start = Instant::now();

    if command.trim().is_empty() {
        return CommandResult::from_error(&ExecError::EmptyCommand, None, start.elapsed());
    }

    let invocation = context.invocation(command, shell);
    let command_line = invocation.command_line();

    let mut cmd = invocation.to_command();
    cmd.stdin(Stdio::inherit());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    context.apply(&mut cmd);

    // Own process group, so a kill reaches everything the shell started
    #[cfg(unix)]
    cmd.process_group(0);

    if cancel.is_cancelled() {
        tracing::debug!("Cancelled before spawn: {}", command_line);
        return CommandResult {
            exit_code: FAILED_EXIT_CODE,
            execution_time_ms: start.elapsed().as_millis() as u64,
            ..Default::default()
        };
    }

    tracing::debug!("Executing: {}", command_line);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            let hint = suggest_fix(shell, &invocation.program, &e.to_string());
            let err = ExecError::SpawnFailed {
                command: command_line,
                error: e.to_string(),
            };
            tracing::warn!("{}", err);
            return CommandResult::from_error(&err, hint, start.elapsed());
        }
    };

    let stdout = StreamCapture::spawn(child.stdout.take());
    let stderr = StreamCapture::spawn(child.stderr.take());

    let limit = Duration::from_millis(timeout_ms);
    let outcome = wait_for_exit(&mut child, limit, cancel).await;

    let output = stdout.finish(DRAIN_GRACE).await;
    let mut error = stderr.finish(DRAIN_GRACE).await;

    let (exit_code, timed_out) = match outcome {
        ExitOutcome::Exited(status) => (status.code().unwrap_or(FAILED_EXIT_CODE), false),
        ExitOutcome::TimedOut => {
            tracing::info!("Command timed out after {}ms: {}", timeout_ms, command_line);
            (FAILED_EXIT_CODE, true)
        }
        ExitOutcome::Cancelled => {
            tracing::info!("Command cancelled: {}", command_line);
            (FAILED_EXIT_CODE, false)
        }
        ExitOutcome::WaitFailed(message) => {
            let err = ExecError::WaitFailed(message);
            tracing::warn!("{}", err);
            if !error.is_empty() && !error.ends_with('\n') {
                error.push('\n');
            }
            error.push_str(&err.to_string());
            (FAILED_EXIT_CODE, false)
        }
    };

    let execution_time_ms = start.elapsed().as_millis() as u64;
    tracing::debug!(
        exit_code,
        timed_out,
        execution_time_ms,
        "Finished: {}",
        command_line
    );

    CommandResult {
        exit_code,
        output,
        error,
        execution_time_ms,
        timed_out,
    }
}

/// Run a command from synchronous code
///
/// Builds a private current-thread runtime for the call. Inside another
/// runtime that would panic, so a failed result is returned instead.
pub fn execute_blocking(
    command: &str,
    shell: ShellKind,
    timeout_ms: u64,
    context: &ExecutionContext,
) -> CommandResult {
    let start = Instant::now();
    if tokio::runtime::Handle::try_current().is_ok() {
        let err = ExecError::Runtime("execute_blocking called from within an async runtime".into());
        tracing::warn!("{}", err);
        return CommandResult::from_error(&err, None, start.elapsed());
    }

    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt.block_on(execute(command, shell, timeout_ms, context)),
        Err(e) => {
            CommandResult::from_error(&ExecError::Runtime(e.to_string()), None, start.elapsed())
        }
    }
}

/// How the wait on a child ended
#[derive(Debug)]
enum ExitOutcome {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
    WaitFailed(String),
}

/// Wait for whichever comes first: exit, deadline or cancellation
async fn wait_for_exit(
    child: &mut Child,
    limit: Duration,
    cancel: &CancellationToken,
) -> ExitOutcome {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => ExitOutcome::Exited(status),
            Err(e) => {
                terminate(child).await;
                ExitOutcome::WaitFailed(e.to_string())
            }
        },
        _ = tokio::time::sleep(limit) => {
            terminate(child).await;
            ExitOutcome::TimedOut
        }
        _ = cancel.cancelled() => {
            terminate(child).await;
            ExitOutcome::Cancelled
        }
    }
}

/// Kill the child (and its process group on Unix), then reap it
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            tracing::debug!("killpg({}) failed: {}", pid, e);
        }
    }

    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill child process: {}", e);
    }
}

/// Background reader that accumulates one pipe into a shared buffer
struct StreamCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: Option<JoinHandle<()>>,
}

impl StreamCapture {
    fn spawn<R>(reader: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let handle = reader.map(|mut reader| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = vec![0u8; READ_CHUNK];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) => break, // EOF
                        Ok(n) => buffer
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]),
                        Err(e) => {
                            tracing::warn!("Error reading output: {}", e);
                            break;
                        }
                    }
                }
            })
        });

        Self { buffer, handle }
    }

    /// Wait up to `grace` for EOF, then return everything read so far
    async fn finish(self, grace: Duration) -> String {
        if let Some(mut handle) = self.handle {
            if timeout(grace, &mut handle).await.is_err() {
                tracing::debug!("Output pipe still open after {:?}; abandoning reader", grace);
                handle.abort();
            }
        }

        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let bytes = std::mem::take(&mut *buffer);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
