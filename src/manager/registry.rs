//! Registry of asynchronous commands and the workers that run them

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::{AsyncId, AsyncRecord, AsyncState, OutputCallback};
use crate::error::SubmitError;
use crate::executor::{execute_with_cancel, CommandResult, ExecutionContext};
use crate::shell::ShellKind;

/// Process-wide id source; ids start at 1 and are never reused
static NEXT_ASYNC_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> AsyncId {
    NEXT_ASYNC_ID.fetch_add(1, Ordering::Relaxed)
}

/// Tracks asynchronous commands from submission to their terminal state
///
/// Each submission runs on its own task spawned onto `handle`. Records are
/// kept for the lifetime of the manager.
pub struct AsyncManager {
    records: Mutex<HashMap<AsyncId, Arc<AsyncRecord>>>,
    permits: Arc<Semaphore>,
    limit: usize,
    handle: Handle,
    shut_down: AtomicBool,
}

impl AsyncManager {
    /// Create a manager spawning onto `handle`
    ///
    /// At most `max_concurrent` commands run at once; 0 means unbounded.
    pub fn new(handle: Handle, max_concurrent: usize) -> Self {
        let limit = if max_concurrent == 0 {
            Semaphore::MAX_PERMITS
        } else {
            max_concurrent.min(Semaphore::MAX_PERMITS)
        };

        Self {
            records: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(limit)),
            limit,
            handle,
            shut_down: AtomicBool::new(false),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<AsyncId, Arc<AsyncRecord>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, id: AsyncId) -> Option<Arc<AsyncRecord>> {
        self.registry().get(&id).cloned()
    }

    /// Submit a command; returns immediately with its id
    ///
    /// `context` is the snapshot the command runs with.
    pub fn submit(
        &self,
        command: &str,
        shell: ShellKind,
        timeout_ms: u64,
        context: ExecutionContext,
        callback: Option<OutputCallback>,
    ) -> Result<AsyncId, SubmitError> {
        if command.trim().is_empty() {
            return Err(SubmitError::EmptyCommand);
        }

        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| SubmitError::AtCapacity { limit: self.limit })?;

        let record = {
            let mut records = self.registry();
            // Checked under the registry lock so shutdown sees every record
            if self.shut_down.load(Ordering::Acquire) {
                return Err(SubmitError::ShutDown);
            }

            let id = next_id();
            let record = Arc::new(AsyncRecord::new(id, command, shell, timeout_ms, callback));
            records.insert(id, Arc::clone(&record));
            record
        };

        tracing::debug!(id = record.id, shell = %shell, "Submitted: {}", command);
        let id = record.id;
        self.handle.spawn(run_record(record, context, permit));
        Ok(id)
    }

    /// Current state; unknown ids report `Failed`
    pub fn status(&self, id: AsyncId) -> AsyncState {
        self.record(id)
            .map(|record| record.state())
            .unwrap_or(AsyncState::Failed)
    }

    /// Block until the command is terminal and return its result
    ///
    /// Unknown ids and cancelled commands yield the zero value. Must not
    /// be called from a task on the manager's own runtime; use
    /// [`wait_result`](Self::wait_result) there.
    pub fn result(&self, id: AsyncId) -> CommandResult {
        match self.record(id) {
            Some(record) => record.wait_blocking(),
            None => CommandResult::default(),
        }
    }

    /// Like [`result`](Self::result), but also waits until the output
    /// callback has returned
    ///
    /// Use this when the callback's side effects must be visible before
    /// moving on, e.g. before the process exits.
    pub fn settle(&self, id: AsyncId) -> CommandResult {
        match self.record(id) {
            Some(record) => record.settle_blocking(),
            None => CommandResult::default(),
        }
    }

    /// Async counterpart of [`result`](Self::result)
    pub async fn wait_result(&self, id: AsyncId) -> CommandResult {
        match self.record(id) {
            Some(record) => record.wait().await,
            None => CommandResult::default(),
        }
    }

    /// Cancel a running command and terminate its process
    ///
    /// Returns `false` for unknown ids and for commands that already
    /// finished.
    pub fn cancel(&self, id: AsyncId) -> bool {
        let Some(record) = self.record(id) else {
            return false;
        };

        let cancelled = record.cancel();
        if cancelled {
            tracing::info!(id, "Cancelled: {}", record.command);
        }
        cancelled
    }

    /// Cancel everything still running and refuse new submissions
    ///
    /// Workers are not joined; each observes its cancellation and exits.
    pub fn shutdown(&self) {
        let records = self.registry();
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let cancelled = records.values().filter(|record| record.cancel()).count();
        if cancelled > 0 {
            tracing::info!("Shutdown cancelled {} running command(s)", cancelled);
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has run
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Concurrency limit in effect
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of records tracked
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for AsyncManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker body: run the engine, record the outcome, deliver output
async fn run_record(
    record: Arc<AsyncRecord>,
    context: ExecutionContext,
    _permit: OwnedSemaphorePermit,
) {
    let result = execute_with_cancel(
        &record.command,
        record.shell,
        record.timeout_ms,
        &context,
        record.cancel_token(),
    )
    .await;

    match record.complete(result.clone()) {
        Some(state) => {
            tracing::info!(
                id = record.id,
                exit_code = result.exit_code,
                execution_time_ms = result.execution_time_ms,
                "{}: {}",
                state,
                record.command
            );
            record.deliver_output(&result);
        }
        None => {
            tracing::debug!(id = record.id, "Discarding result of cancelled command");
        }
    }
}
