//! One asynchronous command and its single state transition

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::{AsyncId, AsyncState, OutputCallback, OutputStream};
use crate::executor::CommandResult;
use crate::shell::ShellKind;

/// State and result, always updated together
struct Slot {
    state: AsyncState,
    result: Option<CommandResult>,
    /// Set once the worker is done with the callback
    delivered: bool,
}

impl Slot {
    /// Terminal, and no callback is still running
    fn settled(&self) -> bool {
        match self.state {
            AsyncState::Running => false,
            AsyncState::Cancelled => true,
            _ => self.delivered,
        }
    }
}

/// Bookkeeping for one submitted command
///
/// The slot lock guards the transition out of `Running`; whoever takes it
/// first (worker or canceller) wins, and everyone else sees a terminal
/// state. Blocking waiters park on the condvar, async waiters on the
/// notifier.
pub struct AsyncRecord {
    pub id: AsyncId,
    pub command: String,
    pub shell: ShellKind,
    pub timeout_ms: u64,
    callback: Option<OutputCallback>,
    slot: Mutex<Slot>,
    finished: Condvar,
    done: Notify,
    cancel: CancellationToken,
}

impl AsyncRecord {
    pub(crate) fn new(
        id: AsyncId,
        command: impl Into<String>,
        shell: ShellKind,
        timeout_ms: u64,
        callback: Option<OutputCallback>,
    ) -> Self {
        Self {
            id,
            command: command.into(),
            shell,
            timeout_ms,
            callback,
            slot: Mutex::new(Slot {
                state: AsyncState::Running,
                result: None,
                delivered: false,
            }),
            finished: Condvar::new(),
            done: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state
    pub fn state(&self) -> AsyncState {
        self.lock().state
    }

    /// Token the worker passes to the engine
    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Store the engine's result and move to the matching terminal state
    ///
    /// Returns the new state, or `None` if the record was already terminal
    /// (cancelled while the engine was running). The result is discarded in
    /// that case.
    pub(crate) fn complete(&self, result: CommandResult) -> Option<AsyncState> {
        let mut slot = self.lock();
        if slot.state.is_terminal() {
            return None;
        }

        let state = AsyncState::from_result(&result);
        slot.state = state;
        slot.result = Some(result);
        self.publish();
        Some(state)
    }

    /// Move to `Cancelled` and signal the engine
    ///
    /// Returns `false` if the record had already reached a terminal state.
    pub(crate) fn cancel(&self) -> bool {
        let mut slot = self.lock();
        if slot.state.is_terminal() {
            return false;
        }

        slot.state = AsyncState::Cancelled;
        self.cancel.cancel();
        self.publish();
        true
    }

    /// Wake every waiter; caller holds the slot lock
    fn publish(&self) {
        self.finished.notify_all();
        self.done.notify_waiters();
    }

    /// Block the calling thread until terminal, then return the result
    ///
    /// A cancelled record yields the zero value.
    pub fn wait_blocking(&self) -> CommandResult {
        let mut slot = self.lock();
        while !slot.state.is_terminal() {
            slot = self
                .finished
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        slot.result.clone().unwrap_or_default()
    }

    /// Async counterpart of [`wait_blocking`](Self::wait_blocking)
    pub async fn wait(&self) -> CommandResult {
        loop {
            // Registered before the check so a transition in between is not missed
            let notified = self.done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let slot = self.lock();
                if slot.state.is_terminal() {
                    return slot.result.clone().unwrap_or_default();
                }
            }

            notified.await;
        }
    }

    /// Hand captured output to the callback, stdout first
    pub(crate) fn deliver_output(&self, result: &CommandResult) {
        // Settles the record even if the callback panics
        let _delivered = Delivered(self);

        if let Some(callback) = self.callback.as_ref() {
            if !result.output.is_empty() {
                callback(OutputStream::Stdout, &result.output);
            }
            if !result.error.is_empty() {
                callback(OutputStream::Stderr, &result.error);
            }
        }
    }

    fn mark_delivered(&self) {
        let mut slot = self.lock();
        slot.delivered = true;
        self.publish();
    }

    /// Like [`wait_blocking`](Self::wait_blocking), but also waits for
    /// the callback to return
    pub fn settle_blocking(&self) -> CommandResult {
        let mut slot = self.lock();
        while !slot.settled() {
            slot = self
                .finished
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        slot.result.clone().unwrap_or_default()
    }
}

struct Delivered<'a>(&'a AsyncRecord);

impl Drop for Delivered<'_> {
    fn drop(&mut self) {
        self.0.mark_delivered();
    }
}

impl fmt::Debug for AsyncRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRecord")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("shell", &self.shell)
            .field("timeout_ms", &self.timeout_ms)
            .field("state", &self.state())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
