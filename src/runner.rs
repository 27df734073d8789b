//! Instance facade over the engine and the async manager
//!
//! [`ShellRunner`] owns a private multi-threaded runtime, a live
//! [`ExecutionContext`] behind a read/write lock, and an [`AsyncManager`].
//! Every execution gets a snapshot of the context taken when the call is
//! made, so setters only affect later commands.
//!
//! All methods are synchronous and meant for callers outside a tokio
//! runtime. From inside one, `execute_sync` refuses with a failed result.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};

use crate::config::Config;
use crate::error::{ExecError, SubmitError};
use crate::executor::{execute, CommandResult, ExecutionContext};
use crate::manager::{AsyncId, AsyncManager, AsyncState, OutputCallback};
use crate::shell::ShellKind;

/// Runs shell commands with shared settings
pub struct ShellRunner {
    context: RwLock<ExecutionContext>,
    default_shell: ShellKind,
    default_timeout_ms: u64,
    manager: AsyncManager,
    runtime: Option<Runtime>,
}

impl ShellRunner {
    /// Create a runner with built-in defaults
    pub fn new() -> Result<Self, ExecError> {
        Self::from_config(&Config::default())
    }

    /// Create a runner from loaded configuration
    pub fn from_config(config: &Config) -> Result<Self, ExecError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("shellrun-worker")
            .enable_all()
            .build()
            .map_err(|e| ExecError::Runtime(e.to_string()))?;

        let manager = AsyncManager::new(runtime.handle().clone(), config.defaults.max_concurrent);

        Ok(Self {
            context: RwLock::new(config.execution_context()),
            default_shell: config.defaults.shell,
            default_timeout_ms: config.defaults.timeout_ms,
            manager,
            runtime: Some(runtime),
        })
    }

    /// Shell used by callers that do not pick one
    pub fn default_shell(&self) -> ShellKind {
        self.default_shell
    }

    /// Timeout used by callers that do not pick one
    pub fn default_timeout_ms(&self) -> u64 {
        self.default_timeout_ms
    }

    /// The underlying manager
    pub fn manager(&self) -> &AsyncManager {
        &self.manager
    }

    /// Snapshot of the current context
    pub fn context(&self) -> ExecutionContext {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_context(&self, update: impl FnOnce(&mut ExecutionContext)) {
        let mut context = self.context.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut context);
    }

    /// Run a command and wait for it
    ///
    /// Called from inside a tokio runtime this cannot block, and reports a
    /// failed result instead; use [`execute`] there.
    pub fn execute_sync(&self, command: &str, shell: ShellKind, timeout_ms: u64) -> CommandResult {
        let unavailable = |reason: &str| {
            let err = ExecError::Runtime(reason.to_string());
            tracing::warn!("{}", err);
            CommandResult::from_error(&err, None, Duration::ZERO)
        };

        if Handle::try_current().is_ok() {
            return unavailable("execute_sync called from within an async runtime");
        }

        let context = self.context();
        match self.runtime.as_ref() {
            Some(runtime) => runtime.block_on(execute(command, shell, timeout_ms, &context)),
            None => unavailable("shut down"),
        }
    }

    /// Submit a command to run in the background
    pub fn execute_async(
        &self,
        command: &str,
        shell: ShellKind,
        timeout_ms: u64,
        callback: Option<OutputCallback>,
    ) -> Result<AsyncId, SubmitError> {
        self.manager
            .submit(command, shell, timeout_ms, self.context(), callback)
    }

    /// State of an async command; unknown ids report `Failed`
    pub fn get_async_status(&self, id: AsyncId) -> AsyncState {
        self.manager.status(id)
    }

    /// Block until an async command finishes and return its result
    pub fn get_async_result(&self, id: AsyncId) -> CommandResult {
        self.manager.result(id)
    }

    /// Block until an async command finishes and its callback has returned
    pub fn wait_async(&self, id: AsyncId) -> CommandResult {
        self.manager.settle(id)
    }

    /// Cancel an async command; `false` if unknown or already finished
    pub fn terminate_async(&self, id: AsyncId) -> bool {
        self.manager.cancel(id)
    }

    /// Working directory for later commands; empty means inherit
    pub fn set_working_directory(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        tracing::debug!("Working directory: {}", dir.display());
        self.update_context(|context| context.set_working_directory(dir));
    }

    /// Add or replace one environment override
    pub fn set_environment(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        self.update_context(|context| context.set_env(key, value));
    }

    /// Replace all environment overrides
    pub fn set_environment_map(&self, env: HashMap<String, String>) {
        self.update_context(|context| context.replace_env(env));
    }

    /// Drop all environment overrides
    pub fn clear_environment(&self) {
        self.update_context(ExecutionContext::clear_env);
    }

    /// PowerShell execution policy for later commands; empty means `Bypass`
    pub fn set_execution_policy(&self, policy: impl Into<String>) {
        let policy = policy.into();
        self.update_context(|context| context.set_execution_policy(policy));
    }
}

impl Drop for ShellRunner {
    fn drop(&mut self) {
        self.manager.shutdown();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner() -> ShellRunner {
        ShellRunner::new().unwrap()
    }

    #[test]
    fn test_execute_sync() {
        let runner = runner();
        let result = runner.execute_sync("echo facade", ShellKind::PosixShell, 10_000);

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output.trim(), "facade");
    }

    #[test]
    fn test_async_result_matches_sync() {
        let runner = runner();
        let command = "echo same; exit 4";

        let sync = runner.execute_sync(command, ShellKind::PosixShell, 10_000);
        let id = runner
            .execute_async(command, ShellKind::PosixShell, 10_000, None)
            .unwrap();
        let async_result = runner.get_async_result(id);

        assert_eq!(async_result.exit_code, sync.exit_code);
        assert_eq!(async_result.output, sync.output);
        assert_eq!(runner.get_async_status(id), AsyncState::Failed);
    }

    #[test]
    fn test_setters_affect_later_commands_only() {
        let runner = runner();
        runner.set_environment("FACADE_VAR", "one");

        let id = runner
            .execute_async("sleep 0.2; echo $FACADE_VAR", ShellKind::PosixShell, 10_000, None)
            .unwrap();
        runner.set_environment("FACADE_VAR", "two");

        assert_eq!(runner.get_async_result(id).output.trim(), "one");
        let later = runner.execute_sync("echo $FACADE_VAR", ShellKind::PosixShell, 10_000);
        assert_eq!(later.output.trim(), "two");
    }

    #[test]
    fn test_environment_map_replaces_and_clear() {
        let runner = runner();
        runner.set_environment("OLD_VAR", "x");

        let mut env = HashMap::new();
        env.insert("NEW_VAR".to_string(), "y".to_string());
        runner.set_environment_map(env);

        let context = runner.context();
        assert!(!context.env.contains_key("OLD_VAR"));
        assert_eq!(context.env.get("NEW_VAR"), Some(&"y".to_string()));

        runner.clear_environment();
        assert!(runner.context().env.is_empty());
    }

    #[test]
    fn test_working_directory_and_policy() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = runner();
        runner.set_working_directory(dir.path());
        runner.set_execution_policy("RemoteSigned");

        let result = runner.execute_sync("pwd", ShellKind::PosixShell, 10_000);
        let reported = PathBuf::from(result.output.trim()).canonicalize().unwrap();
        assert_eq!(reported, dir.path().canonicalize().unwrap());
        assert_eq!(
            runner.context().execution_policy.as_deref(),
            Some("RemoteSigned")
        );

        runner.set_working_directory("");
        assert!(runner.context().working_dir.is_none());
    }

    #[test]
    fn test_terminate_async() {
        let runner = runner();
        let id = runner
            .execute_async("sleep 5", ShellKind::PosixShell, 10_000, None)
            .unwrap();

        assert!(runner.terminate_async(id));
        assert_eq!(runner.get_async_status(id), AsyncState::Cancelled);
        assert_eq!(runner.get_async_result(id), CommandResult::default());
        assert!(!runner.terminate_async(id));
    }

    #[test]
    fn test_wait_async_returns_after_callback() {
        let runner = runner();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(String::new()));
        let callback: OutputCallback = {
            let seen = std::sync::Arc::clone(&seen);
            Box::new(move |_, text| {
                std::thread::sleep(Duration::from_millis(50));
                seen.lock().unwrap().push_str(text);
            })
        };

        let id = runner
            .execute_async("echo streamed", ShellKind::PosixShell, 10_000, Some(callback))
            .unwrap();
        let result = runner.wait_async(id);

        assert_eq!(result.output.trim(), "streamed");
        assert_eq!(seen.lock().unwrap().trim(), "streamed");
    }

    #[tokio::test]
    async fn test_execute_sync_inside_runtime_fails_cleanly() {
        let runner = runner();
        let result = runner.execute_sync("echo hi", ShellKind::PosixShell, 10_000);

        assert_eq!(result.exit_code, crate::executor::FAILED_EXIT_CODE);
        assert!(result.error.contains("Runtime unavailable"));
        assert!(result.output.is_empty());
    }

    #[test]
    fn test_unknown_id() {
        let runner = runner();

        assert_eq!(runner.get_async_status(0), AsyncState::Failed);
        assert_eq!(runner.get_async_result(0), CommandResult::default());
        assert!(!runner.terminate_async(0));
    }

    #[test]
    fn test_from_config_defaults() {
        let mut config = Config::default();
        config.defaults.shell = ShellKind::Bash;
        config.defaults.timeout_ms = 42;
        config.defaults.max_concurrent = 2;
        config.context.env.insert("CFG".to_string(), "1".to_string());

        let runner = ShellRunner::from_config(&config).unwrap();

        assert_eq!(runner.default_shell(), ShellKind::Bash);
        assert_eq!(runner.default_timeout_ms(), 42);
        assert_eq!(runner.manager().limit(), 2);
        assert_eq!(runner.context().env.get("CFG"), Some(&"1".to_string()));
    }

    #[test]
    fn test_drop_cancels_running_commands() {
        let runner = runner();
        let id = runner
            .execute_async("sleep 5", ShellKind::PosixShell, 10_000, None)
            .unwrap();
        assert_eq!(runner.get_async_status(id), AsyncState::Running);

        // Must return promptly rather than wait for the sleep
        let started = std::time::Instant::now();
        drop(runner);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }
}
