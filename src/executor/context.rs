//! Execution context: working directory, environment overrides and
//! PowerShell policy applied when a child is spawned

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::process::Command;

use crate::shell::{ShellInvocation, ShellKind, ShellPrograms};

/// Settings read at spawn time
///
/// Cloning a context gives an independent snapshot; each execution
/// receives its own copy, so later changes never reach a command that was
/// already submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Working directory for the child (None = inherit the caller's)
    pub working_dir: Option<PathBuf>,
    /// Environment overrides, merged over the inherited environment
    pub env: HashMap<String, String>,
    /// PowerShell execution policy (None = `Bypass`)
    pub execution_policy: Option<String>,
    /// Program used for each shell kind
    pub programs: ShellPrograms,
}

impl ExecutionContext {
    /// Create a context with a working directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Add an environment override
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the PowerShell execution policy
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.set_execution_policy(policy);
        self
    }

    /// Set the interpreter program table
    pub fn with_programs(mut self, programs: ShellPrograms) -> Self {
        self.programs = programs;
        self
    }

    /// Set the working directory; an empty path means inherit
    pub fn set_working_directory(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        self.working_dir = if dir.as_os_str().is_empty() {
            None
        } else {
            Some(dir)
        };
    }

    /// Set one environment override (last write wins)
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Replace all environment overrides
    pub fn replace_env(&mut self, env: HashMap<String, String>) {
        self.env = env;
    }

    /// Drop all environment overrides
    pub fn clear_env(&mut self) {
        self.env.clear();
    }

    /// Set the PowerShell execution policy; an empty string restores the default
    pub fn set_execution_policy(&mut self, policy: impl Into<String>) {
        let policy = policy.into();
        self.execution_policy = if policy.trim().is_empty() {
            None
        } else {
            Some(policy)
        };
    }

    /// Prepare `command` for `shell` using this context's programs and policy
    pub fn invocation(&self, command: &str, shell: ShellKind) -> ShellInvocation {
        ShellInvocation::new(
            command,
            shell,
            &self.programs,
            self.execution_policy.as_deref(),
        )
    }

    /// Apply working directory and environment to a command
    pub(crate) fn apply(&self, cmd: &mut Command) {
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.env);
    }
}
