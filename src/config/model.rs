//! Configuration model for shellrun
//!
//! Defines the structure for XDG-compliant layered configuration.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::executor::ExecutionContext;
use crate::shell::{ShellKind, ShellPrograms};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct Config {
    /// Defaults applied when a call does not specify them
    #[serde(default)]
    pub defaults: Defaults,

    /// Initial execution context for a runner
    #[serde(default)]
    pub context: ContextConfig,

    /// Program spawned for each shell kind
    #[serde(default)]
    pub shells: ShellPrograms,
}

/// Per-call defaults
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Defaults {
    /// Shell used when none is given
    #[serde(default)]
    pub shell: ShellKind,

    /// Timeout in milliseconds (0 times out immediately)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum concurrently running async commands (0 = unbounded)
    #[serde(default)]
    pub max_concurrent: usize,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            shell: ShellKind::default(),
            timeout_ms: default_timeout_ms(),
            max_concurrent: 0,
        }
    }
}

/// Working directory, environment and policy a runner starts with
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ContextConfig {
    /// Working directory; `~` and `$VARS` are expanded, empty means inherit
    #[serde(default)]
    pub working_dir: String,

    /// PowerShell execution policy; empty means `Bypass`
    #[serde(default)]
    pub execution_policy: String,

    /// Environment overrides
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ContextConfig {
    /// Working directory after `~`/variable expansion
    ///
    /// An unresolvable variable leaves the value as written.
    pub fn expanded_working_dir(&self) -> Option<PathBuf> {
        let raw = self.working_dir.trim();
        if raw.is_empty() {
            return None;
        }

        let expanded = match shellexpand::full(raw) {
            Ok(expanded) => expanded.into_owned(),
            Err(e) => {
                tracing::warn!("Cannot expand working_dir '{}': {}", raw, e);
                raw.to_string()
            }
        };
        Some(PathBuf::from(expanded))
    }
}

impl Config {
    /// Execution context described by `[context]` and `[shells]`
    pub fn execution_context(&self) -> ExecutionContext {
        let mut context = ExecutionContext::default()
            .with_programs(self.shells.clone())
            .with_policy(self.context.execution_policy.clone());
        context.working_dir = self.context.expanded_working_dir();
        context.replace_env(self.context.env.clone());
        context
    }
}
