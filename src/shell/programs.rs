//! Interpreter program table
//!
//! Maps each [`ShellKind`] to the executable spawned for it, so a Linux
//! host can point `powershell` at `pwsh` or pin bash to an absolute path.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ShellKind;

/// Program spawned for each shell kind
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShellPrograms {
    /// Windows command prompt
    #[serde(default = "default_cmd")]
    pub cmd: String,

    /// PowerShell (Windows PowerShell or pwsh)
    #[serde(default = "default_powershell")]
    pub powershell: String,

    /// bash
    #[serde(default = "default_bash")]
    pub bash: String,

    /// POSIX sh
    #[serde(default = "default_sh")]
    pub sh: String,
}

fn default_cmd() -> String {
    "cmd.exe".to_string()
}

fn default_powershell() -> String {
    "powershell".to_string()
}

fn default_bash() -> String {
    "bash".to_string()
}

fn default_sh() -> String {
    "sh".to_string()
}

impl Default for ShellPrograms {
    fn default() -> Self {
        Self {
            cmd: default_cmd(),
            powershell: default_powershell(),
            bash: default_bash(),
            sh: default_sh(),
        }
    }
}

impl ShellPrograms {
    /// Program configured for a shell kind
    pub fn program(&self, shell: ShellKind) -> &str {
        match shell {
            ShellKind::CommandPrompt => &self.cmd,
            ShellKind::PowerShell => &self.powershell,
            ShellKind::Bash => &self.bash,
            ShellKind::PosixShell => &self.sh,
        }
    }

    /// Override the program for a shell kind
    pub fn with_program(mut self, shell: ShellKind, program: impl Into<String>) -> Self {
        let program = program.into();
        match shell {
            ShellKind::CommandPrompt => self.cmd = program,
            ShellKind::PowerShell => self.powershell = program,
            ShellKind::Bash => self.bash = program,
            ShellKind::PosixShell => self.sh = program,
        }
        self
    }

    /// Resolve the configured program on PATH
    ///
    /// Returns `None` when the interpreter is not installed.
    pub fn locate(&self, shell: ShellKind) -> Option<PathBuf> {
        which::which(self.program(shell)).ok()
    }
}
