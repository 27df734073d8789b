//! Supported command interpreters

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Interpreter used to run a command
///
/// Selects both the invocation syntax and the escaping rules applied by
/// the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum ShellKind {
    /// Windows command prompt (`cmd.exe /C`)
    #[serde(rename = "cmd", alias = "commandprompt")]
    #[value(name = "cmd", alias = "commandprompt")]
    CommandPrompt,
    /// PowerShell (`powershell -Command`)
    #[serde(rename = "powershell", alias = "pwsh")]
    #[value(name = "powershell", alias = "pwsh")]
    PowerShell,
    /// GNU bash (`bash -c`)
    #[serde(rename = "bash")]
    #[value(name = "bash")]
    Bash,
    /// POSIX sh (`sh -c`)
    #[serde(rename = "sh", alias = "posix")]
    #[value(name = "sh", alias = "posix")]
    PosixShell,
}

impl ShellKind {
    /// All shell kinds, in declaration order
    pub const ALL: [ShellKind; 4] = [
        ShellKind::CommandPrompt,
        ShellKind::PowerShell,
        ShellKind::Bash,
        ShellKind::PosixShell,
    ];

    /// Interpreter used when nothing is configured: PowerShell on Windows,
    /// POSIX sh everywhere else
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            ShellKind::PowerShell
        } else {
            ShellKind::PosixShell
        }
    }

    /// Short name used in config files and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            ShellKind::CommandPrompt => "cmd",
            ShellKind::PowerShell => "powershell",
            ShellKind::Bash => "bash",
            ShellKind::PosixShell => "sh",
        }
    }
}

impl Default for ShellKind {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShellKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cmd" | "cmd.exe" | "commandprompt" => Ok(ShellKind::CommandPrompt),
            "powershell" | "pwsh" | "ps" => Ok(ShellKind::PowerShell),
            "bash" => Ok(ShellKind::Bash),
            "sh" | "posix" => Ok(ShellKind::PosixShell),
            other => Err(format!(
                "unknown shell '{}': expected one of cmd, powershell, bash, sh",
                other
            )),
        }
    }
}
