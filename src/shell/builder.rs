//! Shell invocation builder
//!
//! Wraps a raw command in the target interpreter's invocation syntax:
//!
//! | shell      | command line                                                   |
//! |------------|----------------------------------------------------------------|
//! | cmd        | `cmd.exe /C "<command>"`                                       |
//! | powershell | `powershell -NoProfile -ExecutionPolicy <policy> -Command "<command>"` |
//! | bash       | `bash -c "<command>"`                                          |
//! | sh         | `sh -c "<command>"`                                            |
//!
//! # Trust boundary
//!
//! Commands are opaque shell text supplied by a trusted caller. The builder
//! only escapes the characters that would end the outer double quotes early
//! (or, for bash, expand inside them). It does not validate the command and
//! does not try to prevent injection.

use tokio::process::Command;

use super::{ShellKind, ShellPrograms};

/// Execution policy passed to PowerShell when none is configured
pub const DEFAULT_EXECUTION_POLICY: &str = "Bypass";

/// Characters that get a backslash prefix inside the outer double quotes
fn escape_table(shell: ShellKind) -> &'static [char] {
    match shell {
        ShellKind::CommandPrompt | ShellKind::PowerShell | ShellKind::PosixShell => &['"'],
        ShellKind::Bash => &['"', '$', '`'],
    }
}

/// Escape a command for embedding inside the shell's outer double quotes
pub fn escape(command: &str, shell: ShellKind) -> String {
    let table = escape_table(shell);
    let mut escaped = String::with_capacity(command.len() + 8);
    for c in command.chars() {
        if table.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Policy actually handed to PowerShell (empty means default)
fn effective_policy(policy: Option<&str>) -> &str {
    match policy {
        Some(p) if !p.trim().is_empty() => p,
        _ => DEFAULT_EXECUTION_POLICY,
    }
}

/// A command prepared for one interpreter
///
/// Holds the pieces in structured form: the program, the flags that put
/// it in "run this string" mode, and the raw script. From these it renders
/// either a single command line or a spawnable [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellInvocation {
    /// Interpreter kind
    pub shell: ShellKind,
    /// Program spawned (from [`ShellPrograms`])
    pub program: String,
    /// Flags placed before the script
    pub flags: Vec<String>,
    /// The caller's command, unescaped
    pub script: String,
}

impl ShellInvocation {
    /// Prepare `command` for `shell`
    ///
    /// `policy` is only used by PowerShell; `None` or an empty string
    /// selects [`DEFAULT_EXECUTION_POLICY`].
    pub fn new(
        command: &str,
        shell: ShellKind,
        programs: &ShellPrograms,
        policy: Option<&str>,
    ) -> Self {
        let flags: Vec<String> = match shell {
            ShellKind::CommandPrompt => vec!["/C".to_string()],
            ShellKind::PowerShell => vec![
                "-NoProfile".to_string(),
                "-ExecutionPolicy".to_string(),
                effective_policy(policy).to_string(),
                "-Command".to_string(),
            ],
            ShellKind::Bash | ShellKind::PosixShell => vec!["-c".to_string()],
        };

        Self {
            shell,
            program: programs.program(shell).to_string(),
            flags,
            script: command.to_string(),
        }
    }

    /// Flags and quoted, escaped script: everything after the program
    fn quoted_tail(&self) -> String {
        format!(
            "{} \"{}\"",
            self.flags.join(" "),
            escape(&self.script, self.shell)
        )
    }

    /// Render the full command line
    pub fn command_line(&self) -> String {
        format!("{} {}", self.program, self.quoted_tail())
    }

    /// Build a spawnable command
    ///
    /// On Unix the interpreter receives the script as a single argument, so
    /// no second round of shell parsing happens. Windows takes one command
    /// line per process, so the escaped tail is appended verbatim there.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);

        #[cfg(windows)]
        {
            cmd.raw_arg(self.quoted_tail());
        }

        #[cfg(not(windows))]
        {
            cmd.args(&self.flags).arg(&self.script);
        }

        cmd
    }
}

/// Build the command line for `command` under `shell` with default programs
/// and the default PowerShell policy
///
/// # Examples
///
/// ```
/// use shellrun::shell::{build, ShellKind};
///
/// assert_eq!(build("echo \"hi\"", ShellKind::PosixShell), r#"sh -c "echo \"hi\"""#);
/// ```
pub fn build(command: &str, shell: ShellKind) -> String {
    build_with_policy(command, shell, None)
}

/// Build the command line with an explicit PowerShell execution policy
pub fn build_with_policy(command: &str, shell: ShellKind, policy: Option<&str>) -> String {
    ShellInvocation::new(command, shell, &ShellPrograms::default(), policy).command_line()
}
