//! CLI command definitions using clap

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::shell::ShellKind;

/// Run shell commands with timeouts, output capture and cancellation.
///
/// Commands are opaque shell text handed to the chosen interpreter
/// (cmd, powershell, bash or sh).
#[derive(Parser, Debug)]
#[command(name = "shellrun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (layered over the default XDG paths)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one command and wait for it
    Exec(ExecArgs),

    /// Run several commands concurrently in the background
    Spawn(SpawnArgs),

    /// List shell kinds and the programs that back them
    Shells(ShellsArgs),

    /// Show the resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the `exec` subcommand
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Command text passed to the shell
    #[arg(required = true)]
    pub command: String,

    /// Shell to run the command with (defaults to config)
    #[arg(short, long, value_enum)]
    pub shell: Option<ShellKind>,

    /// Timeout in milliseconds (defaults to config)
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,

    /// Working directory
    #[arg(short = 'd', long)]
    pub dir: Option<PathBuf>,

    /// Environment overrides in KEY=VALUE format
    #[arg(short = 'e', long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// PowerShell execution policy
    #[arg(long)]
    pub policy: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

impl ExecArgs {
    /// Convert env overrides to a HashMap (last one wins)
    pub fn env_as_map(&self) -> HashMap<String, String> {
        self.env.iter().cloned().collect()
    }
}

/// Parse KEY=VALUE argument
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid argument '{}': expected KEY=VALUE format", s))?;
    if key.is_empty() {
        return Err(format!("invalid argument '{}': empty key", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Arguments for the `spawn` subcommand
#[derive(Parser, Debug)]
pub struct SpawnArgs {
    /// Commands to run, one per argument
    #[arg(required = true)]
    pub commands: Vec<String>,

    /// Shell to run the commands with (defaults to config)
    #[arg(short, long, value_enum)]
    pub shell: Option<ShellKind>,

    /// Per-command timeout in milliseconds (defaults to config)
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,

    /// Cancel whatever is still running after this many milliseconds
    #[arg(long)]
    pub cancel_after_ms: Option<u64>,

    /// Output format for the summary
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the `shells` subcommand
#[derive(Parser, Debug)]
pub struct ShellsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the `config` subcommand
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON output
    Json,
    /// Plain text (command output only)
    Plain,
}
