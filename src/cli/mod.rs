//! CLI module for shellrun
//!
//! Provides command-line interface with the following subcommands:
//! - `exec` - Run one command synchronously
//! - `spawn` - Run commands through the async manager
//! - `shells` - List shell kinds and their programs
//! - `config` - Show configuration

pub mod commands;

pub use commands::{Cli, Commands};
