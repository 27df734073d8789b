//! Shell invocation module
//!
//! Turns a raw command string plus a chosen interpreter into something
//! spawnable:
//! - [`ShellKind`] - the closed set of supported interpreters
//! - [`ShellPrograms`] - which program backs each interpreter
//! - [`ShellInvocation`] - command line and argument vector for one command

pub mod builder;
pub mod kind;
pub mod programs;

pub use builder::{build, build_with_policy, escape, ShellInvocation, DEFAULT_EXECUTION_POLICY};
pub use kind::ShellKind;
pub use programs::ShellPrograms;
