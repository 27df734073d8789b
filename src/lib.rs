//! shellrun - run shell commands with timeouts, capture and cancellation
//!
//! Runs an opaque command string under one of four interpreters:
//! - **cmd** - `cmd.exe /C`
//! - **powershell** - `powershell -NoProfile -ExecutionPolicy <policy> -Command`
//! - **bash** - `bash -c`
//! - **sh** - `sh -c`
//!
//! ## Layers
//!
//! - [`shell`] builds the interpreter invocation and escapes the command
//! - [`executor`] runs one command: timeout, output capture on both
//!   streams, working directory and environment overrides, cancellation
//! - [`manager`] tracks background commands by id through
//!   `Running -> Completed | Failed | TimedOut | Cancelled`
//! - [`ShellRunner`] ties them together behind a synchronous API with a
//!   shared, snapshotted [`ExecutionContext`]
//!
//! ## Example
//!
//! ```no_run
//! use shellrun::{ShellKind, ShellRunner};
//!
//! let runner = ShellRunner::new().unwrap();
//! runner.set_environment("GREETING", "hello");
//!
//! let result = runner.execute_sync("echo $GREETING", ShellKind::PosixShell, 5_000);
//! assert_eq!(result.output.trim(), "hello");
//!
//! let id = runner
//!     .execute_async("sleep 1; echo done", ShellKind::PosixShell, 5_000, None)
//!     .unwrap();
//! let finished = runner.get_async_result(id);
//! assert!(finished.success());
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod manager;
pub mod runner;
pub mod shell;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{ExecError, SubmitError};
pub use executor::{execute, execute_blocking, CommandResult, ExecutionContext};
pub use manager::{AsyncId, AsyncManager, AsyncState, OutputCallback, OutputStream};
pub use runner::ShellRunner;
pub use shell::{build, ShellInvocation, ShellKind, ShellPrograms};
