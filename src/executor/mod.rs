//! Command execution module
//!
//! Provides the single definition of run semantics shared by synchronous
//! and asynchronous callers:
//! - Timeout support
//! - Output capture on both streams
//! - Working directory and environment overrides
//! - Cooperative cancellation that terminates the child

pub mod context;
pub mod engine;
pub mod result;

pub use context::ExecutionContext;
pub use engine::{execute, execute_blocking, execute_with_cancel};
pub use result::{CommandResult, FAILED_EXIT_CODE};
