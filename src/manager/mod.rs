//! Asynchronous lifecycle management
//!
//! Commands submitted here run on background tasks through the same
//! engine as synchronous calls. Each one is tracked by id through a
//! small state machine:
//!
//! ```text
//! Running -> Completed | Failed | TimedOut | Cancelled
//! ```

pub mod record;
pub mod registry;
pub mod state;

pub use record::AsyncRecord;
pub use registry::AsyncManager;
pub use state::{AsyncId, AsyncState, OutputCallback, OutputStream};
