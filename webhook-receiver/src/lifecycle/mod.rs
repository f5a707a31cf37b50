//! Server lifecycle management.
//!
//! # Data Flow
//! ```text
//! start():   Stopped → Starting → bind → Listening
//! trigger(): Listening → ShuttingDown   (one-time latch)
//! wait():    stop accepting → drain in-flight → Stopped
//!            deadline exceeded → abort loop and connections → Stopped (forced)
//! ```
//!
//! SIGINT and SIGTERM both map onto the same trigger. The drain deadline is
//! armed exactly once, when the latch flips.

mod connections;
pub mod server;
pub mod signals;

pub use server::{
    start, LifecycleError, LifecycleState, ServerHandle, ShutdownOutcome, ShutdownTrigger,
};
pub use signals::listen_for_signals;
