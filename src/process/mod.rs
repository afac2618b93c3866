//! External process execution
//!
//! Spawns a command, drains stdout and stderr on two scoped threads, and
//! enforces an optional deadline and cancellation by killing the whole
//! process tree.

pub mod cancel;
pub mod runner;

pub use cancel::CancellationToken;
pub use runner::{run, run_captured, RunError, RunOptions, ToolInvocation};
