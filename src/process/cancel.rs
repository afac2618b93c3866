//! Cooperative cancellation for long-running tool invocations

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Shared flag that asks a running invocation to stop
///
/// Clones share the same flag. Cancelling kills the child process tree; the
/// orchestrator still removes its temporary directory afterwards.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel this token when the process receives Ctrl-C (SIGINT/SIGTERM)
    ///
    /// The tool runs in its own process group and never sees the terminal's
    /// interrupt, so this is how an interactive user stops it. Only one
    /// handler can be installed per process.
    pub fn cancel_on_interrupt(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupted, stopping the separation tool");
            token.cancel();
        })
    }
}
