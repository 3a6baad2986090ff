use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancellation owner for a module's background work.
///
/// One token per concern so shutdown can stop them in a fixed order:
/// heartbeat first, then the receive loop, then any running capture.
#[derive(Debug, Default)]
pub struct ModuleLifecycle {
    heartbeat: CancellationToken,
    receive: CancellationToken,
    capture: CancellationToken,
    shutdown_started: AtomicBool,
}

impl ModuleLifecycle {
    /// Fresh lifecycle with nothing cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observed by the heartbeat loop.
    pub fn heartbeat_token(&self) -> CancellationToken {
        self.heartbeat.clone()
    }

    /// Token observed by the message receive loop.
    pub fn receive_token(&self) -> CancellationToken {
        self.receive.clone()
    }

    /// New token for one capture session, cancelled by shutdown.
    pub fn capture_token(&self) -> CancellationToken {
        self.capture.child_token()
    }

    /// Cancel heartbeat, receive loop and capture, in that order.
    ///
    /// Returns `false` if shutdown had already begun; the second call does
    /// nothing.
    pub fn begin_shutdown(&self) -> bool {
        if self.shutdown_started.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.heartbeat.cancel();
        self.receive.cancel();
        self.capture.cancel();

        info!("Module shutdown started");

        true
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_started.load(Ordering::Acquire)
    }
}
