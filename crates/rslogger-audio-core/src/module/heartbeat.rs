//! Periodic status republishing for liveness detection.
//!
//! Status is also published eagerly on every transition; the heartbeat only
//! covers the gap for a module that is idle and receives no commands.

use crate::CoreResult;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

/// Default time between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Something that can publish its full current status.
#[async_trait]
pub trait StatusBeacon: Send + Sync {
    /// Publish the current status once.
    async fn publish_status(&self) -> CoreResult<()>;
}

/// Background loop publishing status every `interval`.
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    interval: Duration,
}

impl Heartbeat {
    /// Heartbeat with a fixed interval.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Publish every interval until `cancel` fires; returns beats sent.
    ///
    /// The first beat comes one interval after start. A failed publish is
    /// logged and the loop carries on.
    #[instrument(
        skip(self, beacon, cancel),
        fields(interval_ms = self.interval.as_millis() as u64)
    )]
    pub async fn run<B>(&self, beacon: &B, cancel: CancellationToken) -> u64
    where
        B: StatusBeacon + ?Sized,
    {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut beats = 0u64;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(beats, "Heartbeat stopped");
                    break;
                }

                _ = ticker.tick() => {
                    match beacon.publish_status().await {
                        Ok(()) => {
                            beats += 1;
                            trace!(beats, "Heartbeat sent");
                        }
                        Err(e) => warn!(error = %e, "Heartbeat publish failed"),
                    }
                }
            }
        }

        beats
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}
