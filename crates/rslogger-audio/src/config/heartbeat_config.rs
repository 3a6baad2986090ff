use crate::config::{default_heartbeat_enabled, default_heartbeat_interval_secs};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Module heartbeat configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Whether modules republish status periodically.
    #[serde(default = "default_heartbeat_enabled")]
    pub enabled: bool,

    /// Seconds between heartbeats.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub interval_secs: u64,
}

impl HeartbeatConfig {
    /// Interval to hand to the module, `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.enabled
            .then_some(Duration::from_secs(self.interval_secs))
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: default_heartbeat_enabled(),
            interval_secs: default_heartbeat_interval_secs(),
        }
    }
}
