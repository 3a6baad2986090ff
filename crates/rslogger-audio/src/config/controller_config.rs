use crate::config::{default_offline_after_secs, default_request_timeout_secs};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fleet controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Seconds to wait for a module's response.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Seconds without a status before a module counts as offline.
    #[serde(default = "default_offline_after_secs")]
    pub offline_after_secs: u64,
}

impl ControllerConfig {
    /// Response deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Registry freshness window.
    pub fn offline_after(&self) -> Duration {
        Duration::from_secs(self.offline_after_secs)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            offline_after_secs: default_offline_after_secs(),
        }
    }
}
