use crate::{AudioSettings, CoreResult, ModuleId, RecorderError};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recording lifecycle state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    /// Not attached to the bus.
    Disconnected,
    /// Attached and ready to record.
    Idle,
    /// A recording session is running.
    Recording,
    /// The last command or capture failed; still answers commands.
    Error,
}

impl ModuleState {
    /// Wire name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleState::Disconnected => "disconnected",
            ModuleState::Idle => "idle",
            ModuleState::Recording => "recording",
            ModuleState::Error => "error",
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full module status, published on every transition and every heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Publishing module.
    pub module_id: String,
    /// Current state.
    pub state: ModuleState,
    /// When the status was produced.
    pub timestamp: DateTime<Utc>,
    /// Settings in effect.
    pub config: AudioSettings,
    /// Running session, present only while recording.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<String>,
    /// Target file of the running session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Most recent failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusMessage {
    /// Final status of a module leaving the bus, also used as its MQTT
    /// last will.
    pub fn disconnected(module_id: &ModuleId, config: AudioSettings) -> Self {
        Self {
            module_id: module_id.to_string(),
            state: ModuleState::Disconnected,
            timestamp: Utc::now(),
            config,
            recording_id: None,
            filename: None,
            error: None,
        }
    }

    /// Decode from the wire.
    #[track_caller]
    pub fn decode(payload: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| RecorderError::protocol(format!("Invalid status: {e}")))
    }

    /// Encode for publishing.
    #[track_caller]
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
