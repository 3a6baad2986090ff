use crate::{CoreResult, RecorderError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete events a module publishes on its data topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DataEvent {
    /// A session ended and its samples were handed to the store.
    RecordingComplete {
        /// Session identifier.
        recording_id: String,
        /// Written file name.
        filename: String,
        /// Completion time.
        timestamp: DateTime<Utc>,
        /// Length of audio persisted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_seconds: Option<f64>,
    },
}

impl DataEvent {
    /// Decode from the wire.
    #[track_caller]
    pub fn decode(payload: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| RecorderError::protocol(format!("Invalid data event: {e}")))
    }

    /// Encode for publishing.
    #[track_caller]
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
