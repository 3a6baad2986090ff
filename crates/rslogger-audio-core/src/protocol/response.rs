use crate::{CoreResult, RecorderError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one command, published on the module's response topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Correlation id copied from the command; `null` when it had none.
    #[serde(default)]
    pub request_id: Option<String>,
    /// Whether the module carried out the command.
    pub success: bool,
    /// Human-readable outcome.
    #[serde(default)]
    pub message: String,
    /// When the module produced the response.
    pub timestamp: DateTime<Utc>,
    /// Command-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandResponse {
    /// Successful outcome.
    pub fn ok(request_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            request_id,
            success: true,
            message: message.into(),
            timestamp: Utc::now(),
            data: None,
        }
    }

    /// Rejected or failed outcome.
    pub fn failed(request_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(request_id, message)
        }
    }

    /// Attach a data payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Decode from the wire.
    #[track_caller]
    pub fn decode(payload: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| RecorderError::protocol(format!("Invalid response: {e}")))
    }

    /// Encode for publishing.
    #[track_caller]
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
