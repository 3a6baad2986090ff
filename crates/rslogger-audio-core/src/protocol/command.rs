use crate::{AudioSettingsPatch, CoreResult, RecorderError};

use std::panic::Location;

use chrono::Local;
use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Local-time layout of generated recording ids, millisecond resolution.
pub const RECORDING_ID_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Recording id for a session whose requester did not name one.
pub fn generate_recording_id() -> String {
    Local::now().format(RECORDING_ID_FORMAT).to_string()
}

/// Command kinds a module understands, as they appear on the wire.
pub const COMMAND_KINDS: [&str; 5] = ["start", "stop", "status", "config", "shutdown"];

/// A request addressed to one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command {
    /// Begin a recording session.
    Start {
        /// Fixed length in seconds; continuous until `stop` when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        /// Shared group identifier; derived from local time when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recording_id: Option<String>,
        /// Settings to merge before the stream is opened.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<AudioSettingsPatch>,
    },
    /// End the running session.
    Stop,
    /// Publish current status immediately.
    Status,
    /// Merge settings, optionally persisting them.
    Config {
        /// Fields to merge.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<AudioSettingsPatch>,
        /// Write merged settings to durable storage.
        #[serde(default)]
        save: bool,
    },
    /// Stop everything and disconnect.
    Shutdown,
}

impl Command {
    /// Wire name of this command.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Stop => "stop",
            Command::Status => "status",
            Command::Config { .. } => "config",
            Command::Shutdown => "shutdown",
        }
    }
}

/// Command plus the correlation id the requester expects back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Requester-generated correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// The command itself.
    #[serde(flatten)]
    pub command: Command,
}

impl CommandEnvelope {
    /// Decode one inbound command payload.
    ///
    /// Distinguishes an unknown `command` value from a payload that is not a
    /// command at all, so the dispatcher can log them at different levels.
    #[track_caller]
    pub fn decode(payload: &[u8]) -> CoreResult<Self> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| RecorderError::protocol(format!("Invalid JSON: {e}")))?;

        let kind = value
            .get("command")
            .ok_or_else(|| RecorderError::protocol("Missing \"command\" field"))?
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| RecorderError::protocol("\"command\" must be a string"))?;

        if !COMMAND_KINDS.contains(&kind.as_str()) {
            return Err(RecorderError::UnknownCommand {
                command: kind,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        serde_json::from_value(value)
            .map_err(|e| RecorderError::protocol(format!("Invalid {kind} command: {e}")))
    }

    /// Encode for publishing.
    #[track_caller]
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
