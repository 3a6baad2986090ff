use std::panic::Location;

use error_location::ErrorLocation;
use thiserror::Error;

/// Recorder protocol and collaborator errors with source location tracking.
///
/// A command rejected by a module (double start, stop while idle) is not an
/// error: it travels as a response with `success = false`.
#[derive(Error, Debug)]
pub enum RecorderError {
    /// Inbound payload could not be decoded.
    #[error("Protocol error: {reason} {location}")]
    Protocol {
        /// What was wrong with the payload.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Well-formed payload naming a command kind this module does not know.
    #[error("Unknown command: {command:?} {location}")]
    UnknownCommand {
        /// The `command` value as received.
        command: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Module identifier cannot be embedded in a topic.
    #[error("Invalid module id {module_id:?}: {reason} {location}")]
    InvalidModuleId {
        /// Identifier as supplied.
        module_id: String,
        /// Why it was refused.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// No response arrived before the correlator deadline.
    #[error("No response from module {module_id} for request {request_id} {location}")]
    Timeout {
        /// Module the command was addressed to.
        module_id: String,
        /// Identifier of the abandoned request.
        request_id: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Correlator shut down while the request was outstanding.
    #[error("Correlator closed before module {module_id} answered {location}")]
    CorrelatorClosed {
        /// Module the command was addressed to.
        module_id: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// No audio input device found.
    #[error("No microphone found {location}")]
    NoMicrophoneFound {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Audio capture failed (device, stream or callback).
    #[error("Capture error: {reason} {location}")]
    Capture {
        /// Description of the capture failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Writing a recording or settings to durable storage failed.
    #[error("Persistence error: {reason} {location}")]
    Persistence {
        /// Description of the persistence failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Message bus refused a subscribe or publish.
    #[error("Bus error: {reason} {location}")]
    Bus {
        /// Description of the bus failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Outbound payload could not be encoded.
    #[error("Serialization error: {source} {location}")]
    Serialization {
        /// Underlying serde_json error.
        #[source]
        source: serde_json::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl RecorderError {
    /// Protocol error at the caller's location.
    #[track_caller]
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        RecorderError::Protocol {
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Capture error at the caller's location.
    #[track_caller]
    pub(crate) fn capture(reason: impl Into<String>) -> Self {
        RecorderError::Capture {
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Persistence error at the caller's location.
    #[track_caller]
    pub fn persistence(reason: impl Into<String>) -> Self {
        RecorderError::Persistence {
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Bus error at the caller's location.
    #[track_caller]
    pub fn bus(reason: impl Into<String>) -> Self {
        RecorderError::Bus {
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// True for the controller-side deadline failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RecorderError::Timeout { .. })
    }
}

// Cannot use #[from] because it does not support extra fields.
impl From<serde_json::Error> for RecorderError {
    #[track_caller]
    fn from(source: serde_json::Error) -> Self {
        RecorderError::Serialization {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Result type alias using [`RecorderError`].
pub type Result<T> = std::result::Result<T, RecorderError>;
