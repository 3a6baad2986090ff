use rslogger_audio_core::RecorderError;

use std::{panic::Location, result::Result as StdResult};

use error_location::ErrorLocation;
use thiserror::Error;

/// Application-level errors for the rslogger-audio binary.
///
/// All variants include `ErrorLocation` for call-site tracking.
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from rslogger-audio-core.
    #[error("Recorder error: {source} {location}")]
    Core {
        /// The underlying recorder error.
        #[source]
        source: RecorderError,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Configuration loading, validation or saving error.
    #[error("Configuration error: {reason} {location}")]
    ConfigError {
        /// Human-readable reason for failure.
        reason: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// IO error from filesystem or terminal operations.
    #[error("IO error: {source} {location}")]
    IoError {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Console input that could not be understood.
    #[error("Invalid input: {reason} {location}")]
    Console {
        /// What was wrong with the input.
        reason: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },
}

impl AppError {
    /// Configuration error at the caller's location.
    #[track_caller]
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        AppError::ConfigError {
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Console input error at the caller's location.
    #[track_caller]
    pub(crate) fn console(reason: impl Into<String>) -> Self {
        AppError::Console {
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

// Manual From<RecorderError> with location tracking.
// Cannot use #[from] because it does not support extra fields.
impl From<RecorderError> for AppError {
    #[track_caller]
    fn from(source: RecorderError) -> Self {
        AppError::Core {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for AppError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        AppError::IoError {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Convenience type alias for Results using `AppError`.
pub type Result<T> = StdResult<T, AppError>;
