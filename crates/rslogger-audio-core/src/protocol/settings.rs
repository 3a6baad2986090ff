use crate::{CoreResult, RecorderError};

use std::{panic::Location, path::PathBuf};

use error_location::ErrorLocation;
use serde::{Deserialize, Deserializer, Serialize};

/// Default capture sample rate in Hz.
pub const DEFAULT_SAMPLERATE: u32 = 44_100;
/// Default channel count.
pub const DEFAULT_CHANNELS: u16 = 1;
/// The only sample type the capture path produces.
pub const SUPPORTED_DTYPE: &str = "float32";

fn default_samplerate() -> u32 {
    DEFAULT_SAMPLERATE
}

fn default_channels() -> u16 {
    DEFAULT_CHANNELS
}

fn default_dtype() -> String {
    SUPPORTED_DTYPE.to_string()
}

fn default_recording_dir() -> PathBuf {
    PathBuf::from("recordings")
}

/// Audio settings a module records with and reports in every status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Sample rate in Hz.
    #[serde(default = "default_samplerate")]
    pub samplerate: u32,
    /// Number of interleaved channels.
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Input device name; `None` selects the host default.
    #[serde(default)]
    pub device: Option<String>,
    /// Sample type name.
    #[serde(default = "default_dtype")]
    pub dtype: String,
    /// Directory recordings are written into.
    #[serde(default = "default_recording_dir")]
    pub recording_dir: PathBuf,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            samplerate: DEFAULT_SAMPLERATE,
            channels: DEFAULT_CHANNELS,
            device: None,
            dtype: default_dtype(),
            recording_dir: default_recording_dir(),
        }
    }
}

impl AudioSettings {
    /// Merge the fields present in `patch`, leaving the rest untouched.
    ///
    /// The merged result is validated before it replaces `self`, so a
    /// rejected patch changes nothing.
    #[track_caller]
    pub fn apply(&mut self, patch: &AudioSettingsPatch) -> CoreResult<()> {
        let mut merged = self.clone();

        if let Some(samplerate) = patch.samplerate {
            merged.samplerate = samplerate;
        }
        if let Some(channels) = patch.channels {
            merged.channels = channels;
        }
        if let Some(device) = &patch.device {
            merged.device = device.clone();
        }
        if let Some(dtype) = &patch.dtype {
            merged.dtype = dtype.clone();
        }
        if let Some(recording_dir) = &patch.recording_dir {
            merged.recording_dir = recording_dir.clone();
        }

        merged.validate()?;
        *self = merged;

        Ok(())
    }

    /// Reject settings the capture path cannot honour.
    #[track_caller]
    pub fn validate(&self) -> CoreResult<()> {
        let reason = if self.samplerate == 0 {
            Some("samplerate must be greater than zero".to_string())
        } else if self.channels == 0 {
            Some("channels must be greater than zero".to_string())
        } else if self.dtype != SUPPORTED_DTYPE {
            Some(format!(
                "unsupported dtype {:?}, only {SUPPORTED_DTYPE} is supported",
                self.dtype
            ))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(RecorderError::Protocol {
                reason: format!("Invalid audio settings: {reason}"),
                location: ErrorLocation::from(Location::caller()),
            }),
            None => Ok(()),
        }
    }
}

/// Partial settings update carried by `start` and `config` commands.
///
/// `device` distinguishes an absent key (keep) from an explicit `null`
/// (reset to the default device).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSettingsPatch {
    /// New sample rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samplerate: Option<u32>,
    /// New channel count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    /// New device selection.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub device: Option<Option<String>>,
    /// New sample type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
    /// New recording directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_dir: Option<PathBuf>,
}

impl AudioSettingsPatch {
    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
