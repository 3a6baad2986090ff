use crate::{AudioSettings, CoreResult, RecorderError};

use std::{fs, path::Path};

use chrono::Utc;
use hound::{SampleFormat, WavSpec, WavWriter};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Durable sink for finished captures.
pub trait RecordingStore: Send + Sync {
    /// Persist interleaved `samples` recorded with `settings` at `path`.
    ///
    /// Returns the persisted length in seconds. Called from a blocking
    /// thread.
    fn save(&self, samples: &[f32], settings: &AudioSettings, path: &Path) -> CoreResult<f64>;
}

/// Durable sink for module settings changed by a `config` command.
pub trait SettingsStore: Send + Sync {
    /// Persist `settings` so the next start picks them up.
    fn save(&self, settings: &AudioSettings) -> CoreResult<()>;
}

#[derive(Serialize)]
struct SidecarMetadata<'a> {
    timestamp: String,
    duration_seconds: f64,
    device: Option<&'a str>,
    config: &'a AudioSettings,
    audio_file: &'a str,
}

/// Writes 32-bit float WAV files plus a JSON metadata sidecar.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavStore;

/// Seconds of audio in an interleaved buffer.
pub fn duration_seconds(sample_count: usize, settings: &AudioSettings) -> f64 {
    let frames = sample_count / usize::from(settings.channels.max(1));
    frames as f64 / f64::from(settings.samplerate.max(1))
}

impl RecordingStore for WavStore {
    #[track_caller]
    #[instrument(skip(self, samples))]
    fn save(&self, samples: &[f32], settings: &AudioSettings, path: &Path) -> CoreResult<f64> {
        if samples.is_empty() {
            warn!(path = ?path, "No audio data recorded, nothing written");
            return Ok(0.0);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                RecorderError::persistence(format!("Failed to create {:?}: {}", parent, e))
            })?;
        }

        let spec = WavSpec {
            channels: settings.channels,
            sample_rate: settings.samplerate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let mut writer = WavWriter::create(path, spec).map_err(|e| {
            RecorderError::persistence(format!("Failed to create {:?}: {}", path, e))
        })?;

        for &sample in samples {
            writer.write_sample(sample).map_err(|e| {
                RecorderError::persistence(format!("Failed to write {:?}: {}", path, e))
            })?;
        }

        writer.finalize().map_err(|e| {
            RecorderError::persistence(format!("Failed to finalize {:?}: {}", path, e))
        })?;

        let duration = duration_seconds(samples.len(), settings);
        let audio_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();

        let metadata = SidecarMetadata {
            timestamp: Utc::now().to_rfc3339(),
            duration_seconds: duration,
            device: settings.device.as_deref(),
            config: settings,
            audio_file,
        };
        let metadata_path = path.with_extension("json");
        let contents = serde_json::to_string_pretty(&metadata)?;

        fs::write(&metadata_path, contents).map_err(|e| {
            RecorderError::persistence(format!("Failed to write {:?}: {}", metadata_path, e))
        })?;

        info!(
            path = ?path,
            duration_seconds = duration,
            "Recording saved"
        );

        Ok(duration)
    }
}
