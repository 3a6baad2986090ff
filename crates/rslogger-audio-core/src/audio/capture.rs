use crate::{AudioSettings, CoreResult, RecorderError};

use std::{
    panic::Location,
    sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError},
    time::Duration,
};

use cpal::{
    Device, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use error_location::ErrorLocation;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

/// Callback buffers held between the audio thread and the capture loop.
///
/// At typical 10ms callbacks this is roughly five seconds of slack before
/// buffers are dropped.
pub(crate) const MAX_PENDING_CHUNKS: usize = 512;

/// Result of waiting for the next block of samples.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureChunk {
    /// Interleaved samples in the stream's channel layout.
    Samples(Vec<f32>),
    /// Nothing arrived within the wait.
    Timeout,
    /// The source will produce no more samples.
    Ended,
}

/// An open input stream. Lives on the blocking capture thread only.
pub trait CaptureStream {
    /// Wait up to `timeout` for the next block.
    fn next_chunk(&mut self, timeout: Duration) -> CoreResult<CaptureChunk>;
}

/// Opens input streams for a module's audio settings.
pub trait CaptureSource: Send + Sync {
    /// Open a stream matching `settings`.
    ///
    /// Called from a blocking thread; the stream never crosses threads.
    fn open(&self, settings: &AudioSettings) -> CoreResult<Box<dyn CaptureStream>>;
}

/// Input device description for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputDevice {
    /// Host device name.
    pub name: String,
    /// Channels of the default input config.
    pub channels: u16,
    /// Sample rate of the default input config.
    pub samplerate: u32,
    /// Whether this is the host's default input.
    pub is_default: bool,
}

#[allow(deprecated)] // cpal 0.17 deprecates name() but description() is not yet stable
fn device_name(device: &Device) -> String {
    device.name().unwrap_or_else(|_| "Unknown".to_string())
}

/// Enumerate input devices on the default host.
#[track_caller]
#[instrument]
pub fn list_input_devices() -> CoreResult<Vec<InputDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().as_ref().map(device_name);

    let devices = host.input_devices().map_err(|e| RecorderError::Capture {
        reason: format!("Failed to enumerate input devices: {}", e),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let listed = devices
        .filter_map(|device| {
            let config = device.default_input_config().ok()?;
            let name = device_name(&device);
            Some(InputDevice {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                channels: config.channels(),
                samplerate: config.sample_rate(),
            })
        })
        .collect();

    Ok(listed)
}

/// Captures from a host input device through cpal.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalCaptureSource;

impl CpalCaptureSource {
    #[track_caller]
    fn find_device(settings: &AudioSettings) -> CoreResult<Device> {
        let host = cpal::default_host();

        let Some(wanted) = settings.device.as_deref() else {
            return host
                .default_input_device()
                .ok_or(RecorderError::NoMicrophoneFound {
                    location: ErrorLocation::from(Location::caller()),
                });
        };

        let mut devices = host.input_devices().map_err(|e| RecorderError::Capture {
            reason: format!("Failed to enumerate input devices: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        devices
            .find(|device| device_name(device) == wanted)
            .ok_or_else(|| RecorderError::Capture {
                reason: format!("Input device {:?} not found", wanted),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

impl CaptureSource for CpalCaptureSource {
    #[track_caller]
    #[instrument(skip(self))]
    fn open(&self, settings: &AudioSettings) -> CoreResult<Box<dyn CaptureStream>> {
        settings.validate()?;

        let device = Self::find_device(settings)?;
        let config = StreamConfig {
            channels: settings.channels,
            sample_rate: settings.samplerate,
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx): (SyncSender<Vec<f32>>, Receiver<Vec<f32>>) =
            mpsc::sync_channel(MAX_PENDING_CHUNKS);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Never block the audio thread: drop the block if the
                    // capture loop has fallen behind.
                    match tx.try_send(data.to_vec()) {
                        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!(dropped = data.len(), "Capture queue full, dropping samples");
                        }
                    }
                },
                |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| RecorderError::Capture {
                reason: format!("Failed to build stream: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        stream.play().map_err(|e| RecorderError::Capture {
            reason: format!("Failed to start stream: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(
            device = %device_name(&device),
            sample_rate = settings.samplerate,
            channels = settings.channels,
            "Audio capture started"
        );

        Ok(Box::new(CpalStream {
            _stream: stream,
            samples: rx,
        }))
    }
}

/// Keeps the cpal stream alive while the loop drains its callback queue.
struct CpalStream {
    _stream: Stream,
    samples: Receiver<Vec<f32>>,
}

impl CaptureStream for CpalStream {
    fn next_chunk(&mut self, timeout: Duration) -> CoreResult<CaptureChunk> {
        match self.samples.recv_timeout(timeout) {
            Ok(samples) => Ok(CaptureChunk::Samples(samples)),
            Err(RecvTimeoutError::Timeout) => Ok(CaptureChunk::Timeout),
            Err(RecvTimeoutError::Disconnected) => Ok(CaptureChunk::Ended),
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        info!("Audio capture stopped");
    }
}
