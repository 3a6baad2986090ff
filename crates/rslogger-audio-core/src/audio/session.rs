use crate::{
    AudioSettings, CoreResult,
    audio::{CaptureChunk, CaptureSource, RecordingStore},
};

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Longest wait for a block before the loop re-checks stop and deadline.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Everything the blocking capture loop needs for one session.
#[derive(Debug)]
pub(crate) struct CaptureJob {
    pub(crate) settings: AudioSettings,
    pub(crate) path: PathBuf,
    pub(crate) duration: Option<Duration>,
    pub(crate) stop: CancellationToken,
}

/// What a finished capture handed to the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CaptureReport {
    pub(crate) duration_seconds: f64,
    pub(crate) sample_count: usize,
}

/// How a capture run ended.
#[derive(Debug)]
pub(crate) enum CaptureRun {
    /// Stream acquisition failed; the error went back through `opened`.
    NotStarted,
    /// Capture ran and the store was called.
    Finished(CoreResult<CaptureReport>),
}

/// Open the stream, collect samples until stop, deadline or end of stream,
/// then hand everything captured to the store.
///
/// Blocking: run inside `spawn_blocking`. `opened` receives the stream
/// acquisition result exactly once, before any sample is read. Samples are
/// flushed even when the loop ends on a stream error or cancellation.
#[instrument(skip_all, fields(path = ?job.path))]
pub(crate) fn run_capture(
    source: &dyn CaptureSource,
    store: &dyn RecordingStore,
    job: CaptureJob,
    opened: oneshot::Sender<CoreResult<()>>,
) -> CaptureRun {
    let mut stream = match source.open(&job.settings) {
        Ok(stream) => {
            let _ = opened.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = opened.send(Err(e));
            return CaptureRun::NotStarted;
        }
    };

    // A deadline past the clock's range behaves like no deadline.
    let deadline = job.duration.and_then(|d| Instant::now().checked_add(d));
    let mut samples: Vec<f32> = Vec::new();
    let mut failure = None;

    loop {
        if job.stop.is_cancelled() {
            debug!("Capture stop requested");
            break;
        }

        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    debug!("Capture duration elapsed");
                    break;
                }
                (deadline - now).min(POLL_INTERVAL)
            }
            None => POLL_INTERVAL,
        };

        match stream.next_chunk(wait) {
            Ok(CaptureChunk::Samples(chunk)) => samples.extend_from_slice(&chunk),
            Ok(CaptureChunk::Timeout) => {}
            Ok(CaptureChunk::Ended) => {
                info!("Capture source ended");
                break;
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    drop(stream);

    if let Some(duration) = job.duration {
        let channels = usize::from(job.settings.channels);
        let frames = (duration.as_secs_f64() * f64::from(job.settings.samplerate)) as usize;
        samples.truncate(frames.saturating_mul(channels));
    }

    let sample_count = samples.len();
    debug!(sample_count, "Captured audio samples");

    let saved = store.save(&samples, &job.settings, &job.path);

    let result = match (failure, saved) {
        (None, Ok(duration_seconds)) => Ok(CaptureReport {
            duration_seconds,
            sample_count,
        }),
        (None, Err(e)) => Err(e),
        (Some(e), Ok(_)) => Err(e),
        (Some(e), Err(save_error)) => {
            error!(error = %save_error, "Failed to flush samples after capture error");
            Err(e)
        }
    };

    CaptureRun::Finished(result)
}
