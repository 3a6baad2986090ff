#![allow(clippy::unwrap_used, clippy::panic)]

use crate::{
    CaptureChunk, RecorderError,
    audio::{CaptureJob, CaptureRun, run_capture},
    tests::support::{FailingCaptureSource, MemoryStore, ScriptedSource, test_settings},
};

use std::{path::PathBuf, time::Duration};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

fn job(duration: Option<Duration>) -> CaptureJob {
    CaptureJob {
        settings: test_settings(),
        path: PathBuf::from("recordings/recording_test_mic1.wav"),
        duration,
        stop: CancellationToken::new(),
    }
}

/// WHAT: A device that cannot be opened reports through the open channel only
/// WHY: `start` must be answered with the failure before any session exists
#[test]
fn given_failing_source_when_running_capture_then_not_started_and_open_error_sent() {
    // Given: A source that cannot open and a memory store
    let store = MemoryStore::default();
    let (opened_tx, mut opened_rx) = oneshot::channel();

    // When: Running the capture
    let run = run_capture(&FailingCaptureSource, &store, job(None), opened_tx);

    // Then: NotStarted, the open error was delivered, nothing saved
    assert!(matches!(run, CaptureRun::NotStarted));
    assert!(matches!(
        opened_rx.try_recv().unwrap(),
        Err(RecorderError::NoMicrophoneFound { .. })
    ));
    assert!(store.saves().is_empty());
}

/// WHAT: A source that ends hands everything it produced to the store
/// WHY: Samples must never be lost between the stream and the file
#[test]
fn given_source_that_ends_when_running_capture_then_all_samples_saved() {
    // Given: A source producing two blocks then ending
    let source = ScriptedSource::new(vec![
        Ok(CaptureChunk::Samples(vec![0.1; 100])),
        Ok(CaptureChunk::Timeout),
        Ok(CaptureChunk::Samples(vec![0.2; 50])),
    ]);
    let store = MemoryStore::default();
    let (opened_tx, mut opened_rx) = oneshot::channel();

    // When: Running until the source ends
    let run = run_capture(&source, &store, job(None), opened_tx);

    // Then: 150 samples saved and reported
    assert!(opened_rx.try_recv().unwrap().is_ok());
    let report = match run {
        CaptureRun::Finished(Ok(report)) => report,
        other => panic!("expected a finished capture, got {other:?}"),
    };
    assert_eq!(report.sample_count, 150);
    assert_eq!(store.saves()[0].1, 150);
}

/// WHAT: A stream error mid-capture still flushes what was captured
/// WHY: A device unplugged halfway must not cost the first half of the take
#[test]
fn given_stream_error_after_samples_when_running_capture_then_samples_saved_and_error_returned() {
    // Given: A source that fails after one block
    let source = ScriptedSource::new(vec![
        Ok(CaptureChunk::Samples(vec![0.5; 80])),
        Err(RecorderError::capture("device unplugged")),
    ]);
    let store = MemoryStore::default();
    let (opened_tx, _opened_rx) = oneshot::channel();

    // When: Running
    let run = run_capture(&source, &store, job(None), opened_tx);

    // Then: Error reported, samples still saved
    assert!(matches!(
        run,
        CaptureRun::Finished(Err(RecorderError::Capture { .. }))
    ));
    assert_eq!(store.saves()[0].1, 80);
}

/// WHAT: Fixed-duration captures are cut to exactly the requested length
/// WHY: The persisted file must not overrun because the last block straddled the deadline
#[test]
fn given_more_samples_than_duration_when_running_capture_then_truncated() {
    // Given: 0.01 s at 8 kHz mono is 80 frames; the source offers 200 at once
    let source = ScriptedSource::new(vec![Ok(CaptureChunk::Samples(vec![0.0; 200]))]);
    let store = MemoryStore::default();
    let (opened_tx, _opened_rx) = oneshot::channel();

    // When: Running with that duration
    let run = run_capture(
        &source,
        &store,
        job(Some(Duration::from_millis(10))),
        opened_tx,
    );

    // Then: Exactly 80 samples saved
    assert!(matches!(run, CaptureRun::Finished(Ok(_))));
    assert_eq!(store.saves()[0].1, 80);
}

/// WHAT: A cancelled stop token ends the capture and still saves
/// WHY: `stop` and shutdown flush rather than discard
#[test]
fn given_cancelled_token_when_running_capture_then_saved_without_reading() {
    // Given: A job whose stop token is already cancelled
    let source = ScriptedSource::new(vec![Ok(CaptureChunk::Samples(vec![0.3; 10]))]);
    let store = MemoryStore::default();
    let job = job(None);
    job.stop.cancel();
    let (opened_tx, _opened_rx) = oneshot::channel();

    // When: Running
    let run = run_capture(&source, &store, job, opened_tx);

    // Then: Finished with an empty capture handed to the store
    let report = match run {
        CaptureRun::Finished(Ok(report)) => report,
        other => panic!("expected a finished capture, got {other:?}"),
    };
    assert_eq!(report.sample_count, 0);
    assert_eq!(store.saves().len(), 1);
}

/// WHAT: A duration beyond the clock's range records until the source ends
/// WHY: An out-of-range deadline must not abort the capture thread
#[test]
fn given_duration_past_clock_range_when_running_capture_then_all_samples_saved() {
    // Given: The largest representable duration and a short script
    let source = ScriptedSource::new(vec![Ok(CaptureChunk::Samples(vec![0.4; 120]))]);
    let store = MemoryStore::default();
    let (opened_tx, _opened_rx) = oneshot::channel();

    // When: Running
    let run = run_capture(&source, &store, job(Some(Duration::MAX)), opened_tx);

    // Then: Finished normally, nothing truncated
    assert!(matches!(run, CaptureRun::Finished(Ok(_))));
    assert_eq!(store.saves()[0].1, 120);
}
