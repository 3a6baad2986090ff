#![allow(clippy::unwrap_used)]

use crate::{AudioSettings, RecordingStore, WavStore, duration_seconds};

use hound::{SampleFormat, WavReader};
use tempfile::TempDir;

/// WHAT: WavStore writes a float WAV plus a JSON sidecar
/// WHY: Downstream tools read the metadata to align recordings from different modules
#[test]
fn given_stereo_samples_when_saving_then_wav_and_sidecar_written() {
    // Given: One second of stereo audio at 8 kHz, and a nested target directory
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("recording_abc_mic1.wav");
    let settings = AudioSettings {
        samplerate: 8_000,
        channels: 2,
        device: Some("USB Mic".to_string()),
        ..AudioSettings::default()
    };
    let samples = vec![0.25f32; 16_000];

    // When: Saving
    let duration = WavStore.save(&samples, &settings, &path).unwrap();

    // Then: One second reported, and the WAV matches the settings
    assert!((duration - 1.0).abs() < f64::EPSILON);
    let reader = WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 8_000);
    assert_eq!(spec.bits_per_sample, 32);
    assert_eq!(spec.sample_format, SampleFormat::Float);
    assert_eq!(reader.len(), 16_000);

    // Then: The sidecar names the audio file and device
    let sidecar: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path.with_extension("json")).unwrap())
            .unwrap();
    assert_eq!(sidecar["audio_file"], "recording_abc_mic1.wav");
    assert_eq!(sidecar["device"], "USB Mic");
    assert_eq!(sidecar["config"]["channels"], 2);
    assert!((sidecar["duration_seconds"].as_f64().unwrap() - 1.0).abs() < f64::EPSILON);
}

/// WHAT: An empty capture writes nothing and reports zero seconds
/// WHY: A stop right after start must not leave an empty file behind
#[test]
fn given_no_samples_when_saving_then_no_file_and_zero_duration() {
    // Given: An empty capture
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("recording_empty_mic1.wav");

    // When: Saving
    let duration = WavStore
        .save(&[], &AudioSettings::default(), &path)
        .unwrap();

    // Then: Zero and nothing on disk
    assert_eq!(duration, 0.0);
    assert!(!path.exists());
    assert!(!path.with_extension("json").exists());
}

/// WHAT: Duration counts frames, not samples
/// WHY: Stereo buffers hold two samples per frame
#[test]
fn given_interleaved_stereo_buffer_when_computing_duration_then_frames_used() {
    // Given: 88200 samples of stereo at 44.1 kHz
    let settings = AudioSettings {
        channels: 2,
        ..AudioSettings::default()
    };

    // When: Computing duration
    let seconds = duration_seconds(88_200, &settings);

    // Then: One second
    assert!((seconds - 1.0).abs() < f64::EPSILON);
}
