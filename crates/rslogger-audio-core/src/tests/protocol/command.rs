#![allow(clippy::unwrap_used, clippy::panic)]

use crate::{
    AudioSettings, Command, CommandEnvelope, CommandResponse, DataEvent, ModuleState,
    RecorderError, StatusMessage, generate_recording_id,
};

use chrono::Utc;
use serde_json::{Value, json};

/// WHAT: A full start command decodes every field
/// WHY: Fleet starts rely on duration and the shared recording id arriving intact
#[test]
fn given_start_payload_when_decoding_then_all_fields_present() {
    // Given: A start command with every optional field
    let payload = json!({
        "command": "start",
        "request_id": "r1",
        "duration": 10,
        "recording_id": "20250101_120000",
        "config": { "channels": 2 }
    });

    // When: Decoding it
    let envelope = CommandEnvelope::decode(payload.to_string().as_bytes()).unwrap();

    // Then: The envelope carries all of it
    assert_eq!(envelope.request_id.as_deref(), Some("r1"));
    match envelope.command {
        Command::Start {
            duration,
            recording_id,
            config,
        } => {
            assert_eq!(duration, Some(10.0));
            assert_eq!(recording_id.as_deref(), Some("20250101_120000"));
            assert_eq!(config.unwrap().channels, Some(2));
        }
        other => panic!("expected start, got {other:?}"),
    }
}

/// WHAT: Bare commands decode without a request id
/// WHY: A command without request_id is still valid and gets a null-id response
#[test]
fn given_bare_stop_when_decoding_then_no_request_id() {
    // Given: A stop command with nothing else
    let payload = br#"{"command":"stop"}"#;

    // When: Decoding
    let envelope = CommandEnvelope::decode(payload).unwrap();

    // Then: Stop with no correlation id
    assert_eq!(envelope.command, Command::Stop);
    assert!(envelope.request_id.is_none());
}

/// WHAT: Unknown command kinds get their own error
/// WHY: The dispatcher logs these at warn, separately from malformed payloads
#[test]
fn given_unknown_command_when_decoding_then_unknown_command_error() {
    // Given: A well-formed payload with an unsupported kind
    let payload = br#"{"command":"reboot","request_id":"r9"}"#;

    // When: Decoding
    let result = CommandEnvelope::decode(payload);

    // Then: UnknownCommand names the kind
    match result {
        Err(RecorderError::UnknownCommand { command, .. }) => assert_eq!(command, "reboot"),
        other => panic!("expected UnknownCommand, got {other:?}"),
    }
}

/// WHAT: Payloads that are not commands are protocol errors
/// WHY: Malformed input must be dropped, never answered or allowed to crash
#[test]
fn given_malformed_payloads_when_decoding_then_protocol_error() {
    // Given: Broken JSON, a missing kind, a non-string kind, a bad field type
    let payloads: [&[u8]; 4] = [
        b"{not json",
        br#"{"request_id":"r1"}"#,
        br#"{"command":5}"#,
        br#"{"command":"start","duration":"long"}"#,
    ];

    for payload in payloads {
        // When: Decoding
        let result = CommandEnvelope::decode(payload);

        // Then: Protocol error
        assert!(
            matches!(result, Err(RecorderError::Protocol { .. })),
            "{:?} should be a protocol error",
            String::from_utf8_lossy(payload)
        );
    }
}

/// WHAT: Encoded envelopes put the kind and request id at the top level
/// WHY: Modules from other implementations read the flat wire layout
#[test]
fn given_config_envelope_when_encoding_then_flat_json() {
    // Given: A config command with save
    let envelope = CommandEnvelope {
        request_id: Some("r2".to_string()),
        command: Command::Config {
            config: None,
            save: true,
        },
    };

    // When: Encoding
    let value: Value = serde_json::from_slice(&envelope.encode().unwrap()).unwrap();

    // Then: Flat object
    assert_eq!(value, json!({"command": "config", "request_id": "r2", "save": true}));
}

/// WHAT: Responses without a request id serialize it as null
/// WHY: Every response carries the field so clients can tell uncorrelated replies apart
#[test]
fn given_response_without_request_id_when_encoding_then_null_request_id() {
    // Given: A failed response with no correlation id
    let response = CommandResponse::failed(None, "Not recording");

    // When: Encoding
    let value: Value = serde_json::from_slice(&response.encode().unwrap()).unwrap();

    // Then: request_id is present and null, data is omitted
    assert_eq!(value["request_id"], Value::Null);
    assert_eq!(value["success"], false);
    assert_eq!(value["message"], "Not recording");
    assert!(value.get("data").is_none());
}

/// WHAT: Idle status omits recording fields
/// WHY: recording_id must be present exactly when the state is recording
#[test]
fn given_idle_status_when_encoding_then_recording_fields_omitted() {
    // Given: An idle status
    let status = StatusMessage {
        module_id: "mic1".to_string(),
        state: ModuleState::Idle,
        timestamp: Utc::now(),
        config: AudioSettings::default(),
        recording_id: None,
        filename: None,
        error: None,
    };

    // When: Encoding
    let value: Value = serde_json::from_slice(&status.encode().unwrap()).unwrap();

    // Then: Only the always-present fields
    assert_eq!(value["state"], "idle");
    assert_eq!(value["config"]["samplerate"], 44_100);
    assert!(value.get("recording_id").is_none());
    assert!(value.get("error").is_none());
}

/// WHAT: Recording-complete events are tagged by event name
/// WHY: The controller dispatches data messages on the "event" field
#[test]
fn given_recording_complete_payload_when_decoding_then_event_fields_present() {
    // Given: A data payload as a module publishes it
    let payload = json!({
        "event": "recording_complete",
        "recording_id": "abc",
        "filename": "recording_abc_mic1.wav",
        "timestamp": "2025-01-01T12:00:00Z",
        "duration_seconds": 10.0
    });

    // When: Decoding
    let event = DataEvent::decode(payload.to_string().as_bytes()).unwrap();

    // Then: Fields survive
    let DataEvent::RecordingComplete {
        recording_id,
        filename,
        duration_seconds,
        ..
    } = event;
    assert_eq!(recording_id, "abc");
    assert_eq!(filename, "recording_abc_mic1.wav");
    assert_eq!(duration_seconds, Some(10.0));
}

/// WHAT: Generated recording ids carry millisecond resolution
/// WHY: Two starts within one second must not share a file name
#[test]
fn given_two_ids_a_few_ms_apart_when_generating_then_distinct() {
    // Given/When: Two ids separated by more than a millisecond
    let first = generate_recording_id();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = generate_recording_id();

    // Then: Both look like YYYYMMDD_HHMMSS_mmm and differ
    for id in [&first, &second] {
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3, "{id}");
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 3);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c == '_'));
    }
    assert_ne!(first, second);
}
