#![allow(clippy::unwrap_used, clippy::panic)]

use crate::{
    AudioSettingsPatch, Controller, ControllerEvent, ControllerOptions, LocalBus, RecorderError,
    tests::support::{WAIT, module_id, spawn_synthetic},
};

use std::sync::Arc;

use tokio::sync::broadcast;

async fn next_event(events: &mut broadcast::Receiver<ControllerEvent>) -> ControllerEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .unwrap()
        .unwrap()
}

/// WHAT: The controller announces new modules and finished recordings
/// WHY: Operator consoles show fleet changes without polling
#[tokio::test]
async fn given_controller_when_module_joins_and_records_then_events_broadcast() {
    // Given: A controller with an event subscriber
    let bus = LocalBus::new();
    let options = ControllerOptions::default();
    let scheme = options.scheme.clone();
    let controller = Controller::connect(Arc::new(bus.connect("controller")), options)
        .await
        .unwrap();
    let mut events = controller.subscribe_events();

    // When: mic1 comes online and records for 0.2 seconds
    let (_module, _store, _run) = spawn_synthetic(&bus, &scheme, "mic1").await;
    let discovered = next_event(&mut events).await;
    let response = controller
        .start_recording(&module_id("mic1"), Some(0.2), Some("group7".to_string()))
        .await
        .unwrap();
    let completed = next_event(&mut events).await;

    // Then: Discovery, acceptance, then completion with the file name
    assert_eq!(
        discovered,
        ControllerEvent::ModuleDiscovered {
            module_id: module_id("mic1")
        }
    );
    assert!(response.success);
    match completed {
        ControllerEvent::RecordingComplete {
            module_id: id,
            recording_id,
            filename,
            duration_seconds,
        } => {
            assert_eq!(id, module_id("mic1"));
            assert_eq!(recording_id, "group7");
            assert_eq!(filename, "recording_group7_mic1.wav");
            assert!(duration_seconds.unwrap() <= 0.2);
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

/// WHAT: Single-module helpers round-trip through the real module
/// WHY: The console drives modules one at a time through these calls
#[tokio::test]
async fn given_running_module_when_using_helpers_then_module_answers() {
    // Given: A controller and mic1
    let bus = LocalBus::new();
    let options = ControllerOptions::default();
    let scheme = options.scheme.clone();
    let controller = Controller::connect(Arc::new(bus.connect("controller")), options)
        .await
        .unwrap();
    let (module, _store, run) = spawn_synthetic(&bus, &scheme, "mic1").await;
    let mic1 = module_id("mic1");

    // When: Status, config and shutdown in turn
    let status = controller.request_status(&mic1).await.unwrap();
    let config = controller
        .update_config(
            &mic1,
            AudioSettingsPatch {
                channels: Some(2),
                ..AudioSettingsPatch::default()
            },
            false,
        )
        .await
        .unwrap();
    let shutdown = controller.shutdown_module(&mic1).await.unwrap();
    run.await.unwrap().unwrap();

    // Then: Every helper got its answer and the module is gone
    assert_eq!(status.data.unwrap()["status"]["state"], "idle");
    assert_eq!(config.data.unwrap()["config"]["channels"], 2);
    assert_eq!(shutdown.message, "Shutting down");
    assert_eq!(module.settings().await.channels, 2);
    assert_eq!(controller.modules().await.len(), 1);
}

/// WHAT: After controller shutdown, commands fail fast
/// WHY: Nothing routes responses any more, so waiting would always time out
#[tokio::test]
async fn given_stopped_controller_when_sending_then_correlator_closed() {
    // Given: A controller that has been shut down
    let bus = LocalBus::new();
    let controller = Controller::connect(
        Arc::new(bus.connect("controller")),
        ControllerOptions::default(),
    )
    .await
    .unwrap();
    controller.shutdown().await;

    // When: Sending a command
    let result = controller.request_status(&module_id("mic1")).await;

    // Then: Closed, nothing pending
    assert!(matches!(result, Err(RecorderError::CorrelatorClosed { .. })));
    assert_eq!(controller.pending_requests(), 0);
}
