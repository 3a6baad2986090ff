#![allow(clippy::unwrap_used)]

use crate::{LocalBus, MessageBus, RecorderError};

use std::time::Duration;

/// WHAT: Publishing reaches every session whose pattern matches
/// WHY: Status must reach both the controller and any other observer
#[tokio::test]
async fn given_two_wildcard_subscribers_when_publishing_then_both_receive() {
    // Given: Two sessions watching all statuses
    let bus = LocalBus::new();
    let first = bus.connect("first");
    let second = bus.connect("second");
    let publisher = bus.connect("mic1");
    first.subscribe("rslogger/audio/+/status").await.unwrap();
    second.subscribe("rslogger/audio/+/status").await.unwrap();

    // When: A module publishes its status
    publisher
        .publish("rslogger/audio/mic1/status", b"{}".to_vec())
        .await
        .unwrap();

    // Then: Both sessions get the same message
    let a = first.next_message().await.unwrap();
    let b = second.next_message().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.topic, "rslogger/audio/mic1/status");
}

/// WHAT: Sessions do not see topics they did not subscribe to
/// WHY: Modules must not receive each other's commands
#[tokio::test]
async fn given_subscription_to_one_module_when_other_module_addressed_then_nothing_delivered() {
    // Given: mic1 listening on its own command topic
    let bus = LocalBus::new();
    let mic1 = bus.connect("mic1");
    let controller = bus.connect("controller");
    mic1.subscribe("rslogger/audio/mic1/command").await.unwrap();

    // When: The controller addresses mic2
    controller
        .publish("rslogger/audio/mic2/command", b"{}".to_vec())
        .await
        .unwrap();

    // Then: mic1's inbox stays empty
    let received = tokio::time::timeout(Duration::from_millis(50), mic1.next_message()).await;
    assert!(received.is_err());
}

/// WHAT: Messages from one publisher arrive in publish order
/// WHY: Commands to one module are processed sequentially in arrival order
#[tokio::test]
async fn given_several_publishes_when_receiving_then_order_preserved() {
    // Given: A subscriber and a publisher
    let bus = LocalBus::new();
    let subscriber = bus.connect("mic1");
    let publisher = bus.connect("controller");
    subscriber.subscribe("t/#").await.unwrap();

    // When: Publishing three messages
    for n in 0..3u8 {
        publisher.publish("t/x", vec![n]).await.unwrap();
    }

    // Then: They arrive in order
    for n in 0..3u8 {
        assert_eq!(subscriber.next_message().await.unwrap().payload, vec![n]);
    }
}

/// WHAT: A broker-side disconnect ends the session's message stream
/// WHY: The module's receive loop treats end of stream as transport loss
#[tokio::test]
async fn given_connected_session_when_broker_disconnects_it_then_stream_ends_and_publish_fails() {
    // Given: A connected module session
    let bus = LocalBus::new();
    let mic1 = bus.connect("mic1");
    mic1.subscribe("rslogger/audio/mic1/command").await.unwrap();

    // When: The broker drops it
    let dropped = bus.disconnect("mic1");

    // Then: The inbox closes and further publishes fail
    assert_eq!(dropped, 1);
    assert!(mic1.next_message().await.is_none());
    let result = mic1.publish("rslogger/audio/mic1/status", Vec::new()).await;
    assert!(matches!(result, Err(RecorderError::Bus { .. })));
}

/// WHAT: Dropping a session detaches it from the broker
/// WHY: Finished tests and stopped modules must not leak routing entries
#[tokio::test]
async fn given_session_when_dropped_then_client_count_decreases() {
    // Given: Two sessions
    let bus = LocalBus::new();
    let kept = bus.connect("kept");
    let dropped = bus.connect("dropped");
    assert_eq!(bus.client_count(), 2);

    // When: One goes out of scope
    drop(dropped);

    // Then: Only one remains
    assert_eq!(bus.client_count(), 1);
    drop(kept);
}
