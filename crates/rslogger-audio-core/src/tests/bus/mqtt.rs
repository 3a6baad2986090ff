#![allow(clippy::unwrap_used, clippy::panic)]

use crate::{
    AudioSettings, DEFAULT_MQTT_PORT, MessageBus, MessageKind, ModuleId, ModuleState,
    MqttBusOptions, MqttConnection, RecorderError, StatusMessage, TopicScheme,
};

use std::time::Duration;

use rumqttc::QoS;

/// WHAT: Bus options carry broker, client id, keep-alive and credentials into rumqttc
/// WHY: `--broker`/`--port` and the `[bus]` table must reach the actual client
#[test]
fn given_bus_options_when_mapping_then_client_options_match() {
    // Given: Options for mic1 with credentials
    let mut options = MqttBusOptions::new("broker.local", 1884, "rslogger-audio-mic1")
        .with_credentials("rec".to_string(), Some("secret".to_string()));
    options.keep_alive = Duration::from_secs(30);

    // When: Mapping to client options
    let mapped = options.to_mqtt_options();

    // Then: Every field is carried over
    assert_eq!(mapped.broker_address(), ("broker.local".to_string(), 1884));
    assert_eq!(mapped.client_id(), "rslogger-audio-mic1");
    assert_eq!(mapped.keep_alive(), Duration::from_secs(30));
    assert_eq!(mapped.credentials(), Some(("rec".to_string(), "secret".to_string())));
    assert!(mapped.last_will().is_none());
}

/// WHAT: A module's last will is its disconnected status on its status topic
/// WHY: The controller must learn about a module whose process died
#[test]
fn given_disconnected_status_as_last_will_when_mapping_then_will_on_status_topic() {
    // Given: mic1's disconnected status
    let module_id = ModuleId::new("mic1").unwrap();
    let topic = TopicScheme::default().topic(&module_id, MessageKind::Status);
    let payload = StatusMessage::disconnected(&module_id, AudioSettings::default())
        .encode()
        .unwrap();
    let options = MqttBusOptions::new("localhost", DEFAULT_MQTT_PORT, "rslogger-audio-mic1")
        .with_last_will(topic.clone(), payload.clone());

    // When: Mapping to client options
    let will = options.to_mqtt_options().last_will().unwrap();

    // Then: The will decodes back to a disconnected status, published at QoS 0
    assert_eq!(will.topic, topic);
    assert_eq!(will.qos, QoS::AtMostOnce);
    assert!(!will.retain);
    let status = StatusMessage::decode(&will.message).unwrap();
    assert_eq!(status.state, ModuleState::Disconnected);
    assert_eq!(status.module_id, "mic1");
}

/// WHAT: An empty client id is rejected before any network activity
/// WHY: The MQTT client cannot open a session without an id
#[tokio::test]
async fn given_empty_client_id_when_connecting_then_bus_error() {
    // Given: Options without a client id
    let options = MqttBusOptions::new("localhost", DEFAULT_MQTT_PORT, "");

    // When: Connecting
    let result = MqttConnection::connect(options).await;

    // Then: Rejected as a bus error
    assert!(matches!(result, Err(RecorderError::Bus { .. })));
}

/// WHAT: An unreachable broker fails the connect instead of hanging
/// WHY: `module` and `controller` must exit with an error when no broker listens
#[tokio::test]
async fn given_nothing_listening_when_connecting_then_bus_error() {
    // Given: A port nothing listens on, with a short connect bound
    let mut options = MqttBusOptions::new("127.0.0.1", 1, "rslogger-audio-test");
    options.connect_timeout = Duration::from_secs(2);

    // When: Connecting
    let result = MqttConnection::connect(options).await;

    // Then: A bus error naming the broker
    match result {
        Err(RecorderError::Bus { reason, .. }) => assert!(reason.contains("127.0.0.1:1")),
        Err(other) => panic!("expected bus error, got {other}"),
        Ok(_) => panic!("expected bus error, got a connection"),
    }
}

/// WHAT: A publish on a subscribed pattern comes back through a live broker
/// WHY: Commands and statuses travel over the broker between processes
#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn given_local_broker_when_publishing_on_subscribed_topic_then_received() {
    // Given: Two sessions on a broker at localhost:1883
    let listener = MqttConnection::connect(MqttBusOptions::new(
        "localhost",
        DEFAULT_MQTT_PORT,
        format!("rslogger-audio-listener-{}", std::process::id()),
    ))
    .await
    .unwrap();
    let sender = MqttConnection::connect(MqttBusOptions::new(
        "localhost",
        DEFAULT_MQTT_PORT,
        format!("rslogger-audio-sender-{}", std::process::id()),
    ))
    .await
    .unwrap();
    let topic = format!("rslogger-test/{}/mic1/status", std::process::id());
    listener
        .subscribe(&format!("rslogger-test/{}/+/status", std::process::id()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // When: Publishing
    sender.publish(&topic, b"{}".to_vec()).await.unwrap();

    // Then: The listener receives it
    let message = tokio::time::timeout(Duration::from_secs(5), listener.next_message())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.topic, topic);
    assert_eq!(message.payload, b"{}".to_vec());

    // And: After disconnecting the inbox closes
    listener.disconnect().await;
    sender.disconnect().await;
    let after = tokio::time::timeout(Duration::from_secs(5), listener.next_message())
        .await
        .unwrap();
    assert!(after.is_none());
}
