//! Publish/subscribe transport seam.
//!
//! The protocol only needs four things from a transport: subscribe to a
//! topic pattern, publish bytes to a topic, and iterate incoming messages
//! until the connection goes away. [`LocalBus`] implements that in-process
//! with MQTT wildcard semantics; [`MqttConnection`] speaks to a real broker.

mod local;
mod mqtt;

pub use local::{LocalBus, LocalConnection};
pub use mqtt::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_KEEP_ALIVE, DEFAULT_MQTT_PORT, DEFAULT_RECONNECT_INTERVAL,
    MqttBusOptions, MqttConnection,
};

use crate::CoreResult;

use async_trait::async_trait;

/// One message as delivered by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Concrete topic the message was published on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// A connected bus session.
///
/// Implementations must be safe to share between the task that reads
/// messages and the tasks that publish.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Receive messages published on topics matching `pattern`.
    async fn subscribe(&self, pattern: &str) -> CoreResult<()>;

    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> CoreResult<()>;

    /// Next message for any subscribed pattern; `None` once disconnected.
    async fn next_message(&self) -> Option<BusMessage>;
}

/// MQTT topic filter matching: `+` matches one level, a trailing `#`
/// matches any remaining levels including none.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return pattern_levels.next().is_none(),
            (Some("+"), Some(_)) => continue,
            (Some(expected), Some(actual)) if expected == actual => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
