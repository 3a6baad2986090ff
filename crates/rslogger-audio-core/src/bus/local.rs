use crate::{
    CoreResult, RecorderError,
    bus::{BusMessage, MessageBus, topic_matches},
};

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::{debug, error, trace};

struct Client {
    name: String,
    patterns: Vec<String>,
    tx: mpsc::UnboundedSender<BusMessage>,
}

#[derive(Default)]
struct Broker {
    clients: Mutex<HashMap<u64, Client>>,
    next_id: AtomicU64,
}

impl Broker {
    fn clients(&self) -> MutexGuard<'_, HashMap<u64, Client>> {
        // A poisoned map is still structurally valid; keep routing.
        self.clients.lock().unwrap_or_else(|e| {
            error!("Bus client map lock poisoned, recovering: {}", e);
            e.into_inner()
        })
    }
}

/// In-process broker routing between [`LocalConnection`]s.
///
/// Delivery is best-effort and unordered across publishers, like a real
/// broker at QoS 0; per publisher, messages arrive in publish order.
#[derive(Clone, Default)]
pub struct LocalBus {
    broker: Arc<Broker>,
}

impl LocalBus {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new client session.
    pub fn connect(&self, client_name: &str) -> LocalConnection {
        let id = self.broker.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        self.broker.clients().insert(
            id,
            Client {
                name: client_name.to_string(),
                patterns: Vec::new(),
                tx,
            },
        );

        debug!(client = client_name, "Bus client connected");

        LocalConnection {
            id,
            name: client_name.to_string(),
            broker: Arc::clone(&self.broker),
            inbox: AsyncMutex::new(rx),
        }
    }

    /// Drop every session registered under `client_name`, as a broker does
    /// when a client's transport fails. Their inboxes drain and then close.
    pub fn disconnect(&self, client_name: &str) -> usize {
        let mut clients = self.broker.clients();
        let before = clients.len();
        clients.retain(|_, client| client.name != client_name);
        let dropped = before - clients.len();

        debug!(client = client_name, dropped, "Bus client disconnected");

        dropped
    }

    /// Number of attached sessions.
    pub fn client_count(&self) -> usize {
        self.broker.clients().len()
    }
}

/// One client session on a [`LocalBus`].
pub struct LocalConnection {
    id: u64,
    name: String,
    broker: Arc<Broker>,
    inbox: AsyncMutex<mpsc::UnboundedReceiver<BusMessage>>,
}

impl LocalConnection {
    #[track_caller]
    fn closed(&self) -> RecorderError {
        RecorderError::bus(format!("Connection {} is closed", self.name))
    }
}

#[async_trait]
impl MessageBus for LocalConnection {
    async fn subscribe(&self, pattern: &str) -> CoreResult<()> {
        let mut clients = self.broker.clients();
        let client = clients.get_mut(&self.id).ok_or_else(|| self.closed())?;

        if !client.patterns.iter().any(|p| p == pattern) {
            client.patterns.push(pattern.to_string());
        }

        debug!(client = %self.name, pattern, "Subscribed");

        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> CoreResult<()> {
        let clients = self.broker.clients();

        if !clients.contains_key(&self.id) {
            return Err(self.closed());
        }

        let mut delivered = 0usize;
        for client in clients.values() {
            if client.patterns.iter().any(|p| topic_matches(p, topic)) {
                let message = BusMessage {
                    topic: topic.to_string(),
                    payload: payload.clone(),
                };
                // Receiver gone means that session is being torn down.
                if client.tx.send(message).is_ok() {
                    delivered += 1;
                }
            }
        }

        trace!(client = %self.name, topic, delivered, "Published");

        Ok(())
    }

    async fn next_message(&self) -> Option<BusMessage> {
        self.inbox.lock().await.recv().await
    }
}

impl Drop for LocalConnection {
    fn drop(&mut self) {
        self.broker.clients().remove(&self.id);
    }
}
