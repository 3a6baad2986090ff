use crate::{
    CoreResult, RecorderError,
    bus::{BusMessage, MessageBus},
};

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use tokio::{
    sync::{Mutex as AsyncMutex, mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

/// Broker port used when none is configured.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Keep-alive interval used when none is configured.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Pause between reconnect attempts after the broker drops us.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// How long [`MqttConnection::connect`] waits for the broker's CONNACK.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const REQUEST_CHANNEL_CAPACITY: usize = 64;
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Everything needed to open an MQTT session.
#[derive(Debug, Clone, PartialEq)]
pub struct MqttBusOptions {
    /// Broker host name or address.
    pub host: String,
    /// Broker TCP port.
    pub port: u16,
    /// Client id; must be unique per broker.
    pub client_id: String,
    /// MQTT keep-alive.
    pub keep_alive: Duration,
    /// Pause between reconnect attempts.
    pub reconnect_interval: Duration,
    /// Bound on the initial connect.
    pub connect_timeout: Duration,
    /// Optional credentials; a password without a username is ignored.
    pub username: Option<String>,
    /// Password for `username`.
    pub password: Option<String>,
    /// Topic and payload the broker publishes if this session dies uncleanly.
    pub last_will: Option<(String, Vec<u8>)>,
}

impl MqttBusOptions {
    /// Options for `client_id` on `host:port` with default timings.
    pub fn new(host: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            username: None,
            password: None,
            last_will: None,
        }
    }

    /// Set the last-will message.
    pub fn with_last_will(mut self, topic: impl Into<String>, payload: Vec<u8>) -> Self {
        self.last_will = Some((topic.into(), payload));
        self
    }

    /// Set broker credentials.
    pub fn with_credentials(mut self, username: String, password: Option<String>) -> Self {
        self.username = Some(username);
        self.password = password;
        self
    }

    /// Reject settings the MQTT client cannot open a session with.
    #[track_caller]
    pub fn validate(&self) -> CoreResult<()> {
        if self.client_id.is_empty() || self.client_id.starts_with(' ') {
            return Err(RecorderError::bus(format!("Invalid MQTT client id '{}'", self.client_id)));
        }

        if self.host.trim().is_empty() {
            return Err(RecorderError::bus("MQTT broker host is empty"));
        }

        if self.keep_alive < Duration::from_secs(1) {
            return Err(RecorderError::bus("MQTT keep-alive must be at least one second"));
        }

        Ok(())
    }

    pub(crate) fn to_mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);

        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.as_deref().unwrap_or_default());
        }

        if let Some((topic, payload)) = &self.last_will {
            options.set_last_will(LastWill::new(
                topic,
                payload.clone(),
                QoS::AtMostOnce,
                false,
            ));
        }

        options
    }
}

/// A session with an external MQTT broker.
///
/// A background task drives the rumqttc event loop, forwards incoming
/// publishes to [`MessageBus::next_message`], and reconnects with the
/// configured pause, restoring subscriptions, until
/// [`MqttConnection::disconnect`] is called.
///
/// Everything is published at QoS 0 so a request is delivered at most once.
pub struct MqttConnection {
    client: AsyncClient,
    client_id: String,
    inbox: AsyncMutex<mpsc::UnboundedReceiver<BusMessage>>,
    patterns: Arc<Mutex<Vec<String>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttConnection {
    /// Connect and wait for the broker to accept the session.
    #[instrument(skip(options), fields(
        client_id = %options.client_id,
        broker = %format!("{}:{}", options.host, options.port)
    ))]
    pub async fn connect(options: MqttBusOptions) -> CoreResult<Self> {
        options.validate()?;

        let (client, event_loop) =
            AsyncClient::new(options.to_mqtt_options(), REQUEST_CHANNEL_CAPACITY);
        let (tx, rx) = mpsc::unbounded_channel();
        let (connected_tx, connected_rx) = oneshot::channel();
        let patterns = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();

        let driver = EventDriver {
            client: client.clone(),
            client_id: options.client_id.clone(),
            patterns: Arc::clone(&patterns),
            inbox: tx,
            reconnect_interval: options.reconnect_interval,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(driver.run(event_loop, connected_tx));

        let outcome = match tokio::time::timeout(options.connect_timeout, connected_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(reason),
            Ok(Err(_)) => Err("event loop stopped before connecting".to_string()),
            Err(_) => Err(format!("no answer from broker within {:?}", options.connect_timeout)),
        };

        if let Err(reason) = outcome {
            cancel.cancel();
            task.abort();
            return Err(RecorderError::bus(format!(
                "Cannot connect to MQTT broker {}:{}: {}",
                options.host, options.port, reason
            )));
        }

        info!("Connected to MQTT broker");

        Ok(Self {
            client,
            client_id: options.client_id,
            inbox: AsyncMutex::new(rx),
            patterns,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Close the session cleanly; the broker does not publish the last will.
    ///
    /// Afterwards [`MessageBus::next_message`] drains and returns `None`.
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(client_id = %self.client_id, error = %e, "Disconnect request not sent");
        }

        let task = {
            let mut task = self.task.lock().unwrap_or_else(|e| {
                error!("MQTT task lock poisoned, recovering: {}", e);
                e.into_inner()
            });
            task.take()
        };

        if let Some(mut task) = task {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut task).await.is_err() {
                self.cancel.cancel();
                if let Err(e) = task.await {
                    warn!(client_id = %self.client_id, error = ?e, "MQTT event loop panicked");
                }
            }
        }

        self.cancel.cancel();
        info!(client_id = %self.client_id, "Disconnected from MQTT broker");
    }

    /// Client id this session was opened with.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[async_trait]
impl MessageBus for MqttConnection {
    async fn subscribe(&self, pattern: &str) -> CoreResult<()> {
        self.client
            .subscribe(pattern, QoS::AtMostOnce)
            .await
            .map_err(|e| RecorderError::bus(format!("Subscribe to {pattern} failed: {e}")))?;

        let mut patterns = lock_patterns(&self.patterns);
        if !patterns.iter().any(|p| p == pattern) {
            patterns.push(pattern.to_string());
        }

        debug!(client_id = %self.client_id, pattern, "Subscribed");

        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> CoreResult<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| RecorderError::bus(format!("Publish to {topic} failed: {e}")))?;

        trace!(client_id = %self.client_id, topic, "Published");

        Ok(())
    }

    async fn next_message(&self) -> Option<BusMessage> {
        self.inbox.lock().await.recv().await
    }
}

impl Drop for MqttConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn lock_patterns(patterns: &Mutex<Vec<String>>) -> MutexGuard<'_, Vec<String>> {
    patterns.lock().unwrap_or_else(|e| {
        error!("MQTT subscription list lock poisoned, recovering: {}", e);
        e.into_inner()
    })
}

struct EventDriver {
    client: AsyncClient,
    client_id: String,
    patterns: Arc<Mutex<Vec<String>>>,
    inbox: mpsc::UnboundedSender<BusMessage>,
    reconnect_interval: Duration,
    cancel: CancellationToken,
}

impl EventDriver {
    async fn run(self, mut event_loop: EventLoop, connected: oneshot::Sender<Result<(), String>>) {
        let mut connected = Some(connected);

        loop {
            let event = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,
                event = event_loop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    debug!(client_id = %self.client_id, code = ?ack.code, "CONNACK");
                    match connected.take() {
                        Some(waiter) => {
                            // Caller gave up waiting; nobody will read this session.
                            if waiter.send(Ok(())).is_err() {
                                break;
                            }
                        }
                        None => self.restore_subscriptions(),
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = BusMessage {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    };
                    if self.inbox.send(message).is_err() {
                        debug!(client_id = %self.client_id, "Inbox dropped, stopping");
                        break;
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!(client_id = %self.client_id, "Disconnect sent");
                    break;
                }
                Ok(event) => trace!(client_id = %self.client_id, ?event, "MQTT event"),
                Err(e) => {
                    if let Some(waiter) = connected.take() {
                        // The caller reports the failure; no retry before first contact.
                        let _ = waiter.send(Err(e.to_string()));
                        break;
                    }

                    warn!(
                        client_id = %self.client_id,
                        error = %e,
                        retry_in = ?self.reconnect_interval,
                        "MQTT connection lost"
                    );

                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_interval) => {}
                    }
                }
            }
        }

        debug!(client_id = %self.client_id, "MQTT event loop finished");
    }

    fn restore_subscriptions(&self) {
        let patterns = lock_patterns(&self.patterns).clone();

        for pattern in patterns {
            match self.client.try_subscribe(pattern.as_str(), QoS::AtMostOnce) {
                Ok(()) => debug!(client_id = %self.client_id, %pattern, "Resubscribed"),
                Err(e) => {
                    warn!(client_id = %self.client_id, %pattern, error = %e, "Resubscribe failed")
                }
            }
        }
    }
}

