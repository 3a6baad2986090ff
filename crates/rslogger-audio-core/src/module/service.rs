use crate::{
    AudioSettings, CoreResult, DataEvent, ModuleId, ModuleState, ModuleTopics, StatusMessage,
    TopicScheme,
    audio::{CaptureSource, CpalCaptureSource, RecordingStore, SettingsStore, WavStore},
    bus::MessageBus,
    module::{
        DEFAULT_HEARTBEAT_INTERVAL, Heartbeat, ModuleLifecycle, StatusBeacon, state::ModuleCore,
    },
    protocol::CommandResponse,
};

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// How long `stop` waits for the capture to flush before answering.
pub const DEFAULT_STOP_FLUSH_WAIT: Duration = Duration::from_secs(3);

/// How long shutdown waits for a running capture to flush.
pub const SHUTDOWN_FLUSH_WAIT: Duration = Duration::from_secs(30);

/// Tunables for a [`RecorderModule`].
#[derive(Debug, Clone)]
pub struct ModuleOptions {
    /// Heartbeat period; `None` disables the heartbeat.
    pub heartbeat_interval: Option<Duration>,
    /// Bound on how long `stop` waits for the capture to drain.
    pub stop_flush_wait: Duration,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Some(DEFAULT_HEARTBEAT_INTERVAL),
            stop_flush_wait: DEFAULT_STOP_FLUSH_WAIT,
        }
    }
}

/// One recording agent attached to the bus.
///
/// Owns the module's state machine and the background loops serving it.
/// Build it, wrap it in an `Arc`, and drive it with [`RecorderModule::run`].
pub struct RecorderModule {
    pub(crate) module_id: ModuleId,
    pub(crate) topics: ModuleTopics,
    pub(crate) bus: Arc<dyn MessageBus>,
    pub(crate) capture: Arc<dyn CaptureSource>,
    pub(crate) store: Arc<dyn RecordingStore>,
    pub(crate) settings_store: Option<Arc<dyn SettingsStore>>,
    pub(crate) options: ModuleOptions,
    pub(crate) core: Mutex<ModuleCore>,
    pub(crate) lifecycle: ModuleLifecycle,
}

impl RecorderModule {
    /// Module recording from the default cpal device into WAV files.
    pub fn new(
        module_id: ModuleId,
        scheme: &TopicScheme,
        bus: Arc<dyn MessageBus>,
        settings: AudioSettings,
    ) -> Self {
        Self {
            topics: scheme.module(&module_id),
            core: Mutex::new(ModuleCore::new(module_id.clone(), settings)),
            module_id,
            bus,
            capture: Arc::new(CpalCaptureSource),
            store: Arc::new(WavStore),
            settings_store: None,
            options: ModuleOptions::default(),
            lifecycle: ModuleLifecycle::new(),
        }
    }

    /// Replace the capture source.
    pub fn with_capture(mut self, capture: Arc<dyn CaptureSource>) -> Self {
        self.capture = capture;
        self
    }

    /// Replace the recording store.
    pub fn with_store(mut self, store: Arc<dyn RecordingStore>) -> Self {
        self.store = store;
        self
    }

    /// Enable `config` commands with `save: true`.
    pub fn with_settings_store(mut self, settings_store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(settings_store);
        self
    }

    /// Replace the tunables.
    pub fn with_options(mut self, options: ModuleOptions) -> Self {
        self.options = options;
        self
    }

    /// This module's identifier.
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ModuleState {
        self.core.lock().await.state()
    }

    /// Settings currently in effect.
    pub async fn settings(&self) -> AudioSettings {
        self.core.lock().await.settings().clone()
    }

    /// Status as it would be published now.
    pub async fn status(&self) -> StatusMessage {
        self.core.lock().await.status()
    }

    /// Most recent failure reported by this module.
    pub async fn last_error(&self) -> Option<String> {
        self.core.lock().await.last_error().map(str::to_string)
    }

    /// Attach to the bus and serve commands until shutdown or disconnect.
    ///
    /// Returns an error only if the command topic cannot be subscribed;
    /// everything after attachment is recovered locally.
    #[instrument(skip(self), fields(module_id = %self.module_id))]
    pub async fn run(self: Arc<Self>) -> CoreResult<()> {
        self.bus.subscribe(&self.topics.command).await?;

        let attached = self.core.lock().await.attach();
        if attached {
            info!("Module connected");
            self.send_current_status().await;
        }

        let heartbeat = self.options.heartbeat_interval.map(|interval| {
            let module = Arc::clone(&self);
            let cancel = self.lifecycle.heartbeat_token();
            tokio::spawn(async move { Heartbeat::new(interval).run(module.as_ref(), cancel).await })
        });

        self.receive_loop().await;

        // Covers the disconnect path; a no-op after a shutdown command.
        self.lifecycle.begin_shutdown();
        self.drain_capture().await;

        let status = {
            let mut core = self.core.lock().await;
            core.detach();
            core.status()
        };
        self.send_status(&status).await;

        if let Some(handle) = heartbeat {
            match handle.await {
                Ok(beats) => debug!(beats, "Heartbeat task finished"),
                Err(e) => warn!(error = ?e, "Heartbeat task panicked"),
            }
        }

        info!("Module disconnected");

        Ok(())
    }

    /// Begin shutdown from outside the message loop (signal handler).
    ///
    /// Idempotent; [`RecorderModule::run`] completes the teardown.
    pub fn shutdown(&self) -> bool {
        self.lifecycle.begin_shutdown()
    }

    async fn receive_loop(self: &Arc<Self>) {
        let cancel = self.lifecycle.receive_token();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Receive loop cancelled");
                    break;
                }

                message = self.bus.next_message() => {
                    match message {
                        Some(message) => self.dispatch(message).await,
                        None => {
                            warn!("Bus connection closed");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Wait for a running capture to flush after its token was cancelled.
    async fn drain_capture(&self) {
        let task = {
            let mut core = self.core.lock().await;
            core.session_mut().and_then(|session| {
                session.stop.cancel();
                session.task.take()
            })
        };

        let Some(task) = task else {
            return;
        };

        info!("Waiting for capture to flush");
        match tokio::time::timeout(SHUTDOWN_FLUSH_WAIT, task).await {
            Ok(Ok(())) => debug!("Capture flushed"),
            Ok(Err(e)) => error!(error = ?e, "Capture task panicked"),
            Err(_) => warn!("Capture did not flush within shutdown deadline"),
        }
    }

    pub(crate) async fn send_current_status(&self) {
        let status = self.core.lock().await.status();
        self.send_status(&status).await;
    }

    pub(crate) async fn send_status(&self, status: &StatusMessage) {
        if let Err(e) = self.publish_status_message(status).await {
            warn!(error = %e, state = %status.state, "Failed to publish status");
        }
    }

    async fn publish_status_message(&self, status: &StatusMessage) -> CoreResult<()> {
        self.bus
            .publish(&self.topics.status, status.encode()?)
            .await
    }

    pub(crate) async fn send_response(&self, response: &CommandResponse) {
        let published = match response.encode() {
            Ok(payload) => self.bus.publish(&self.topics.response, payload).await,
            Err(e) => Err(e),
        };

        if let Err(e) = published {
            error!(error = %e, request_id = ?response.request_id, "Failed to publish response");
        }
    }

    pub(crate) async fn send_event(&self, event: &DataEvent) {
        let published = match event.encode() {
            Ok(payload) => self.bus.publish(&self.topics.data, payload).await,
            Err(e) => Err(e),
        };

        if let Err(e) = published {
            error!(error = %e, "Failed to publish data event");
        }
    }
}

#[async_trait]
impl StatusBeacon for RecorderModule {
    async fn publish_status(&self) -> CoreResult<()> {
        let status = self.core.lock().await.status();
        self.publish_status_message(&status).await
    }
}
