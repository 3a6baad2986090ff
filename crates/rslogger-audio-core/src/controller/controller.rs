use crate::{
    AudioSettingsPatch, Command, CoreResult, DataEvent, MessageKind, ModuleId, ModuleState,
    StatusMessage, TopicScheme,
    bus::{BusMessage, MessageBus},
    controller::{
        Correlator, DEFAULT_OFFLINE_AFTER, DEFAULT_REQUEST_TIMEOUT, ModuleRecord, ModuleRegistry,
        ModuleSummary,
    },
    protocol::CommandResponse,
};

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tokio::{
    sync::{RwLock, broadcast},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Tunables for a [`Controller`].
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Topic layout shared with the modules.
    pub scheme: TopicScheme,
    /// How long each command waits for its response.
    pub request_timeout: Duration,
    /// Freshness window for the registry.
    pub offline_after: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            scheme: TopicScheme::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            offline_after: DEFAULT_OFFLINE_AFTER,
        }
    }
}

/// Fleet-level notifications for UIs and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// First status seen from a module.
    ModuleDiscovered {
        /// The new module.
        module_id: ModuleId,
    },
    /// A module finished a recording.
    RecordingComplete {
        /// Reporting module.
        module_id: ModuleId,
        /// Session identifier.
        recording_id: String,
        /// Written file name.
        filename: String,
        /// Persisted length, if reported.
        duration_seconds: Option<f64>,
    },
}

/// Observes the fleet and issues commands to it.
///
/// Holds the module registry, the request correlator, and the task that
/// routes status, response and data messages between them.
pub struct Controller {
    scheme: TopicScheme,
    correlator: Correlator,
    registry: RwLock<ModuleRegistry>,
    events: broadcast::Sender<ControllerEvent>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    /// Subscribe to the fleet wildcards and start routing messages.
    #[instrument(skip(bus, options), fields(base = options.scheme.base()))]
    pub async fn connect(
        bus: Arc<dyn MessageBus>,
        options: ControllerOptions,
    ) -> CoreResult<Arc<Self>> {
        for kind in [MessageKind::Status, MessageKind::Response, MessageKind::Data] {
            bus.subscribe(&options.scheme.wildcard(kind)).await?;
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let controller = Arc::new(Self {
            correlator: Correlator::new(
                Arc::clone(&bus),
                options.scheme.clone(),
                options.request_timeout,
            ),
            scheme: options.scheme,
            registry: RwLock::new(ModuleRegistry::new(options.offline_after)),
            events,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        });

        let router = Arc::clone(&controller);
        let handle = tokio::spawn(async move { router.route_messages(bus).await });
        controller.set_task(Some(handle));

        info!("Controller connected");

        Ok(controller)
    }

    fn set_task(&self, handle: Option<JoinHandle<()>>) -> Option<JoinHandle<()>> {
        let mut task = self.task.lock().unwrap_or_else(|e| {
            error!("Controller task lock poisoned, recovering: {}", e);
            e.into_inner()
        });
        std::mem::replace(&mut *task, handle)
    }

    async fn route_messages(&self, bus: Arc<dyn MessageBus>) {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Controller message loop cancelled");
                    break;
                }

                message = bus.next_message() => {
                    match message {
                        Some(message) => self.route(message).await,
                        None => {
                            warn!("Controller bus connection closed");
                            break;
                        }
                    }
                }
            }
        }

        self.correlator.shutdown();
    }

    async fn route(&self, message: BusMessage) {
        let Some((module_id, kind)) = self.scheme.parse(&message.topic) else {
            debug!(topic = %message.topic, "Ignoring message outside the topic scheme");
            return;
        };

        match kind {
            MessageKind::Status => match StatusMessage::decode(&message.payload) {
                Ok(status) => {
                    let discovered = self.registry.write().await.apply_status(
                        &module_id,
                        &status,
                        Instant::now(),
                    );
                    if discovered {
                        self.emit(ControllerEvent::ModuleDiscovered { module_id });
                    }
                }
                Err(e) => error!(module_id = %module_id, error = %e, "Dropping malformed status"),
            },
            MessageKind::Response => match CommandResponse::decode(&message.payload) {
                Ok(response) => {
                    self.correlator.resolve(&module_id, response);
                }
                Err(e) => error!(module_id = %module_id, error = %e, "Dropping malformed response"),
            },
            MessageKind::Data => match DataEvent::decode(&message.payload) {
                Ok(DataEvent::RecordingComplete {
                    recording_id,
                    filename,
                    duration_seconds,
                    ..
                }) => {
                    info!(
                        module_id = %module_id,
                        recording_id = %recording_id,
                        filename = %filename,
                        duration_seconds = ?duration_seconds,
                        "Recording complete"
                    );
                    self.emit(ControllerEvent::RecordingComplete {
                        module_id,
                        recording_id,
                        filename,
                        duration_seconds,
                    });
                }
                Err(e) => {
                    error!(module_id = %module_id, error = %e, "Dropping malformed data event")
                }
            },
            MessageKind::Command => {
                debug!(module_id = %module_id, "Ignoring command seen by controller");
            }
        }
    }

    fn emit(&self, event: ControllerEvent) {
        // No subscribers is normal.
        let _ = self.events.send(event);
    }

    /// Receive fleet notifications from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Topic layout in use.
    pub fn scheme(&self) -> &TopicScheme {
        &self.scheme
    }

    /// Send any command and wait for the module's answer.
    pub async fn send_command(
        &self,
        module_id: &ModuleId,
        command: Command,
    ) -> CoreResult<CommandResponse> {
        self.correlator.send_command(module_id, command).await
    }

    /// Start one module, optionally for a fixed duration and group id.
    pub async fn start_recording(
        &self,
        module_id: &ModuleId,
        duration: Option<f64>,
        recording_id: Option<String>,
    ) -> CoreResult<CommandResponse> {
        self.send_command(
            module_id,
            Command::Start {
                duration,
                recording_id,
                config: None,
            },
        )
        .await
    }

    /// Stop one module.
    pub async fn stop_recording(&self, module_id: &ModuleId) -> CoreResult<CommandResponse> {
        self.send_command(module_id, Command::Stop).await
    }

    /// Ask one module to publish its status now.
    pub async fn request_status(&self, module_id: &ModuleId) -> CoreResult<CommandResponse> {
        self.send_command(module_id, Command::Status).await
    }

    /// Merge settings on one module, optionally persisting them there.
    pub async fn update_config(
        &self,
        module_id: &ModuleId,
        patch: AudioSettingsPatch,
        save: bool,
    ) -> CoreResult<CommandResponse> {
        self.send_command(
            module_id,
            Command::Config {
                config: Some(patch),
                save,
            },
        )
        .await
    }

    /// Tell one module to shut down.
    pub async fn shutdown_module(&self, module_id: &ModuleId) -> CoreResult<CommandResponse> {
        self.send_command(module_id, Command::Shutdown).await
    }

    /// Summaries of every known module.
    pub async fn modules(&self) -> Vec<ModuleSummary> {
        self.registry.read().await.summaries(Instant::now())
    }

    /// Full record for one module.
    pub async fn module(&self, module_id: &ModuleId) -> Option<ModuleRecord> {
        self.registry.read().await.get(module_id).cloned()
    }

    /// Number of modules heard from recently.
    pub async fn online_count(&self) -> usize {
        self.registry.read().await.online_count(Instant::now())
    }

    pub(crate) async fn online_in_state(&self, state: ModuleState) -> Vec<ModuleId> {
        self.registry.read().await.in_state(state, Instant::now())
    }

    /// Commands still awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Stop routing messages and fail any outstanding commands.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        if let Some(handle) = self.set_task(None)
            && let Err(e) = handle.await
        {
            error!(error = ?e, "Controller message task panicked");
        }

        self.correlator.shutdown();

        info!("Controller stopped");
    }
}
