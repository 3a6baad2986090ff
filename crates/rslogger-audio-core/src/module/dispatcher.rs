//! Inbound command handling for a [`RecorderModule`].
//!
//! Every well-formed command yields exactly one response, whatever the
//! handler did. Undecodable payloads and unknown command kinds are logged
//! and dropped without stopping the receive loop.

use crate::{
    AudioSettingsPatch, Command, CommandEnvelope, CoreResult, DataEvent, ModuleState,
    RecorderError, generate_recording_id,
    audio::{CaptureJob, CaptureReport, CaptureRun, run_capture},
    bus::BusMessage,
    module::{
        RecorderModule,
        state::{ModuleCore, RecordingSession},
    },
    protocol::CommandResponse,
};

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use serde_json::{Value, json};
use tokio::{
    sync::{MutexGuard, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info, instrument, warn};

/// Result of a handler before it is bound to a request id.
#[derive(Debug)]
struct Outcome {
    success: bool,
    message: String,
    data: Option<Value>,
}

impl Outcome {
    fn accepted(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    fn into_response(self, request_id: Option<String>) -> CommandResponse {
        let response = if self.success {
            CommandResponse::ok(request_id, self.message)
        } else {
            CommandResponse::failed(request_id, self.message)
        };

        match self.data {
            Some(data) => response.with_data(data),
            None => response,
        }
    }
}

/// Recording ids end up in file names.
fn is_valid_recording_id(recording_id: &str) -> bool {
    !recording_id.is_empty()
        && recording_id != "."
        && recording_id != ".."
        && !recording_id.contains(['/', '\\'])
}

impl RecorderModule {
    /// Decode and execute one message from the bus.
    pub(crate) async fn dispatch(self: &Arc<Self>, message: BusMessage) {
        if message.topic != self.topics.command {
            debug!(topic = %message.topic, "Ignoring message on foreign topic");
            return;
        }

        let envelope = match CommandEnvelope::decode(&message.payload) {
            Ok(envelope) => envelope,
            Err(RecorderError::UnknownCommand { command, .. }) => {
                warn!(command = %command, "Unknown command ignored");
                return;
            }
            Err(e) => {
                error!(error = %e, "Dropping malformed command");
                return;
            }
        };

        let response = self.execute(envelope).await;
        self.send_response(&response).await;
    }

    /// Run one decoded command and build its response.
    #[instrument(skip(self, envelope), fields(
        module_id = %self.module_id,
        command = envelope.command.kind(),
        request_id = ?envelope.request_id,
    ))]
    pub(crate) async fn execute(self: &Arc<Self>, envelope: CommandEnvelope) -> CommandResponse {
        let CommandEnvelope {
            request_id,
            command,
        } = envelope;

        debug!("Received command");

        let result = match command {
            Command::Start {
                duration,
                recording_id,
                config,
            } => self.handle_start(duration, recording_id, config).await,
            Command::Stop => self.handle_stop().await,
            Command::Status => self.handle_status().await,
            Command::Config { config, save } => self.handle_config(config, save).await,
            Command::Shutdown => Ok(self.handle_shutdown()),
        };

        match result {
            Ok(outcome) => outcome.into_response(request_id),
            Err(e) => {
                error!(error = %e, "Command failed");
                CommandResponse::failed(request_id, e.to_string())
            }
        }
    }

    /// Record the failure, publish the resulting status, and hand the error
    /// back so the response carries it.
    async fn fail_with(
        &self,
        mut core: MutexGuard<'_, ModuleCore>,
        error: RecorderError,
    ) -> CoreResult<Outcome> {
        core.record_failure(error.to_string());
        let status = core.status();
        drop(core);

        self.send_status(&status).await;

        Err(error)
    }

    async fn handle_start(
        self: &Arc<Self>,
        duration: Option<f64>,
        recording_id: Option<String>,
        patch: Option<AudioSettingsPatch>,
    ) -> CoreResult<Outcome> {
        let mut core = self.core.lock().await;

        if core.state() == ModuleState::Recording {
            return Ok(Outcome::rejected("Already recording"));
        }

        let duration = match duration.map(Duration::try_from_secs_f64) {
            None => None,
            Some(Ok(duration)) if !duration.is_zero() => Some(duration),
            Some(_) => return Ok(Outcome::rejected("Invalid duration")),
        };

        let recording_id = recording_id.unwrap_or_else(generate_recording_id);
        if !is_valid_recording_id(&recording_id) {
            return Ok(Outcome::rejected("Invalid recording_id"));
        }

        if let Some(patch) = &patch
            && let Err(e) = core.apply_settings(patch)
        {
            return self.fail_with(core, e).await;
        }

        let settings = core.settings().clone();
        let filename = format!("recording_{}_{}.wav", recording_id, self.module_id);
        let path = settings.recording_dir.join(&filename);
        if path.exists() {
            return Ok(Outcome::rejected(format!(
                "Recording file already exists: {}",
                filename
            )));
        }
        let stop = self.lifecycle.capture_token();

        let job = CaptureJob {
            settings,
            path: path.clone(),
            duration,
            stop: stop.clone(),
        };
        let (opened_tx, opened_rx) = oneshot::channel();
        let task = self.spawn_capture(recording_id.clone(), job, opened_tx);

        // The lock stays held so the capture cannot complete before the
        // session is registered.
        match opened_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return self.fail_with(core, e).await,
            Err(_) => {
                return self
                    .fail_with(
                        core,
                        RecorderError::capture("Capture task ended before the stream opened"),
                    )
                    .await;
            }
        }

        core.begin(RecordingSession {
            recording_id: recording_id.clone(),
            filename: filename.clone(),
            path,
            started_at: Utc::now(),
            duration,
            stop,
            task: Some(task),
        });
        let status = core.status();
        drop(core);

        self.send_status(&status).await;
        info!(recording_id = %recording_id, filename = %filename, "Recording started");

        Ok(Outcome::accepted("Recording started").with_data(json!({
            "recording_id": recording_id,
            "filename": filename,
        })))
    }

    fn spawn_capture(
        self: &Arc<Self>,
        recording_id: String,
        job: CaptureJob,
        opened: oneshot::Sender<CoreResult<()>>,
    ) -> JoinHandle<()> {
        let module = Arc::clone(self);
        let capture = Arc::clone(&self.capture);
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            let run = tokio::task::spawn_blocking(move || {
                run_capture(capture.as_ref(), store.as_ref(), job, opened)
            })
            .await;

            match run {
                Ok(CaptureRun::NotStarted) => {}
                Ok(CaptureRun::Finished(result)) => {
                    module.finish_recording(&recording_id, result).await;
                }
                Err(e) => {
                    let error = RecorderError::capture(format!("Capture task failed: {}", e));
                    module.finish_recording(&recording_id, Err(error)).await;
                }
            }
        })
    }

    /// `Recording → Idle` (or `Error`) once the capture has been handed to
    /// the store.
    async fn finish_recording(&self, recording_id: &str, result: CoreResult<CaptureReport>) {
        let mut core = self.core.lock().await;

        let Some(session) = core.end_session(recording_id) else {
            debug!(recording_id, "Capture finished for a session that is no longer current");
            return;
        };

        let elapsed_ms = (Utc::now() - session.started_at).num_milliseconds();

        match result {
            Ok(report) => {
                let status = core.status();
                drop(core);

                info!(
                    recording_id,
                    path = ?session.path,
                    elapsed_ms,
                    requested = ?session.duration,
                    sample_count = report.sample_count,
                    "Recording complete"
                );

                let event = DataEvent::RecordingComplete {
                    recording_id: session.recording_id,
                    filename: session.filename,
                    timestamp: Utc::now(),
                    duration_seconds: Some(report.duration_seconds),
                };
                self.send_event(&event).await;
                self.send_status(&status).await;
            }
            Err(e) => {
                error!(recording_id, elapsed_ms, error = %e, "Recording failed");
                core.record_failure(e.to_string());
                let status = core.status();
                drop(core);

                self.send_status(&status).await;
            }
        }
    }

    async fn handle_stop(&self) -> CoreResult<Outcome> {
        let (recording_id, stop, task) = {
            let mut core = self.core.lock().await;
            match core.session_mut() {
                Some(session) => (
                    session.recording_id.clone(),
                    session.stop.clone(),
                    session.task.take(),
                ),
                None => return Ok(Outcome::rejected("Not recording")),
            }
        };

        stop.cancel();
        info!(recording_id = %recording_id, "Stop requested");

        let Some(mut task) = task else {
            // An earlier stop is already waiting on this capture.
            return Ok(Outcome::accepted("Recording stopping"));
        };

        if tokio::time::timeout(self.options.stop_flush_wait, &mut task)
            .await
            .is_err()
        {
            let mut core = self.core.lock().await;
            if let Some(session) = core.session_mut()
                && session.recording_id == recording_id
            {
                session.task = Some(task);
            }
            return Ok(Outcome::accepted("Recording stopping"));
        }

        let core = self.core.lock().await;
        match (core.state(), core.last_error()) {
            (ModuleState::Error, Some(error)) => {
                Ok(Outcome::rejected(format!("Recording failed: {}", error)))
            }
            _ => Ok(Outcome::accepted("Recording stopped")
                .with_data(json!({ "recording_id": recording_id }))),
        }
    }

    async fn handle_status(&self) -> CoreResult<Outcome> {
        let status = self.core.lock().await.status();
        self.send_status(&status).await;

        Ok(Outcome::accepted("Status published").with_data(json!({ "status": status })))
    }

    async fn handle_config(
        &self,
        patch: Option<AudioSettingsPatch>,
        save: bool,
    ) -> CoreResult<Outcome> {
        let mut core = self.core.lock().await;

        if let Some(patch) = patch.as_ref().filter(|p| !p.is_empty())
            && let Err(e) = core.apply_settings(patch)
        {
            return self.fail_with(core, e).await;
        }

        if save {
            let saved = match &self.settings_store {
                Some(store) => {
                    let store = Arc::clone(store);
                    let settings = core.settings().clone();
                    tokio::task::spawn_blocking(move || store.save(&settings))
                        .await
                        .unwrap_or_else(|e| {
                            Err(RecorderError::persistence(format!(
                                "Settings save task failed: {}",
                                e
                            )))
                        })
                }
                None => Err(RecorderError::persistence(
                    "No settings store configured for this module",
                )),
            };

            if let Err(e) = saved {
                return self.fail_with(core, e).await;
            }
        }

        if core.recover() {
            info!("Recovered from error state");
        }
        let status = core.status();
        drop(core);

        self.send_status(&status).await;

        let message = if save {
            "Configuration updated and saved"
        } else {
            "Configuration updated"
        };

        Ok(Outcome::accepted(message).with_data(json!({ "config": status.config })))
    }

    fn handle_shutdown(&self) -> Outcome {
        info!("Received shutdown command");
        self.lifecycle.begin_shutdown();
        Outcome::accepted("Shutting down")
    }
}
