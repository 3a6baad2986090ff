use crate::{AudioSettings, AudioSettingsPatch, CoreResult, ModuleId, ModuleState, StatusMessage};

use std::{path::PathBuf, time::Duration};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The module's own record of a recording in progress.
#[derive(Debug)]
pub(crate) struct RecordingSession {
    pub(crate) recording_id: String,
    pub(crate) filename: String,
    pub(crate) path: PathBuf,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) duration: Option<Duration>,
    pub(crate) stop: CancellationToken,
    /// Taken by whoever waits for the capture to drain.
    pub(crate) task: Option<JoinHandle<()>>,
}

/// Recording lifecycle of one module.
///
/// Holds the invariant that a session exists iff the state is `Recording`,
/// so `recording_id` in every status is consistent with `state`.
#[derive(Debug)]
pub(crate) struct ModuleCore {
    module_id: ModuleId,
    state: ModuleState,
    settings: AudioSettings,
    session: Option<RecordingSession>,
    last_error: Option<String>,
}

impl ModuleCore {
    pub(crate) fn new(module_id: ModuleId, settings: AudioSettings) -> Self {
        Self {
            module_id,
            state: ModuleState::Disconnected,
            settings,
            session: None,
            last_error: None,
        }
    }

    pub(crate) fn state(&self) -> ModuleState {
        self.state
    }

    pub(crate) fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    pub(crate) fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut RecordingSession> {
        self.session.as_mut()
    }

    pub(crate) fn recording_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.recording_id.as_str())
    }

    /// `Disconnected → Idle` once the command topic is subscribed.
    pub(crate) fn attach(&mut self) -> bool {
        if self.state != ModuleState::Disconnected {
            return false;
        }
        self.state = ModuleState::Idle;
        true
    }

    /// Merge a settings patch; no change on failure.
    pub(crate) fn apply_settings(&mut self, patch: &AudioSettingsPatch) -> CoreResult<()> {
        self.settings.apply(patch)
    }

    /// `Idle/Error → Recording`.
    pub(crate) fn begin(&mut self, session: RecordingSession) {
        self.state = ModuleState::Recording;
        self.last_error = None;
        self.session = Some(session);
    }

    /// `Recording → Idle` for the session named `recording_id`.
    ///
    /// Returns `None` when that session is no longer the current one.
    pub(crate) fn end_session(&mut self, recording_id: &str) -> Option<RecordingSession> {
        if self.recording_id() != Some(recording_id) {
            return None;
        }
        self.state = ModuleState::Idle;
        self.session.take()
    }

    /// Record a failure.
    ///
    /// Without a running session the module moves to `Error`; with one the
    /// error is reported but the capture keeps running.
    pub(crate) fn record_failure(&mut self, error: String) {
        if self.session.is_none() {
            self.state = ModuleState::Error;
        }
        self.last_error = Some(error);
    }

    /// `Error → Idle` after a successful command.
    pub(crate) fn recover(&mut self) -> bool {
        if self.state != ModuleState::Error {
            return false;
        }
        self.state = ModuleState::Idle;
        self.last_error = None;
        true
    }

    /// `* → Disconnected`. The session, if any, must already be drained.
    pub(crate) fn detach(&mut self) -> Option<RecordingSession> {
        self.state = ModuleState::Disconnected;
        self.session.take()
    }

    pub(crate) fn status(&self) -> StatusMessage {
        StatusMessage {
            module_id: self.module_id.to_string(),
            state: self.state,
            timestamp: Utc::now(),
            config: self.settings.clone(),
            recording_id: self.session.as_ref().map(|s| s.recording_id.clone()),
            filename: self.session.as_ref().map(|s| s.filename.clone()),
            error: self.last_error.clone(),
        }
    }
}
