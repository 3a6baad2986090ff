//! Matches module responses to the commands that caused them.
//!
//! Each outstanding request owns a oneshot slot keyed by its `request_id`.
//! The resolver and the timeout path both claim a slot by removing it from
//! the pending map under the same lock, so exactly one of them decides the
//! outcome.

use crate::{
    Command, CommandEnvelope, CoreResult, MessageKind, ModuleId, RecorderError, TopicScheme,
    bus::MessageBus, protocol::CommandResponse,
};

use std::{
    collections::HashMap,
    panic::Location,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use error_location::ErrorLocation;
use tokio::sync::oneshot;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

/// Default wait for a module to answer a command.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

struct PendingRequest {
    module_id: ModuleId,
    issued_at: Instant,
    reply: oneshot::Sender<CommandResponse>,
}

/// Removes a request's slot when the caller stops waiting for any reason.
struct PendingGuard<'a> {
    correlator: &'a Correlator,
    request_id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.correlator.claim(&self.request_id).is_some() {
            debug!(request_id = %self.request_id, "Abandoned request removed");
        }
    }
}

/// Issues commands and pairs each with its response or a timeout.
pub struct Correlator {
    bus: Arc<dyn MessageBus>,
    scheme: TopicScheme,
    timeout: Duration,
    pending: Mutex<HashMap<String, PendingRequest>>,
    closed: AtomicBool,
}

impl Correlator {
    /// Correlator publishing through `bus`.
    pub fn new(bus: Arc<dyn MessageBus>, scheme: TopicScheme, timeout: Duration) -> Self {
        Self {
            bus,
            scheme,
            timeout,
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Configured response deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Requests still waiting for an answer.
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        self.pending.lock().unwrap_or_else(|e| {
            error!("Pending request map lock poisoned, recovering: {}", e);
            e.into_inner()
        })
    }

    fn claim(&self, request_id: &str) -> Option<PendingRequest> {
        self.pending().remove(request_id)
    }

    #[track_caller]
    fn closed_error(module_id: &ModuleId) -> RecorderError {
        RecorderError::CorrelatorClosed {
            module_id: module_id.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Publish `command` to `module_id` and wait for its response.
    ///
    /// Fails with [`RecorderError::Timeout`] when nothing arrives within the
    /// deadline, with the bus error when publishing fails, and with
    /// [`RecorderError::CorrelatorClosed`] after [`Correlator::shutdown`].
    /// A module that answered `success = false` is still `Ok`.
    #[instrument(skip(self, command), fields(command = command.kind()))]
    pub async fn send_command(
        &self,
        module_id: &ModuleId,
        command: Command,
    ) -> CoreResult<CommandResponse> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Self::closed_error(module_id));
        }

        let request_id = Uuid::new_v4().to_string();
        let (reply, mut rx) = oneshot::channel();

        self.pending().insert(
            request_id.clone(),
            PendingRequest {
                module_id: module_id.clone(),
                issued_at: Instant::now(),
                reply,
            },
        );
        let _guard = PendingGuard {
            correlator: self,
            request_id: request_id.clone(),
        };

        let envelope = CommandEnvelope {
            request_id: Some(request_id.clone()),
            command,
        };
        let topic = self.scheme.topic(module_id, MessageKind::Command);
        self.bus.publish(&topic, envelope.encode()?).await?;

        debug!(request_id = %request_id, "Command published");

        match tokio::time::timeout(self.timeout, &mut rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Self::closed_error(module_id)),
            Err(_) => {
                if self.claim(&request_id).is_some() {
                    warn!(request_id = %request_id, "Command timed out");
                    return Err(RecorderError::Timeout {
                        module_id: module_id.to_string(),
                        request_id,
                        location: ErrorLocation::from(Location::caller()),
                    });
                }

                // The resolver claimed the slot first and filled it under
                // the lock, so the value is already there.
                rx.try_recv().map_err(|_| Self::closed_error(module_id))
            }
        }
    }

    /// Hand a response to its waiter.
    ///
    /// Returns `false` for responses nobody is waiting for (no `request_id`,
    /// already timed out, or never issued here); those are discarded.
    pub fn resolve(&self, module_id: &ModuleId, response: CommandResponse) -> bool {
        let Some(request_id) = response.request_id.clone() else {
            debug!(module_id = %module_id, "Discarding response without request_id");
            return false;
        };

        let mut pending = self.pending();
        let Some(request) = pending.remove(&request_id) else {
            debug!(
                module_id = %module_id,
                request_id = %request_id,
                "Discarding response with no pending request"
            );
            return false;
        };

        if request.module_id != *module_id {
            warn!(
                expected = %request.module_id,
                actual = %module_id,
                request_id = %request_id,
                "Response arrived from an unexpected module"
            );
        }

        debug!(
            request_id = %request_id,
            elapsed_ms = request.issued_at.elapsed().as_millis() as u64,
            "Response matched"
        );

        // Filled while still holding the lock; see `send_command`.
        let delivered = request.reply.send(response).is_ok();
        drop(pending);

        delivered
    }

    /// Fail every outstanding request and refuse new ones.
    ///
    /// Returns how many requests were abandoned.
    pub fn shutdown(&self) -> usize {
        self.closed.store(true, Ordering::Release);

        let drained: Vec<PendingRequest> = self.pending().drain().map(|(_, p)| p).collect();
        let count = drained.len();

        if count > 0 {
            warn!(count, "Correlator closed with requests outstanding");
        }

        count
    }
}
