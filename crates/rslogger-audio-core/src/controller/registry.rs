//! Controller-side view of the fleet, fed by status messages.

use crate::{AudioSettings, ModuleId, ModuleState, StatusMessage};

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// A module is offline once its last status is older than this.
pub const DEFAULT_OFFLINE_AFTER: Duration = Duration::from_secs(60);

/// Everything the controller knows about one module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRecord {
    /// Module identifier.
    pub module_id: ModuleId,
    /// Last reported state.
    pub state: ModuleState,
    /// When the last status arrived, on the controller's clock.
    pub last_seen: Instant,
    /// Timestamp the module put on its last status.
    pub reported_at: DateTime<Utc>,
    /// Running session, if any.
    pub recording_id: Option<String>,
    /// Settings the module reported.
    pub config: AudioSettings,
    /// Most recent failure the module reported.
    pub error: Option<String>,
}

impl ModuleRecord {
    fn from_status(module_id: ModuleId, status: &StatusMessage, now: Instant) -> Self {
        Self {
            module_id,
            state: status.state,
            last_seen: now,
            reported_at: status.timestamp,
            recording_id: status.recording_id.clone(),
            config: status.config.clone(),
            error: status.error.clone(),
        }
    }
}

/// Display-oriented snapshot of one module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleSummary {
    /// Module identifier.
    pub module_id: ModuleId,
    /// Last reported state.
    pub state: ModuleState,
    /// Whether the module has been heard from recently.
    pub online: bool,
    /// Seconds since the last status.
    pub last_seen_secs: f64,
    /// Running session, if any.
    pub recording_id: Option<String>,
    /// Most recent failure.
    pub error: Option<String>,
}

/// Known modules keyed by id.
///
/// Entries are never removed; a module that stops reporting just goes
/// offline.
#[derive(Debug)]
pub struct ModuleRegistry {
    modules: BTreeMap<ModuleId, ModuleRecord>,
    offline_after: Duration,
}

impl ModuleRegistry {
    /// Empty registry with the given freshness window.
    pub fn new(offline_after: Duration) -> Self {
        Self {
            modules: BTreeMap::new(),
            offline_after,
        }
    }

    /// Freshness window.
    pub fn offline_after(&self) -> Duration {
        self.offline_after
    }

    /// Record a status received on `module_id`'s status topic at `now`.
    ///
    /// Returns `true` when the module was not known before.
    pub fn apply_status(
        &mut self,
        module_id: &ModuleId,
        status: &StatusMessage,
        now: Instant,
    ) -> bool {
        if status.module_id != module_id.as_str() {
            warn!(
                topic_module_id = %module_id,
                payload_module_id = %status.module_id,
                "Status payload names a different module, trusting the topic"
            );
        }

        match self.modules.get_mut(module_id) {
            Some(record) => {
                if record.state != status.state {
                    info!(
                        module_id = %module_id,
                        from = %record.state,
                        to = %status.state,
                        "Module state changed"
                    );
                }
                *record = ModuleRecord::from_status(module_id.clone(), status, now);
                debug!(module_id = %module_id, state = %status.state, "Status updated");
                false
            }
            None => {
                info!(module_id = %module_id, state = %status.state, "New module discovered");
                self.modules.insert(
                    module_id.clone(),
                    ModuleRecord::from_status(module_id.clone(), status, now),
                );
                true
            }
        }
    }

    fn record_is_online(&self, record: &ModuleRecord, now: Instant) -> bool {
        now.saturating_duration_since(record.last_seen) < self.offline_after
    }

    /// Whether `module_id` reported within the freshness window.
    pub fn is_online(&self, module_id: &ModuleId, now: Instant) -> bool {
        self.modules
            .get(module_id)
            .is_some_and(|record| self.record_is_online(record, now))
    }

    /// Full record for one module.
    pub fn get(&self, module_id: &ModuleId) -> Option<&ModuleRecord> {
        self.modules.get(module_id)
    }

    /// Number of known modules, online or not.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True before any status has been seen.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Summaries of every known module, ordered by id.
    pub fn summaries(&self, now: Instant) -> Vec<ModuleSummary> {
        self.modules
            .values()
            .map(|record| ModuleSummary {
                module_id: record.module_id.clone(),
                state: record.state,
                online: self.record_is_online(record, now),
                last_seen_secs: now.saturating_duration_since(record.last_seen).as_secs_f64(),
                recording_id: record.recording_id.clone(),
                error: record.error.clone(),
            })
            .collect()
    }

    /// Online modules currently in `state`, ordered by id.
    pub fn in_state(&self, state: ModuleState, now: Instant) -> Vec<ModuleId> {
        self.modules
            .values()
            .filter(|record| record.state == state && self.record_is_online(record, now))
            .map(|record| record.module_id.clone())
            .collect()
    }

    /// Number of online modules.
    pub fn online_count(&self, now: Instant) -> usize {
        self.modules
            .values()
            .filter(|record| self.record_is_online(record, now))
            .count()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_OFFLINE_AFTER)
    }
}
