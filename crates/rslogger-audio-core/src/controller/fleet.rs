//! Commands fanned out to every eligible module at once.

use crate::{
    CoreResult, ModuleId, ModuleState, controller::Controller, generate_recording_id,
    protocol::CommandResponse,
};

use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::{info, instrument, warn};

/// How one module answered a fleet command.
#[derive(Debug, Clone, PartialEq)]
pub enum FleetOutcome {
    /// The module carried the command out.
    Accepted(CommandResponse),
    /// The module answered with `success = false`.
    Rejected(CommandResponse),
    /// No answer: timeout or bus failure.
    Unreachable(String),
}

impl FleetOutcome {
    fn from_result(result: CoreResult<CommandResponse>) -> Self {
        match result {
            Ok(response) if response.success => FleetOutcome::Accepted(response),
            Ok(response) => FleetOutcome::Rejected(response),
            Err(e) => FleetOutcome::Unreachable(e.to_string()),
        }
    }

    /// True only for [`FleetOutcome::Accepted`].
    pub fn is_success(&self) -> bool {
        matches!(self, FleetOutcome::Accepted(_))
    }

    /// Human-readable detail for display.
    pub fn message(&self) -> &str {
        match self {
            FleetOutcome::Accepted(response) | FleetOutcome::Rejected(response) => {
                &response.message
            }
            FleetOutcome::Unreachable(reason) => reason,
        }
    }
}

/// Per-module results of one fleet operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetReport {
    /// Group id shared by every module in a `start_all`.
    pub recording_id: Option<String>,
    /// Outcome per targeted module; untargeted modules are absent.
    pub outcomes: BTreeMap<ModuleId, FleetOutcome>,
}

impl FleetReport {
    /// Module to accepted-or-not.
    pub fn success_map(&self) -> BTreeMap<ModuleId, bool> {
        self.outcomes
            .iter()
            .map(|(module_id, outcome)| (module_id.clone(), outcome.is_success()))
            .collect()
    }

    /// Modules that accepted.
    pub fn accepted_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    /// True when no module was eligible.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl Controller {
    /// Start every online idle module under one shared recording id.
    ///
    /// Modules are asked concurrently; one module failing or timing out
    /// does not affect the others.
    #[instrument(skip(self))]
    pub async fn start_all(&self, duration: Option<f64>) -> FleetReport {
        let targets = self.online_in_state(ModuleState::Idle).await;
        let recording_id = generate_recording_id();

        if targets.is_empty() {
            warn!("No idle modules to start");
            return FleetReport {
                recording_id: Some(recording_id),
                outcomes: BTreeMap::new(),
            };
        }

        info!(
            recording_id = %recording_id,
            modules = targets.len(),
            "Starting recording on fleet"
        );

        let outcomes = join_all(targets.iter().map(|module_id| {
            let recording_id = recording_id.clone();
            async move {
                let result = self
                    .start_recording(module_id, duration, Some(recording_id))
                    .await;
                (module_id.clone(), FleetOutcome::from_result(result))
            }
        }))
        .await
        .into_iter()
        .collect();

        let report = FleetReport {
            recording_id: Some(recording_id),
            outcomes,
        };
        info!(
            accepted = report.accepted_count(),
            targeted = report.outcomes.len(),
            "Fleet start finished"
        );

        report
    }

    /// Stop every online recording module.
    #[instrument(skip(self))]
    pub async fn stop_all(&self) -> FleetReport {
        let targets = self.online_in_state(ModuleState::Recording).await;

        if targets.is_empty() {
            warn!("No recording modules to stop");
            return FleetReport::default();
        }

        info!(modules = targets.len(), "Stopping recording on fleet");

        let outcomes = join_all(targets.iter().map(|module_id| async move {
            let result = self.stop_recording(module_id).await;
            (module_id.clone(), FleetOutcome::from_result(result))
        }))
        .await
        .into_iter()
        .collect();

        let report = FleetReport {
            recording_id: None,
            outcomes,
        };
        info!(
            accepted = report.accepted_count(),
            targeted = report.outcomes.len(),
            "Fleet stop finished"
        );

        report
    }
}
