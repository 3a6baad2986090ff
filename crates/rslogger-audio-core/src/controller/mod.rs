//! Fleet controller: registry, request correlation and fan-out commands.

#[allow(clippy::module_inception)]
mod controller;
mod correlator;
mod fleet;
mod registry;

pub use {
    controller::{Controller, ControllerEvent, ControllerOptions},
    correlator::{Correlator, DEFAULT_REQUEST_TIMEOUT},
    fleet::{FleetOutcome, FleetReport},
    registry::{DEFAULT_OFFLINE_AFTER, ModuleRecord, ModuleRegistry, ModuleSummary},
};
