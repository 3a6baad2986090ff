//! The recording agent: state machine, command handling, heartbeat.

mod dispatcher;
mod heartbeat;
mod lifecycle;
mod service;
pub(crate) mod state;

pub use {
    heartbeat::{DEFAULT_HEARTBEAT_INTERVAL, Heartbeat, StatusBeacon},
    lifecycle::ModuleLifecycle,
    service::{DEFAULT_STOP_FLUSH_WAIT, ModuleOptions, RecorderModule, SHUTDOWN_FLUSH_WAIT},
};
