mod bus_config;
#[allow(clippy::module_inception)]
mod config;
mod controller_config;
mod heartbeat_config;
mod logging_config;

pub(crate) use {
    bus_config::BusConfig, config::Config, controller_config::ControllerConfig,
    heartbeat_config::HeartbeatConfig, logging_config::LoggingConfig,
};

use rslogger_audio_core::{DEFAULT_BASE_TOPIC, DEFAULT_MQTT_PORT};

use std::path::PathBuf;

pub(crate) const DEFAULT_BROKER_HOST: &str = "localhost";
pub(crate) const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
pub(crate) const DEFAULT_RECONNECT_INTERVAL_SECS: u64 = 5;
pub(crate) const DEFAULT_HEARTBEAT_ENABLED: bool = true;
pub(crate) const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub(crate) const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;
pub(crate) const DEFAULT_OFFLINE_AFTER_SECS: u64 = 60;
pub(crate) const DEFAULT_LOG_LEVEL: &str = "info";
pub(crate) const DEFAULT_LOG_TO_FILE: bool = true;
pub(crate) const DEFAULT_LOG_FILE: &str = "audio_recorder.log";

pub(crate) fn default_base_topic() -> String {
    DEFAULT_BASE_TOPIC.to_string()
}

pub(crate) fn default_broker_host() -> String {
    DEFAULT_BROKER_HOST.to_string()
}

pub(crate) fn default_broker_port() -> u16 {
    DEFAULT_MQTT_PORT
}

pub(crate) fn default_keep_alive_secs() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}

pub(crate) fn default_reconnect_interval_secs() -> u64 {
    DEFAULT_RECONNECT_INTERVAL_SECS
}

pub(crate) fn default_heartbeat_enabled() -> bool {
    DEFAULT_HEARTBEAT_ENABLED
}

pub(crate) fn default_heartbeat_interval_secs() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_SECS
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

pub(crate) fn default_offline_after_secs() -> u64 {
    DEFAULT_OFFLINE_AFTER_SECS
}

pub(crate) fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

pub(crate) fn default_log_to_file() -> bool {
    DEFAULT_LOG_TO_FILE
}

pub(crate) fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}
