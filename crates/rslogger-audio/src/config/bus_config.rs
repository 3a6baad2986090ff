use crate::config::{
    default_base_topic, default_broker_host, default_broker_port, default_keep_alive_secs,
    default_reconnect_interval_secs,
};

use rslogger_audio_core::MqttBusOptions;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Message bus configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Root of every module topic.
    #[serde(default = "default_base_topic")]
    pub base_topic: String,

    /// MQTT broker host for the `module` and `controller` commands.
    #[serde(default = "default_broker_host")]
    pub host: String,

    /// MQTT broker port.
    #[serde(default = "default_broker_port")]
    pub port: u16,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Pause before reconnecting after the broker drops the session.
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl BusConfig {
    /// Broker session options for `client_id`.
    pub fn mqtt_options(&self, client_id: impl Into<String>) -> MqttBusOptions {
        let mut options = MqttBusOptions::new(&self.host, self.port, client_id);
        options.keep_alive = Duration::from_secs(self.keep_alive_secs);
        options.reconnect_interval = Duration::from_secs(self.reconnect_interval_secs);

        match &self.username {
            Some(username) => options.with_credentials(username.clone(), self.password.clone()),
            None => options,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            base_topic: default_base_topic(),
            host: default_broker_host(),
            port: default_broker_port(),
            keep_alive_secs: default_keep_alive_secs(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
            username: None,
            password: None,
        }
    }
}
