use crate::config::Config;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "rslogger-audio")]
#[command(about = "Remote-controlled audio recording modules and fleet controller")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file; defaults to the platform config directory
    #[arg(long, global = true)]
    pub(crate) config_file: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) overrides: Overrides,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Settings that take precedence over the configuration file.
#[derive(Debug, Default, Args)]
pub(crate) struct Overrides {
    /// Sample rate in Hz
    #[arg(long, global = true)]
    pub(crate) samplerate: Option<u32>,

    /// Number of input channels
    #[arg(long, global = true)]
    pub(crate) channels: Option<u16>,

    /// Input device name
    #[arg(long, global = true)]
    pub(crate) device: Option<String>,

    /// Base topic
    #[arg(long, global = true)]
    pub(crate) topic: Option<String>,

    /// MQTT broker host
    #[arg(long, global = true)]
    pub(crate) broker: Option<String>,

    /// MQTT broker port
    #[arg(long, global = true)]
    pub(crate) port: Option<u16>,
}

impl Overrides {
    pub(crate) fn apply_to(&self, config: &mut Config) {
        if let Some(samplerate) = self.samplerate {
            config.audio.samplerate = samplerate;
        }
        if let Some(channels) = self.channels {
            config.audio.channels = channels;
        }
        if let Some(device) = &self.device {
            config.audio.device = Some(device.clone());
        }
        if let Some(topic) = &self.topic {
            config.bus.base_topic = topic.clone();
        }
        if let Some(broker) = &self.broker {
            config.bus.host = broker.clone();
        }
        if let Some(port) = self.port {
            config.bus.port = port;
        }
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Run recording modules and a controller console on an in-process bus
    Fleet {
        /// Module identifier; repeat for several modules
        #[arg(long = "module", required = true)]
        modules: Vec<String>,

        /// Record a generated tone instead of a real input device
        #[arg(long)]
        synthetic: bool,
    },

    /// Run one recording module attached to the MQTT broker
    Module {
        /// Module identifier, unique within the fleet
        #[arg(long)]
        id: String,

        /// Record a generated tone instead of a real input device
        #[arg(long)]
        synthetic: bool,
    },

    /// Run the controller console against the MQTT broker
    Controller,

    /// List audio input devices
    Devices,

    /// Inspect or reset the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub(crate) enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Overwrite the configuration file with defaults
    Reset,
}
