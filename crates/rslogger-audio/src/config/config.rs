//! Configuration management for rslogger-audio.
//!
//! Loads and saves the TOML configuration file with cross-platform paths
//! and atomic writes, and derives the core crate's option structs from it.

use crate::{
    AppError, AppResult,
    config::{BusConfig, ControllerConfig, HeartbeatConfig, LoggingConfig},
};

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use rslogger_audio_core::{
    AudioSettings, ControllerOptions, DEFAULT_STOP_FLUSH_WAIT, ModuleOptions, TopicScheme,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Message bus settings.
    #[serde(default)]
    pub bus: BusConfig,
    /// Audio settings every module starts with.
    #[serde(default)]
    pub audio: AudioSettings,
    /// Module heartbeat settings.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Fleet controller settings.
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Platform location of the configuration file.
    #[track_caller]
    pub fn default_path() -> AppResult<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "rslogger", "rslogger-audio")
            .ok_or_else(|| AppError::config("Failed to get config directory"))?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from `path`, creating a default file if none exists.
    #[track_caller]
    #[instrument]
    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            info!(config_path = ?path, "No config found, creating default");
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| AppError::config(format!("Failed to parse config: {}", e)))?;

        info!(config_path = ?path, "Configuration loaded");

        Ok(config)
    }

    /// Save configuration to `path` using the atomic write pattern.
    ///
    /// Writes to a temporary file first, syncs it, then renames over the
    /// target so a crash mid-write never leaves a truncated file.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty())
            && !dir.exists()
        {
            fs::create_dir_all(dir)?;
            debug!(config_dir = ?dir, "Created config directory");
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| AppError::config(format!("Failed to serialize config: {}", e)))?;

        let temp_path = path.with_extension("toml.tmp");

        let mut temp_file = fs::File::create(&temp_path).map_err(|e| {
            AppError::config(format!("Failed to create temp config file: {}", e))
        })?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| AppError::config(format!("Failed to write temp config file: {}", e)))?;

        temp_file
            .sync_all()
            .map_err(|e| AppError::config(format!("Failed to sync temp config file: {}", e)))?;

        fs::rename(&temp_path, path).map_err(|e| {
            AppError::config(format!("Failed to rename temp config to final: {}", e))
        })?;

        info!(config_path = ?path, "Configuration saved (atomic write)");

        Ok(())
    }

    /// Reject combinations the fleet cannot run with.
    #[track_caller]
    pub fn validate(&self) -> AppResult<()> {
        let base = self.bus.base_topic.trim_end_matches('/');
        if base.is_empty() {
            return Err(AppError::config("bus.base_topic must not be empty"));
        }
        if base.contains(['+', '#']) {
            return Err(AppError::config(
                "bus.base_topic must not contain wildcard characters",
            ));
        }

        if self.bus.host.trim().is_empty() {
            return Err(AppError::config("bus.host must not be empty"));
        }
        if self.bus.keep_alive_secs == 0 {
            return Err(AppError::config("bus.keep_alive_secs must be greater than zero"));
        }

        if self.controller.request_timeout_secs == 0 {
            return Err(AppError::config(
                "controller.request_timeout_secs must be greater than zero",
            ));
        }

        if self.heartbeat.enabled {
            if self.heartbeat.interval_secs == 0 {
                return Err(AppError::config(
                    "heartbeat.interval_secs must be greater than zero",
                ));
            }
            if self.controller.offline_after_secs <= self.heartbeat.interval_secs {
                return Err(AppError::config(format!(
                    "controller.offline_after_secs ({}) must exceed heartbeat.interval_secs ({})",
                    self.controller.offline_after_secs, self.heartbeat.interval_secs
                )));
            }
        }

        self.audio.validate()?;

        Ok(())
    }

    /// Topic layout for this deployment.
    pub fn scheme(&self) -> TopicScheme {
        TopicScheme::new(self.bus.base_topic.as_str())
    }

    /// Options for the fleet controller.
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            scheme: self.scheme(),
            request_timeout: self.controller.request_timeout(),
            offline_after: self.controller.offline_after(),
        }
    }

    /// Options for each recording module.
    pub fn module_options(&self) -> ModuleOptions {
        ModuleOptions {
            heartbeat_interval: self.heartbeat.interval(),
            stop_flush_wait: DEFAULT_STOP_FLUSH_WAIT,
        }
    }
}
