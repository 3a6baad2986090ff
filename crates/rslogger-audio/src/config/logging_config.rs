use crate::config::{default_log_file, default_log_level, default_log_to_file};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to `file`.
    #[serde(default = "default_log_to_file")]
    pub to_file: bool,

    /// Log file path, relative to the working directory unless absolute.
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: default_log_to_file(),
            file: default_log_file(),
        }
    }
}
