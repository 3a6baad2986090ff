use crate::config::Config;

use std::{path::PathBuf, sync::Mutex};

use rslogger_audio_core::{AudioSettings, CoreResult, RecorderError, SettingsStore};
use tracing::info;

/// Persists module settings into the `[audio]` section of the config file.
///
/// Every other section is reloaded from disk and written back untouched.
/// One instance is shared by all modules of a process so saves serialize.
#[derive(Debug)]
pub(crate) struct FileSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSettingsStore {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }
}

impl SettingsStore for FileSettingsStore {
    fn save(&self, settings: &AudioSettings) -> CoreResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| RecorderError::persistence("Settings store lock poisoned"))?;

        let mut config = Config::load_from(&self.path)
            .map_err(|e| RecorderError::persistence(e.to_string()))?;
        config.audio = settings.clone();
        config
            .save_to(&self.path)
            .map_err(|e| RecorderError::persistence(e.to_string()))?;

        info!(config_path = ?self.path, "Audio settings saved");

        Ok(())
    }
}
