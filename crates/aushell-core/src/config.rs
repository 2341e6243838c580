use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::notify::DEFAULT_QUEUE_CAPACITY;
use crate::store::PresetRoots;

const APP_DIR_NAME: &str = "AuShell";
const CONFIG_FILE: &str = "session.json";

/// On-disk settings of the session layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfigFile {
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
    /// Overrides the per-user preset root.
    #[serde(default)]
    pub user_presets: Option<PathBuf>,
    /// Overrides the system-wide preset root.
    #[serde(default)]
    pub local_presets: Option<PathBuf>,
}

fn default_notification_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for SessionConfigFile {
    fn default() -> Self {
        Self {
            notification_capacity: default_notification_capacity(),
            user_presets: None,
            local_presets: None,
        }
    }
}

/// Session settings together with the file they were read from.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub file: SessionConfigFile,
    path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: SessionConfigFile::default(),
            path: default_path(),
        }
    }
}

/// Directory holding AuShell configuration.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join(APP_DIR_NAME))
}

fn default_path() -> PathBuf {
    config_dir()
        .map(|dir| dir.join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

impl SessionConfig {
    /// Load from the platform config directory.
    pub fn load() -> Self {
        Self::load_from(default_path())
    }

    /// Load from `path`, falling back to defaults when the file is missing or
    /// cannot be parsed.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<SessionConfigFile>(&data) {
                Ok(file) => file,
                Err(err) => {
                    warn!(path = %path.display(), "ignoring unparsable session config: {err}");
                    SessionConfigFile::default()
                }
            },
            Err(_) => SessionConfigFile::default(),
        };
        Self { file, path }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&self.file)?;
        fs::write(&self.path, json).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Preset roots with the configured overrides applied.
    pub fn preset_roots(&self) -> PresetRoots {
        let defaults = PresetRoots::default();
        PresetRoots {
            user: self.file.user_presets.clone().unwrap_or(defaults.user),
            local: self.file.local_presets.clone().unwrap_or(defaults.local),
        }
    }

    pub fn notification_capacity(&self) -> usize {
        self.file.notification_capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_or_broken_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let missing = SessionConfig::load_from(dir.path().join("session.json"));
        assert_eq!(missing.file, SessionConfigFile::default());

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert_eq!(
            SessionConfig::load_from(&broken).file,
            SessionConfigFile::default()
        );
    }

    #[test]
    fn save_then_load_preserves_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let mut config = SessionConfig::load_from(&path);
        config.file.notification_capacity = 32;
        config.file.user_presets = Some(dir.path().join("mine"));
        config.save().unwrap();

        let loaded = SessionConfig::load_from(&path);
        assert_eq!(loaded.file, config.file);
        assert_eq!(loaded.preset_roots().user, dir.path().join("mine"));
        assert_eq!(loaded.preset_roots().local, PresetRoots::default_local_root());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{ "local_presets": "/srv/presets" }"#).unwrap();
        let config = SessionConfig::load_from(&path);
        assert_eq!(config.notification_capacity(), DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.preset_roots().local, PathBuf::from("/srv/presets"));
    }
}
