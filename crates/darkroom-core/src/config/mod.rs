//! Configuration management for Darkroom.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section is optional in the TOML file.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Darkroom.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Task and image database
    pub store: StoreConfig,

    /// Blob storage for originals and outputs
    pub blob: BlobConfig,

    /// Work queue settings
    pub queue: QueueConfig,

    /// Worker loop settings
    pub worker: WorkerConfig,

    /// Transformation parameters
    pub transform: TransformConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.darkroom.darkroom/config.toml
    /// - Linux: ~/.config/darkroom/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\darkroom\config\config.toml
    ///
    /// Falls back to ~/.darkroom/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "darkroom", "darkroom")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".darkroom").join("config.toml")
            })
    }

    /// Get the resolved data directory (with ~ expansion).
    pub fn data_dir(&self) -> PathBuf {
        let path_str = self.general.data_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Database file; relative paths live under the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.store.database)
    }

    /// Blob root; relative paths live under the data directory.
    pub fn blob_root(&self) -> PathBuf {
        self.resolve(&self.blob.root)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
        if expanded.is_absolute() {
            expanded
        } else {
            self.data_dir().join(expanded)
        }
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transform.width, 800);
        assert_eq!(config.transform.height, 800);
        assert_eq!(config.worker.max_attempts, 5);
        assert_eq!(config.queue.topic, "images");
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[transform.watermark]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transform]\nwidth = 640\n\n[worker]\nmax_attempts = 0\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.transform.width, 640);
        assert_eq!(config.transform.height, 800);
        assert_eq!(config.worker.max_attempts, 0);
        assert_eq!(config.transform.watermark.margin, 10);
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transform]\njpeg_quality = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_relative_paths_resolve_under_data_dir() {
        let mut config = Config::default();
        config.general.data_dir = PathBuf::from("/var/lib/darkroom");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/darkroom/darkroom.db")
        );

        config.blob.root = PathBuf::from("/srv/blobs");
        assert_eq!(config.blob_root(), PathBuf::from("/srv/blobs"));
    }
}
