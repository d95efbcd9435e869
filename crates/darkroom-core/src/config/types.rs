//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the database and blobs unless they are set absolute
    pub data_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.darkroom"),
        }
    }
}

/// Task and image database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file, relative to `general.data_dir` unless absolute
    pub database: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("darkroom.db"),
        }
    }
}

/// Blob storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Root directory for blob keys, relative to `general.data_dir` unless absolute
    pub root: PathBuf,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("blobs"),
        }
    }
}

/// Work queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Topic the orchestrator publishes to and the worker consumes from
    pub topic: String,

    /// How often an idle consumer polls for new messages
    pub poll_interval_ms: u64,

    /// How long a fetched, uncommitted message stays invisible before redelivery
    pub visibility_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            topic: "images".to_string(),
            poll_interval_ms: 250,
            visibility_timeout_ms: 30_000,
        }
    }
}

/// Worker loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Attempts before a task is abandoned. 0 = retry forever.
    pub max_attempts: u32,

    /// Pause after a broker error before fetching again
    pub consume_retry_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            consume_retry_delay_ms: 1000,
        }
    }
}

/// Transformation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Resize target width; thumbnails use a tenth of it
    pub width: u32,

    /// Resize target height; thumbnails use a tenth of it
    pub height: u32,

    /// JPEG quality for every output (1-100)
    pub jpeg_quality: u8,

    pub watermark: WatermarkConfig,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
            jpeg_quality: 90,
            watermark: WatermarkConfig::default(),
        }
    }
}

/// Watermark overlay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Label text; rendered upper-case
    pub label: String,

    /// Distance in pixels from the bottom-right corner
    pub margin: u32,

    /// Pixel size of one glyph dot
    pub scale: u32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            label: "DARKROOM".to_string(),
            margin: 10,
            scale: 2,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum upload size in megabytes
    pub max_upload_mb: u64,

    /// Maximum decoded image dimension (width or height)
    pub max_image_dimension: u32,

    /// Transform timeout in milliseconds
    pub transform_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_mb: 50,
            max_image_dimension: 10000,
            transform_timeout_ms: 30000,
        }
    }
}

impl LimitsConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
