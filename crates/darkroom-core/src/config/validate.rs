//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

const MAX_WATERMARK_SCALE: u32 = 16;
const MAX_WATERMARK_MARGIN: u32 = 10_000;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        // Thumbnails are a tenth of the resize target and must stay non-empty.
        if self.transform.width < 10 || self.transform.height < 10 {
            return Err(ConfigError::ValidationError(
                "transform.width and transform.height must be >= 10".into(),
            ));
        }
        if self.transform.jpeg_quality == 0 || self.transform.jpeg_quality > 100 {
            return Err(ConfigError::ValidationError(
                "transform.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if !(1..=MAX_WATERMARK_SCALE).contains(&self.transform.watermark.scale) {
            return Err(ConfigError::ValidationError(format!(
                "transform.watermark.scale must be between 1 and {MAX_WATERMARK_SCALE}"
            )));
        }
        if self.transform.watermark.margin > MAX_WATERMARK_MARGIN {
            return Err(ConfigError::ValidationError(format!(
                "transform.watermark.margin must be <= {MAX_WATERMARK_MARGIN}"
            )));
        }
        if self.transform.watermark.label.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "transform.watermark.label must not be empty".into(),
            ));
        }
        if self.queue.topic.is_empty() {
            return Err(ConfigError::ValidationError(
                "queue.topic must not be empty".into(),
            ));
        }
        if self.queue.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "queue.poll_interval_ms must be > 0".into(),
            ));
        }
        if self.queue.visibility_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "queue.visibility_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.max_upload_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_upload_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.transform_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.transform_timeout_ms must be > 0".into(),
            ));
        }
        if self.logging.format != "pretty" && self.logging.format != "json" {
            return Err(ConfigError::ValidationError(
                "logging.format must be \"pretty\" or \"json\"".into(),
            ));
        }
        Ok(())
    }
}
