//! Upload configuration: provider endpoints, chunk sizes and the retry budget.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contract::Privacy;
use crate::error::ConfigError;
use crate::retry::RetryConfig;

pub const MIB: u64 = 1024 * 1024;
/// Resumable chunk lengths (except the last) must be multiples of this.
pub const CHUNK_GRANULARITY: u64 = 256 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub object_storage: ObjectStorageConfig,
    pub media: MediaConfig,
    pub retry: RetryConfig,
    pub request_timeout_secs: Option<u64>,
}

impl UploadConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_chunk_size("object_storage.chunk_size", self.object_storage.chunk_size)?;
        validate_chunk_size("media.chunk_size", self.media.chunk_size)?;
        if self.object_storage.endpoint.is_empty() || self.media.endpoint.is_empty() {
            return Err(ConfigError::Invalid("endpoints must not be empty".into()));
        }
        if let Some(bucket) = &self.object_storage.bucket {
            if bucket.is_empty() || bucket.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "object_storage.bucket '{bucket}' is not a valid bucket name"
                )));
            }
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            bucket = self.object_storage.bucket.as_deref().unwrap_or("<unset>"),
            prefix = %self.object_storage.prefix,
            object_chunk_size = self.object_storage.chunk_size,
            media_chunk_size = self.media.chunk_size,
            max_retries = self.retry.max_retries,
            "Loaded UploadConfig"
        );
        debug!(?self, "UploadConfig loaded (full debug)");
    }
}

fn validate_chunk_size(field: &str, size: u64) -> Result<(), ConfigError> {
    if size == 0 || size % CHUNK_GRANULARITY != 0 {
        return Err(ConfigError::Invalid(format!(
            "{field} must be a non-zero multiple of {CHUNK_GRANULARITY} bytes, got {size}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStorageConfig {
    pub endpoint: String,
    pub bucket: Option<String>,
    /// Object name prefix for backups.
    pub prefix: String,
    pub chunk_size: u64,
    pub single_shot_threshold: u64,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://storage.googleapis.com".to_string(),
            bucket: None,
            prefix: "ytd-backups".to_string(),
            chunk_size: 10 * MIB,
            single_shot_threshold: 5 * MIB,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub endpoint: String,
    pub chunk_size: u64,
    pub category_id: String,
    pub privacy: Privacy,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/upload/youtube/v3/videos".to_string(),
            chunk_size: MIB,
            category_id: "22".to_string(),
            privacy: Privacy::Private,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = UploadConfig::default();
        assert_eq!(config.object_storage.chunk_size, 10 * MIB);
        assert_eq!(config.object_storage.single_shot_threshold, 5 * MIB);
        assert_eq!(config.media.chunk_size, MIB);
        assert_eq!(config.retry.max_retries, 10);
        assert_eq!(config.retry.retriable_statuses, vec![500, 502, 503, 504]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unaligned_chunk_size() {
        let mut config = UploadConfig::default();
        config.media.chunk_size = 1000;
        assert!(config.validate().is_err());
        config.media.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bucket_with_slash() {
        let mut config = UploadConfig::default();
        config.object_storage.bucket = Some("a/b".into());
        assert!(config.validate().is_err());
    }
}
