//! Engine configuration, loaded from a JSON file.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extensions::ModuleFilter;
use crate::io::ReqwestFetch;
use crate::remote::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, FallbackCodec, RemoteCodec, RemoteCompressor,
    RetryPolicy,
};
use crate::zip::{BuildOptions, DEFAULT_COMPRESSION_LEVEL};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// DEFLATE level for rewritten entries, 0-9. 0 stores.
    pub compression_level: u32,
    pub remote: RemoteConfig,
    pub extensions: ModuleFilter,
}

/// Remote compression service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Service URL; no remote fallback when unset
    pub endpoint: Option<String>,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            remote: RemoteConfig::default(),
            extensions: ModuleFilter::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Parse and validate a config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(Error::InvalidConfig(format!(
                "compression_level must be 0-9, got {}",
                self.compression_level
            )));
        }
        if self.remote.max_attempts == 0 {
            return Err(Error::InvalidConfig("remote.max_attempts must be at least 1".to_string()));
        }
        if self.remote.timeout_secs == 0 {
            return Err(Error::InvalidConfig("remote.timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions::with_level(self.compression_level)
    }
}

impl RemoteConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The local codec, backed by the remote service when an endpoint is set.
    pub fn codec(&self) -> Result<FallbackCodec> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(FallbackCodec::local_only());
        };
        let client = ReqwestFetch::with_timeout(self.timeout())
            .map_err(|e| Error::InvalidConfig(format!("{:#}", e)))?;
        let compressor =
            RemoteCompressor::new(Arc::new(client), endpoint.clone()).with_policy(self.retry_policy());
        Ok(FallbackCodec::new(Some(RemoteCodec::new(compressor))))
    }
}
