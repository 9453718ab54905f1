//! Client for the remote compression service.
//!
//! Both calls are a JSON POST to one endpoint:
//!
//! | action     | request                              | response                   |
//! |------------|--------------------------------------|----------------------------|
//! | `extract`  | `{"action":"extract","data":B64}`     | `{"files":{PATH:B64,...}}` |
//! | `compress` | `{"action":"compress","files":{...}}` | `{"data":B64}`             |
//!
//! Transport errors, non-2xx statuses and unparseable bodies all consume an
//! attempt. Attempts are bounded; between attempts the delay doubles.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::io::{FetchRequest, HttpFetch};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): base * 2^(attempt-1).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum RemoteRequest<'a> {
    Extract { data: String },
    Compress { files: BTreeMap<&'a str, String> },
}

#[derive(Deserialize)]
struct ExtractResponse {
    files: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct CompressResponse {
    data: String,
}

fn decode_b64(what: &str, encoded: &str) -> std::result::Result<Vec<u8>, String> {
    BASE64
        .decode(encoded)
        .map_err(|e| format!("invalid base64 in {}: {}", what, e))
}

pub struct RemoteCompressor {
    client: Arc<dyn HttpFetch>,
    endpoint: String,
    policy: RetryPolicy,
}

impl RemoteCompressor {
    pub fn new(client: Arc<dyn HttpFetch>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn check_endpoint(&self) -> Result<()> {
        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(Error::InvalidInput(format!(
                "remote endpoint {:?} is not an http(s) URL",
                self.endpoint
            )));
        }
        if self.policy.max_attempts == 0 {
            return Err(Error::InvalidInput("max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Decompress a whole archive remotely into a path → content map.
    pub async fn remote_extract(&self, data: &[u8]) -> Result<BTreeMap<String, Vec<u8>>> {
        if data.is_empty() {
            return Err(Error::EmptyInput("archive bytes are empty".to_string()));
        }
        self.check_endpoint()?;
        let request = RemoteRequest::Extract {
            data: BASE64.encode(data),
        };
        self.call("extract", &request, |body| {
            let response: ExtractResponse =
                serde_json::from_slice(body).map_err(|e| format!("malformed extract response: {}", e))?;
            if response.files.is_empty() {
                return Err("service returned no files".to_string());
            }
            response
                .files
                .iter()
                .map(|(path, encoded)| decode_b64(path, encoded).map(|bytes| (path.clone(), bytes)))
                .collect()
        })
        .await
    }

    /// Build an archive remotely from a path → content map.
    pub async fn remote_compress(&self, files: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>> {
        if files.is_empty() {
            return Err(Error::EmptyInput("no files to compress".to_string()));
        }
        if let Some(blank) = files.keys().find(|path| path.trim().is_empty()) {
            return Err(Error::EmptyInput(format!("file path {:?} is blank", blank)));
        }
        self.check_endpoint()?;
        let request = RemoteRequest::Compress {
            files: files
                .iter()
                .map(|(path, content)| (path.as_str(), BASE64.encode(content)))
                .collect(),
        };
        self.call("compress", &request, |body| {
            let response: CompressResponse =
                serde_json::from_slice(body).map_err(|e| format!("malformed compress response: {}", e))?;
            let data = decode_b64("data", &response.data)?;
            if data.is_empty() {
                return Err("service returned an empty archive".to_string());
            }
            Ok(data)
        })
        .await
    }

    async fn call<T>(
        &self,
        action: &str,
        request: &RemoteRequest<'_>,
        parse: impl Fn(&[u8]) -> std::result::Result<T, String>,
    ) -> Result<T> {
        let body = serde_json::to_vec(request)
            .map_err(|e| Error::InvalidInput(format!("cannot encode request: {}", e)))?;
        let max = self.policy.max_attempts;
        let mut last_error = String::new();

        for attempt in 1..=max {
            debug!(action, attempt, endpoint = %self.endpoint, "remote call");
            let outcome = match self
                .client
                .fetch(&self.endpoint, FetchRequest::post_json(body.clone()))
                .await
            {
                Ok(resp) if resp.is_success() => parse(&resp.body),
                Ok(resp) => Err(format!("HTTP {}", resp.status)),
                Err(e) => Err(format!("{:#}", e)),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => last_error = e,
            }

            warn!(action, attempt, max, error = %last_error, "remote call failed");
            if attempt < max {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        Err(Error::RemoteServiceUnavailable {
            attempts: max,
            last_error,
        })
    }
}
