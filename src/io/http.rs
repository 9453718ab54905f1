use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default request timeout, matching what the remote service is given to
/// answer one call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One outgoing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl FetchRequest {
    /// A JSON POST.
    pub fn post_json(body: Vec<u8>) -> Self {
        Self {
            method: "POST".to_string(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The network collaborator behind the remote compression service.
///
/// A transport failure (connect error, timeout) is an `Err`; any HTTP
/// response, including error statuses, is an `Ok`.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn fetch(&self, url: &str, request: FetchRequest) -> Result<FetchResponse>;
}

/// reqwest-backed fetch.
pub struct ReqwestFetch {
    client: Client,
}

impl ReqwestFetch {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn fetch(&self, url: &str, request: FetchRequest) -> Result<FetchResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .with_context(|| format!("Invalid HTTP method {}", request.method))?;

        let mut builder = self.client.request(method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let resp = builder
            .body(request.body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await.context("Failed to read response body")?;
        Ok(FetchResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_json_request() {
        let request = FetchRequest::post_json(b"{}".to_vec());
        assert_eq!(request.method, "POST");
        assert_eq!(request.headers[0].1, "application/json");
    }

    #[test]
    fn test_success_range() {
        let ok = FetchResponse { status: 204, body: Vec::new() };
        let redirect = FetchResponse { status: 302, body: Vec::new() };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let fetch = ReqwestFetch::with_timeout(Duration::from_millis(200)).unwrap();
        let result = fetch
            .fetch("http://127.0.0.1:9/compress", FetchRequest::post_json(b"{}".to_vec()))
            .await;
        assert!(result.is_err());
    }
}
