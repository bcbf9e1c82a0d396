//! HTTP transport abstraction so upload logic can be tested without a server

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{Result, StationError};

/// Header carrying the WoW API subscription key
pub const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Sends a JSON body and reports the HTTP status
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST `body` to `url` with the API key header.
    ///
    /// Any HTTP status is `Ok`; `Err(Transport)` means no response arrived.
    async fn post_json(&self, url: &str, api_key: &str, body: &str) -> Result<u16>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StationError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, api_key: &str, body: &str) -> Result<u16> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| StationError::Transport(format!("POST {} failed: {}", url, e)))?;

        Ok(response.status().as_u16())
    }
}
