//! reqwest backend: single GET, status mapping, body read.
//!
//! No retries. A failed fetch surfaces immediately and the cache drops the
//! entry so the next caller starts over.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use tracing::debug;

use crate::error::{TrustError, TrustResult};
use crate::types::{FetchConfig, FetchedResponse};

use super::Fetcher;

/// Body preview length kept in error messages.
const ERROR_BODY_PREVIEW: usize = 200;

/// Fetcher over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> TrustResult<Self> {
        let mut default_headers = HeaderMap::new();
        let user_agent = HeaderValue::from_str(&config.user_agent).map_err(|e| {
            TrustError::network(format!("invalid user agent {:?}: {}", config.user_agent, e))
        })?;
        default_headers.insert(USER_AGENT, user_agent);
        default_headers.insert(ACCEPT, HeaderValue::from_static("image/svg+xml, */*;q=0.1"));

        let mut builder = reqwest::Client::builder().default_headers(default_headers);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder
            .build()
            .map_err(|e| TrustError::network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn from_env() -> TrustResult<Self> {
        Self::new(FetchConfig::from_env())
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> TrustResult<FetchedResponse> {
        debug!(url = %locator, "fetching remote svg");

        let response = self.client.get(locator).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(TrustError::network(if detail.is_empty() {
                format!("request failed with status {}", status.as_u16())
            } else {
                format!("request failed with status {}: {}", status.as_u16(), detail)
            }));
        }

        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| TrustError::network(format!("failed to read response body: {}", e)))?;

        Ok(FetchedResponse {
            status: status.as_u16(),
            headers,
            body: body.to_vec(),
            url: Some(url),
        })
    }
}
