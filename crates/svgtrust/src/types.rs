//! Fetch results and HTTP configuration.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// Raw response handed back by a [`Fetcher`](crate::fetch::Fetcher).
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// HTTP status (always 2xx; fetchers report other statuses as errors).
    pub status: u16,

    /// Response headers (case-insensitive lookup).
    pub headers: HeaderMap,

    /// Response body.
    pub body: Vec<u8>,

    /// URL after redirects, if the transport reports one.
    pub url: Option<String>,
}

/// Result of fetching a remote SVG.
///
/// Immutable once produced; the cache owns it and hands out shared references.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Body decoded as UTF-8 (malformed sequences replaced).
    pub text: String,

    /// Raw body bytes.
    pub bytes: Vec<u8>,

    /// Content type, lower-cased and without parameters.
    pub content_type: String,

    /// Headers from the response.
    pub headers: HeaderMap,

    /// Final URL (falls back to the requested locator).
    pub url: String,
}

impl FetchResult {
    /// Build a result from a raw response.
    pub fn from_response(locator: &str, response: FetchedResponse) -> Self {
        let content_type = normalize_content_type(
            response
                .headers
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let text = String::from_utf8_lossy(&response.body).into_owned();
        let url = response
            .url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| locator.to_string());

        Self {
            text,
            bytes: response.body,
            content_type,
            headers: response.headers,
            url,
        }
    }

    /// Header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Strip parameters and lower-case a `Content-Type` value.
pub fn normalize_content_type(value: Option<&str>) -> String {
    match value {
        Some(v) => v
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase(),
        None => String::new(),
    }
}

/// HTTP fetcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// `User-Agent` sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds. No timeout when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_user_agent() -> String {
    concat!("svgtrust/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: None,
        }
    }
}

impl FetchConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `SVGTRUST_USER_AGENT` | Override the `User-Agent` |
    /// | `SVGTRUST_FETCH_TIMEOUT` | Request timeout in seconds |
    pub fn from_env() -> Self {
        Self {
            user_agent: std::env::var("SVGTRUST_USER_AGENT")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_user_agent),
            timeout_secs: std::env::var("SVGTRUST_FETCH_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, CONTENT_TYPE};

    fn response(content_type: Option<&str>, body: &[u8], url: Option<&str>) -> FetchedResponse {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(ct).unwrap());
        }
        headers.insert("x-asset-signature", HeaderValue::from_static("ed25519; ts=1"));
        FetchedResponse {
            status: 200,
            headers,
            body: body.to_vec(),
            url: url.map(String::from),
        }
    }

    #[test]
    fn test_normalize_content_type() {
        assert_eq!(
            normalize_content_type(Some("Image/SVG+XML; charset=utf-8")),
            "image/svg+xml"
        );
        assert_eq!(normalize_content_type(Some("  text/html  ")), "text/html");
        assert_eq!(normalize_content_type(None), "");
    }

    #[test]
    fn test_from_response_lossy_decoding() {
        let result = FetchResult::from_response(
            "https://cdn.test/a.svg",
            response(Some("image/svg+xml"), b"<svg>\xff</svg>", None),
        );
        assert_eq!(result.text, "<svg>\u{FFFD}</svg>");
        assert_eq!(result.bytes, b"<svg>\xff</svg>");
        assert_eq!(result.url, "https://cdn.test/a.svg");
    }

    #[test]
    fn test_from_response_prefers_final_url() {
        let result = FetchResult::from_response(
            "https://cdn.test/a.svg",
            response(None, b"", Some("https://cdn.test/b.svg")),
        );
        assert_eq!(result.url, "https://cdn.test/b.svg");
        assert_eq!(result.content_type, "");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let result = FetchResult::from_response("/a.svg", response(None, b"", None));
        assert_eq!(result.header("x-asset-signature"), Some("ed25519; ts=1"));
        assert_eq!(result.header("X-ASSET-SIGNATURE"), Some("ed25519; ts=1"));
    }

    #[test]
    fn test_fetch_config_builder() {
        let config = FetchConfig::default()
            .with_timeout_secs(3)
            .with_user_agent("tests/1.0");
        assert_eq!(config.timeout_secs, Some(3));
        assert_eq!(config.user_agent, "tests/1.0");
        assert!(FetchConfig::default().user_agent.starts_with("svgtrust/"));
    }
}
