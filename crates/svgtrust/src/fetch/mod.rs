//! HTTP fetch capability.
//!
//! The pipeline only needs "bytes for a locator". [`Fetcher`] is that seam;
//! [`HttpFetcher`] is the reqwest-backed implementation. Status interpretation
//! lives in `http.rs` only.

use async_trait::async_trait;

use crate::error::TrustResult;
use crate::types::FetchedResponse;

mod http;

pub use http::HttpFetcher;

/// Fetches a locator over the network.
///
/// Implementations return an error for transport failures and for any
/// non-2xx status.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, locator: &str) -> TrustResult<FetchedResponse>;
}
