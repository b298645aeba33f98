//! Remote SVG loader: fetch, verify, sanitize, transform.
//!
//! Every failure evicts the cache entry for the locator, so the next load
//! goes back to the network. Successful loads leave the entry in place.
//! Evictions are scoped to the slot this load observed; a newer fetch under
//! the same key is left alone.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{FetchCache, SlotId};
use crate::error::{TrustError, TrustResult};
use crate::fetch::Fetcher;
use crate::policy::{cache_key, resolve_policy, PolicyOverride, SecurityPolicy};
use crate::registry::SecurityRegistry;
use crate::sanitize::Sanitizer;
use crate::transform::{process_svg, TransformOptions};
use crate::verify::{SignatureVerifier, VerifyOutcome};

/// Trusted markup plus what was checked to produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSvg {
    /// Final markup.
    pub markup: String,

    /// Cache slot the fetch used.
    pub cache_key: String,

    /// Verification report; `None` when no policy was active.
    pub verification: Option<VerifyOutcome>,
}

/// Loads remote SVG documents under a security policy.
#[derive(Debug, Clone)]
pub struct RemoteSvgLoader {
    cache: Arc<FetchCache>,
    verifier: SignatureVerifier,
    sanitizer: Sanitizer,
    registry: SecurityRegistry,
}

impl RemoteSvgLoader {
    /// Loader over `fetcher`, reading fallback options from the process-wide
    /// registry.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_cache(Arc::new(FetchCache::new(fetcher)))
    }

    /// Loader over the process-wide cache ([`FetchCache::global`]).
    pub fn from_env() -> TrustResult<Self> {
        Ok(Self::with_cache(FetchCache::global()?))
    }

    /// Loader sharing an existing cache.
    pub fn with_cache(cache: Arc<FetchCache>) -> Self {
        Self {
            cache,
            verifier: SignatureVerifier::new(),
            sanitizer: Sanitizer::new(),
            registry: SecurityRegistry::global().clone(),
        }
    }

    pub fn with_verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Use `registry` for fallback options instead of the process-wide one.
    pub fn with_registry(mut self, registry: SecurityRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    pub fn registry(&self) -> &SecurityRegistry {
        &self.registry
    }

    /// Load `locator` with the default transforms.
    pub async fn load(&self, locator: &str, per_call: &PolicyOverride) -> TrustResult<String> {
        self.load_with(locator, per_call, &TransformOptions::default())
            .await
    }

    /// Load `locator` with explicit transforms.
    pub async fn load_with(
        &self,
        locator: &str,
        per_call: &PolicyOverride,
        transform: &TransformOptions,
    ) -> TrustResult<String> {
        self.load_detailed(locator, per_call, transform)
            .await
            .map(|loaded| loaded.markup)
    }

    /// Load `locator` and report what was verified.
    ///
    /// An empty locator yields an empty document without touching the network.
    pub async fn load_detailed(
        &self,
        locator: &str,
        per_call: &PolicyOverride,
        transform: &TransformOptions,
    ) -> TrustResult<LoadedSvg> {
        if locator.is_empty() {
            return Ok(LoadedSvg {
                markup: String::new(),
                cache_key: String::new(),
                verification: None,
            });
        }

        let fallback = self.registry.get();
        let policy = resolve_policy(per_call, fallback.as_ref());
        let key = cache_key(locator, policy.as_ref());
        debug!(url = %locator, cache_key = %key, secured = policy.is_some(), "loading svg");

        let (slot, result) = match self.cache.fetch_slot(locator, &key).await {
            Ok(fetched) => fetched,
            Err(e) => {
                debug!(url = %locator, error = %e, "fetch failed");
                return Err(e);
            }
        };

        let Some(policy) = policy else {
            return Ok(LoadedSvg {
                markup: process_svg(&result.text, transform),
                cache_key: key,
                verification: None,
            });
        };

        let outcome = match self.verifier.verify(&result, &policy, locator) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.cache.evict_slot(&key, slot);
                warn!(url = %locator, cache_key = %key, error = %e, "svg verification failed");
                return Err(e);
            }
        };

        let markup =
            self.secure_markup(&result.text, &policy, transform, locator, (key.as_str(), slot))?;
        info!(url = %locator, signed = outcome.signed, "loaded verified svg");

        Ok(LoadedSvg {
            markup,
            cache_key: key,
            verification: Some(outcome),
        })
    }

    fn secure_markup(
        &self,
        text: &str,
        policy: &SecurityPolicy,
        transform: &TransformOptions,
        locator: &str,
        entry: (&str, SlotId),
    ) -> TrustResult<String> {
        if !policy.sanitize {
            return Ok(process_svg(text, transform));
        }

        let sanitized = self.sanitize_or_evict(text, locator, entry)?;
        let transformed = process_svg(&sanitized, transform);
        self.sanitize_or_evict(&transformed, locator, entry)
    }

    fn sanitize_or_evict(
        &self,
        markup: &str,
        locator: &str,
        (key, slot): (&str, SlotId),
    ) -> TrustResult<String> {
        let sanitized = self.sanitizer.sanitize(markup, true);
        if sanitized.is_empty() {
            self.cache.evict_slot(key, slot);
            warn!(url = %locator, cache_key = %key, "svg sanitization produced no output");
            return Err(TrustError::SanitizationFailed);
        }
        Ok(sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::build_default_payload;
    use crate::policy::{PathMode, PayloadInput, SecurityOptions};
    use crate::signature::format_signature_header;
    use crate::types::FetchedResponse;
    use crate::verify::{FixedClock, SVG_CONTENT_TYPE};
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use ed25519_dalek::{Signer, SigningKey};
    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    const NOW_MS: i64 = 1_700_000_000_000;
    const URL: &str = "https://cdn.test/icons/home.svg";
    const BODY: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24"><script>alert(1)</script><path onclick="x" fill="#222" d="M0 0h24v24H0z"/></svg>"##;

    /// Serves one fixed response and counts calls.
    struct StaticFetcher {
        body: String,
        content_type: &'static str,
        signature: Option<String>,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn new(body: &str, content_type: &'static str, signature: Option<String>) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                content_type,
                signature,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, _locator: &str) -> TrustResult<FetchedResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
            if let Some(sig) = &self.signature {
                headers.insert(
                    "x-asset-signature",
                    HeaderValue::from_str(sig).map_err(|e| TrustError::network(e.to_string()))?,
                );
            }
            Ok(FetchedResponse {
                status: 200,
                headers,
                body: self.body.clone().into_bytes(),
                url: None,
            })
        }
    }

    /// Parks every call on `gate`; fails while `fail` is set.
    #[derive(Default)]
    struct GatedFetcher {
        gate: Notify,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl GatedFetcher {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for GatedFetcher {
        async fn fetch(&self, _locator: &str) -> TrustResult<FetchedResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(TrustError::network("request failed with status 503"));
            }
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/svg+xml"));
            Ok(FetchedResponse {
                status: 200,
                headers,
                body: b"<svg><g/></svg>".to_vec(),
                url: None,
            })
        }
    }

    /// Yield to spawned tasks until `done` holds.
    async fn settle(done: impl Fn() -> bool) {
        for _ in 0..100 {
            if done() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("tasks did not settle");
    }

    fn signed_header(key: &SigningKey, body: &str) -> String {
        let ts = (NOW_MS / 1000).to_string();
        let payload = build_default_payload(
            &PayloadInput {
                svg_bytes: body.as_bytes(),
                url: URL,
                content_type: SVG_CONTENT_TYPE,
                timestamp: &ts,
            },
            PathMode::PathAndQuery,
        );
        let sig = BASE64.encode(key.sign(&payload).to_bytes());
        format_signature_header(Some("1"), &ts, &sig)
    }

    fn loader(fetcher: Arc<StaticFetcher>) -> RemoteSvgLoader {
        RemoteSvgLoader::new(fetcher)
            .with_registry(SecurityRegistry::new())
            .with_verifier(SignatureVerifier::new().with_clock(Arc::new(FixedClock(NOW_MS))))
    }

    fn options_for(key: &SigningKey) -> PolicyOverride {
        PolicyOverride::Use(
            SecurityOptions::default().with_public_key(key.verifying_key().to_bytes()),
        )
    }

    #[tokio::test]
    async fn test_signed_svg_is_verified_sanitized_and_transformed() {
        let key = SigningKey::generate(&mut rand::thread_rng());
        let fetcher = StaticFetcher::new(BODY, "image/svg+xml", Some(signed_header(&key, BODY)));
        let loader = loader(fetcher.clone());

        let loaded = loader
            .load_detailed(
                URL,
                &options_for(&key),
                &TransformOptions::default().with_title("Home"),
            )
            .await
            .unwrap();

        assert_eq!(
            loaded.markup,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><title>Home</title><path fill="currentColor" d="M0 0h24v24H0z"/></svg>"#
        );
        assert_eq!(loaded.cache_key, format!("secure:{}", URL));
        let outcome = loaded.verification.unwrap();
        assert!(outcome.signed);
        assert_eq!(outcome.version.as_deref(), Some("1"));
        assert!(loader.cache().contains(&loaded.cache_key));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_locator_skips_fetch() {
        let fetcher = StaticFetcher::new(BODY, "image/svg+xml", None);
        let loader = loader(fetcher.clone());

        let markup = loader.load("", &PolicyOverride::Inherit).await.unwrap();

        assert_eq!(markup, "");
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_policy_skips_verification_and_sanitization() {
        let fetcher = StaticFetcher::new(BODY, "text/plain", None);
        let loader = loader(fetcher.clone());

        let markup = loader
            .load_with(
                URL,
                &PolicyOverride::Inherit,
                &TransformOptions::default().with_replace_colors(false),
            )
            .await
            .unwrap();

        assert!(markup.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24">"#));
        assert!(markup.contains("<script>"));
        assert!(loader.cache().contains(URL));
    }

    #[tokio::test]
    async fn test_verification_failure_evicts_entry() {
        let key = SigningKey::generate(&mut rand::thread_rng());
        let other = SigningKey::generate(&mut rand::thread_rng());
        let fetcher = StaticFetcher::new(BODY, "image/svg+xml", Some(signed_header(&other, BODY)));
        let loader = loader(fetcher.clone());

        for _ in 0..2 {
            let err = loader.load(URL, &options_for(&key)).await.unwrap_err();
            assert!(matches!(err, TrustError::SignatureInvalid { .. }));
            assert!(!loader.cache().contains(&format!("secure:{}", URL)));
        }
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_unsigned_html_rejected_before_signature_checks() {
        let fetcher = StaticFetcher::new("<html></html>", "text/html", None);
        let loader = loader(fetcher);

        let err = loader
            .load(
                URL,
                &PolicyOverride::Use(SecurityOptions::default().with_require_signature(false)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TrustError::InvalidContentType { .. }));
    }

    #[tokio::test]
    async fn test_sanitization_failure_evicts_entry() {
        let fetcher = StaticFetcher::new("<html><svg/></html>", "image/svg+xml", None);
        let loader = loader(fetcher.clone());
        let policy =
            PolicyOverride::Use(SecurityOptions::default().with_require_signature(false));

        let err = loader.load(URL, &policy).await.unwrap_err();

        assert_eq!(err, TrustError::SanitizationFailed);
        assert!(loader.cache().is_empty());
    }

    #[tokio::test]
    async fn test_sanitize_disabled_keeps_raw_markup() {
        let fetcher = StaticFetcher::new(BODY, "image/svg+xml", None);
        let loader = loader(fetcher);
        let policy = PolicyOverride::Use(
            SecurityOptions::default()
                .with_require_signature(false)
                .with_sanitize(false),
        );

        let markup = loader.load(URL, &policy).await.unwrap();

        assert!(markup.contains("<script>"));
        assert!(markup.contains(r#"fill="currentColor""#));
    }

    #[tokio::test]
    async fn test_registry_fallback_applies() {
        let fetcher = StaticFetcher::new(BODY, "image/svg+xml", None);
        let registry = SecurityRegistry::with_options(SecurityOptions::default());
        let loader = loader(fetcher).with_registry(registry.clone());

        let err = loader.load(URL, &PolicyOverride::Inherit).await.unwrap_err();
        assert!(matches!(err, TrustError::MissingSignature { .. }));

        registry.clear();
        assert!(loader.load(URL, &PolicyOverride::Inherit).await.is_ok());
    }

    #[tokio::test]
    async fn test_stale_fetch_failure_keeps_newer_inflight_slot() {
        let fetcher = Arc::new(GatedFetcher::default());
        let loader = RemoteSvgLoader::new(fetcher.clone()).with_registry(SecurityRegistry::new());
        let inherit = PolicyOverride::Inherit;

        // First load joins fetch X and is not polled again until X has failed
        // and a second load has installed fetch Y under the same key.
        let first = loader.load(URL, &inherit);
        tokio::pin!(first);
        assert!(futures::poll!(&mut first).is_pending());
        settle(|| fetcher.calls() == 1).await;

        fetcher.fail.store(true, Ordering::SeqCst);
        fetcher.gate.notify_one();
        settle(|| !loader.cache().contains(URL)).await;
        fetcher.fail.store(false, Ordering::SeqCst);

        let second = loader.load(URL, &inherit);
        tokio::pin!(second);
        assert!(futures::poll!(&mut second).is_pending());
        settle(|| fetcher.calls() == 2).await;

        assert!(matches!(first.await, Err(TrustError::Network { .. })));
        assert!(loader.cache().contains(URL));

        let third = loader.load(URL, &inherit);
        tokio::pin!(third);
        assert!(futures::poll!(&mut third).is_pending());
        tokio::task::yield_now().await;
        assert_eq!(fetcher.calls(), 2);

        fetcher.gate.notify_one();
        let (second, third) = tokio::join!(second, third);
        assert_eq!(second.unwrap(), "<svg><g/></svg>");
        assert_eq!(third.unwrap(), "<svg><g/></svg>");
        assert_eq!(fetcher.calls(), 2);
    }
}
