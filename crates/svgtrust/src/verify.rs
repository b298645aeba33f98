//! Verification of fetched documents against a resolved policy.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. Body size against `max_bytes`
//! 2. Content type is `image/svg+xml`
//! 3. Signature header present (or not required)
//! 4. Header parses, algorithm is ed25519, `sig` and `ts` present
//! 5. Timestamp is a positive number
//! 6. Timestamp within `max_age_ms` of now
//! 7. Public key configured
//! 8. Canonical payload built (default or override)
//! 9. Signature and key decoded
//! 10. Ed25519 verification

use std::sync::Arc;

use tracing::debug;

use crate::crypto::{decode_key_material, decode_signature, DalekBackend, SignatureBackend};
use crate::error::{TrustError, TrustResult};
use crate::payload::build_default_payload;
use crate::policy::{PayloadInput, SecurityPolicy};
use crate::signature::{parse_signature_header, parse_timestamp_ms, ALGORITHM_ED25519};
use crate::types::FetchResult;

/// Media type every verified document must carry.
pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Result of successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    /// Whether a signature was present and checked.
    pub signed: bool,

    /// `v=` from the header.
    pub version: Option<String>,

    /// Signature timestamp in epoch milliseconds.
    pub timestamp_ms: Option<i64>,
}

impl VerifyOutcome {
    fn unsigned() -> Self {
        Self {
            signed: false,
            version: None,
            timestamp_ms: None,
        }
    }
}

/// Signature verifier with injectable crypto and clock.
#[derive(Clone)]
pub struct SignatureVerifier {
    backend: Arc<dyn SignatureBackend>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureVerifier {
    /// ed25519-dalek backend, wall clock.
    pub fn new() -> Self {
        Self {
            backend: Arc::new(DalekBackend),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn SignatureBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Verify `result` (fetched from `locator`) against `policy`.
    pub fn verify(
        &self,
        result: &FetchResult,
        policy: &SecurityPolicy,
        locator: &str,
    ) -> TrustResult<VerifyOutcome> {
        // 1. Size
        let actual = result.bytes.len() as u64;
        if policy.max_bytes > 0 && actual > policy.max_bytes {
            return Err(TrustError::PayloadTooLarge {
                limit: policy.max_bytes,
                actual,
            });
        }

        // 2. Content type
        if !result
            .content_type
            .to_ascii_lowercase()
            .starts_with(SVG_CONTENT_TYPE)
        {
            return Err(TrustError::InvalidContentType {
                content_type: if result.content_type.is_empty() {
                    "unknown".to_string()
                } else {
                    result.content_type.clone()
                },
            });
        }

        // 3. Header
        let Some(header_value) = result
            .header(&policy.signature_header)
            .filter(|v| !v.is_empty())
        else {
            if policy.require_signature {
                return Err(TrustError::MissingSignature {
                    header: policy.signature_header.clone(),
                });
            }
            debug!(url = %locator, "no signature header, unsigned document allowed");
            return Ok(VerifyOutcome::unsigned());
        };

        // 4. Parse
        let parsed = parse_signature_header(header_value).ok_or_else(|| {
            TrustError::UnsupportedAlgorithm {
                algorithm: String::new(),
            }
        })?;
        if parsed.algorithm != ALGORITHM_ED25519 {
            return Err(TrustError::UnsupportedAlgorithm {
                algorithm: parsed.algorithm,
            });
        }
        let signature_b64 = parsed
            .signature
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(TrustError::MissingSignatureValue)?;
        let timestamp_raw = parsed
            .timestamp
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(TrustError::MissingTimestamp)?;

        // 5. Timestamp
        let timestamp_ms =
            parse_timestamp_ms(timestamp_raw).ok_or_else(|| TrustError::InvalidTimestamp {
                value: timestamp_raw.to_string(),
            })?;

        // 6. Freshness
        if policy.max_age_ms > 0 {
            let age_ms = (self.clock.now_ms() as f64 - timestamp_ms).abs();
            if age_ms > policy.max_age_ms as f64 {
                return Err(TrustError::SignatureExpired {
                    age_ms: age_ms.min(u64::MAX as f64) as u64,
                    max_age_ms: policy.max_age_ms,
                });
            }
        }

        // 7. Key
        let public_key = policy
            .public_key
            .as_ref()
            .ok_or(TrustError::MissingPublicKey)?;

        // 8. Payload
        let url = if result.url.is_empty() {
            locator
        } else {
            result.url.as_str()
        };
        let input = PayloadInput {
            svg_bytes: &result.bytes,
            url,
            content_type: &result.content_type,
            timestamp: timestamp_raw,
        };
        let payload = match &policy.payload_builder {
            Some(builder) => builder.build(&input),
            None => build_default_payload(&input, policy.path_mode),
        };

        // 9. Decode
        let signature_bytes = decode_signature(signature_b64)?;
        let public_key_bytes = decode_key_material(public_key)?;

        // 10. Verify
        if !self
            .backend
            .verify_ed25519(&public_key_bytes, &signature_bytes, &payload)
        {
            return Err(TrustError::signature_invalid("ed25519 verification failed"));
        }

        debug!(url = %locator, ts = timestamp_raw, "signature verified");
        Ok(VerifyOutcome {
            signed: true,
            version: parsed.version,
            timestamp_ms: Some(timestamp_ms as i64),
        })
    }
}
