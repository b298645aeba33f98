//! Security policy options and resolution.
//!
//! A [`SecurityOptions`] value is the partial, user-facing input: every field is
//! optional. [`resolve_policy`] merges a per-call override, a process-wide
//! fallback and the built-in defaults into a fully populated
//! [`SecurityPolicy`], or `None` when security is disabled.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Default response header carrying the detached signature.
pub const DEFAULT_SIGNATURE_HEADER: &str = "X-Asset-Signature";

/// Default freshness window (5 minutes).
pub const DEFAULT_MAX_AGE_MS: u64 = 5 * 60 * 1000;

/// Default body size cap (256 KiB).
pub const DEFAULT_MAX_BYTES: u64 = 256 * 1024;

/// Which part of the resolved URL goes into the canonical payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PathMode {
    /// Path only (`/icons/a.svg`).
    #[serde(rename = "pathname")]
    PathOnly,

    /// Path plus query string (`/icons/a.svg?v=2`).
    #[default]
    #[serde(rename = "pathname+search")]
    PathAndQuery,
}

impl FromStr for PathMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pathname" | "path" => Ok(Self::PathOnly),
            "pathname+search" | "path+query" => Ok(Self::PathAndQuery),
            other => Err(format!("unknown path mode: {}", other)),
        }
    }
}

impl fmt::Display for PathMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathOnly => write!(f, "pathname"),
            Self::PathAndQuery => write!(f, "pathname+search"),
        }
    }
}

/// Public key material as configured: text (PEM, hex or Base64) or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyMaterial {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<&str> for KeyMaterial {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for KeyMaterial {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for KeyMaterial {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<[u8; 32]> for KeyMaterial {
    fn from(value: [u8; 32]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

/// Inputs handed to a custom payload builder.
#[derive(Debug, Clone, Copy)]
pub struct PayloadInput<'a> {
    /// Raw response body.
    pub svg_bytes: &'a [u8],

    /// Final response URL (or the requested locator).
    pub url: &'a str,

    /// Normalized content type.
    pub content_type: &'a str,

    /// `ts=` value exactly as it appeared in the header.
    pub timestamp: &'a str,
}

/// Override for canonical payload construction.
#[derive(Clone)]
pub struct PayloadBuilder(Arc<dyn Fn(&PayloadInput<'_>) -> Vec<u8> + Send + Sync>);

impl PayloadBuilder {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&PayloadInput<'_>) -> Vec<u8> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn build(&self, input: &PayloadInput<'_>) -> Vec<u8> {
        (self.0)(input)
    }
}

impl fmt::Debug for PayloadBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PayloadBuilder(..)")
    }
}

/// Partial security options (per call or process-wide fallback).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityOptions {
    /// `Some(false)` disables verification and sanitization entirely.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Ed25519 public key.
    #[serde(default)]
    pub public_key: Option<KeyMaterial>,

    /// Header carrying the signature.
    #[serde(default)]
    pub signature_header: Option<String>,

    /// Freshness window; `0` disables the check.
    #[serde(default)]
    pub max_age_ms: Option<u64>,

    /// Body size cap; `0` disables the check.
    #[serde(default)]
    pub max_bytes: Option<u64>,

    #[serde(default)]
    pub require_signature: Option<bool>,

    #[serde(default)]
    pub sanitize: Option<bool>,

    #[serde(default)]
    pub path_mode: Option<PathMode>,

    #[serde(skip)]
    pub payload_builder: Option<PayloadBuilder>,
}

impl SecurityOptions {
    /// Options that turn security off.
    pub fn disabled() -> Self {
        Self {
            enabled: Some(false),
            ..Default::default()
        }
    }

    /// Load fallback options from the environment.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `SVGTRUST_SECURITY` | `0`/`false` disables security |
    /// | `SVGTRUST_PUBLIC_KEY` | Key material (PEM, hex or Base64) |
    /// | `SVGTRUST_SIGNATURE_HEADER` | Signature header name |
    /// | `SVGTRUST_MAX_AGE_MS` | Freshness window in milliseconds |
    /// | `SVGTRUST_MAX_BYTES` | Body size cap |
    /// | `SVGTRUST_REQUIRE_SIGNATURE` | `0`/`false` allows unsigned documents |
    /// | `SVGTRUST_SANITIZE` | `0`/`false` skips sanitization |
    /// | `SVGTRUST_PATH_MODE` | `pathname` or `pathname+search` |
    ///
    /// Returns `None` when none of the variables is set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        const VARS: [&str; 8] = [
            "SVGTRUST_SECURITY",
            "SVGTRUST_PUBLIC_KEY",
            "SVGTRUST_SIGNATURE_HEADER",
            "SVGTRUST_MAX_AGE_MS",
            "SVGTRUST_MAX_BYTES",
            "SVGTRUST_REQUIRE_SIGNATURE",
            "SVGTRUST_SANITIZE",
            "SVGTRUST_PATH_MODE",
        ];
        if VARS.iter().all(|name| lookup(name).is_none()) {
            return None;
        }

        let flag = |name: &str| {
            lookup(name).map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
        };

        Some(Self {
            enabled: flag("SVGTRUST_SECURITY"),
            public_key: lookup("SVGTRUST_PUBLIC_KEY")
                .filter(|v| !v.trim().is_empty())
                .map(KeyMaterial::Text),
            signature_header: lookup("SVGTRUST_SIGNATURE_HEADER"),
            max_age_ms: lookup("SVGTRUST_MAX_AGE_MS").and_then(|v| v.trim().parse().ok()),
            max_bytes: lookup("SVGTRUST_MAX_BYTES").and_then(|v| v.trim().parse().ok()),
            require_signature: flag("SVGTRUST_REQUIRE_SIGNATURE"),
            sanitize: flag("SVGTRUST_SANITIZE"),
            path_mode: lookup("SVGTRUST_PATH_MODE").and_then(|v| v.parse().ok()),
            payload_builder: None,
        })
    }

    /// Set the public key.
    pub fn with_public_key(mut self, key: impl Into<KeyMaterial>) -> Self {
        self.public_key = Some(key.into());
        self
    }

    /// Set the signature header name.
    pub fn with_signature_header(mut self, header: impl Into<String>) -> Self {
        self.signature_header = Some(header.into());
        self
    }

    /// Set the freshness window.
    pub fn with_max_age_ms(mut self, max_age_ms: u64) -> Self {
        self.max_age_ms = Some(max_age_ms);
        self
    }

    /// Set the size cap.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Require (or not) a signature header.
    pub fn with_require_signature(mut self, require: bool) -> Self {
        self.require_signature = Some(require);
        self
    }

    /// Sanitize (or not) verified markup.
    pub fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = Some(sanitize);
        self
    }

    pub fn with_path_mode(mut self, mode: PathMode) -> Self {
        self.path_mode = Some(mode);
        self
    }

    pub fn with_payload_builder(mut self, builder: PayloadBuilder) -> Self {
        self.payload_builder = Some(builder);
        self
    }
}

/// Per-call policy input.
///
/// `Inherit` (absent) and `Use(SecurityOptions::default())` (explicit but
/// empty) are different: the first falls back to the registry, the second
/// enables security with every default.
#[derive(Debug, Clone, Default)]
pub enum PolicyOverride {
    /// Use the process-wide fallback.
    #[default]
    Inherit,

    /// Turn security off for this call regardless of the fallback.
    Disabled,

    /// Use these options instead of the fallback.
    Use(SecurityOptions),
}

impl From<SecurityOptions> for PolicyOverride {
    fn from(options: SecurityOptions) -> Self {
        Self::Use(options)
    }
}

/// Fully resolved policy.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    pub enabled: bool,
    pub public_key: Option<KeyMaterial>,
    pub signature_header: String,
    pub max_age_ms: u64,
    pub max_bytes: u64,
    pub require_signature: bool,
    pub sanitize: bool,
    pub path_mode: PathMode,
    pub payload_builder: Option<PayloadBuilder>,
}

/// Resolve the effective policy for one call.
///
/// Never fails: malformed or missing fields fall through to defaults.
pub fn resolve_policy(
    per_call: &PolicyOverride,
    fallback: Option<&SecurityOptions>,
) -> Option<SecurityPolicy> {
    let input = match per_call {
        PolicyOverride::Inherit => fallback?,
        PolicyOverride::Disabled => return None,
        PolicyOverride::Use(options) => options,
    };

    if input.enabled == Some(false) {
        return None;
    }

    Some(SecurityPolicy {
        enabled: true,
        public_key: input.public_key.clone(),
        signature_header: input
            .signature_header
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_SIGNATURE_HEADER)
            .to_string(),
        max_age_ms: input.max_age_ms.unwrap_or(DEFAULT_MAX_AGE_MS),
        max_bytes: input.max_bytes.unwrap_or(DEFAULT_MAX_BYTES),
        require_signature: input.require_signature != Some(false),
        sanitize: input.sanitize != Some(false),
        path_mode: input.path_mode.unwrap_or_default(),
        payload_builder: input.payload_builder.clone(),
    })
}

/// Cache key for a locator: secured and unsecured fetches never share a slot.
pub fn cache_key(locator: &str, policy: Option<&SecurityPolicy>) -> String {
    match policy {
        Some(_) => format!("secure:{}", locator),
        None => locator.to_string(),
    }
}
