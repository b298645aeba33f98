//! Error types for the remote SVG pipeline.

/// Pipeline errors.
///
/// Errors are `Clone` because a single in-flight fetch outcome is delivered to
/// every caller waiting on the same cache key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrustError {
    /// Transport failure or non-success HTTP status.
    #[error("network error: {message}")]
    Network { message: String },

    /// Body exceeds the policy size cap.
    #[error("SVG exceeds max size ({limit} bytes, got {actual})")]
    PayloadTooLarge { limit: u64, actual: u64 },

    /// Response is not `image/svg+xml`.
    #[error("invalid content-type \"{content_type}\"")]
    InvalidContentType { content_type: String },

    /// Signature header required but absent.
    #[error("missing signature header \"{header}\"")]
    MissingSignature { header: String },

    /// Signature header names an algorithm other than ed25519.
    #[error("unsupported signature algorithm \"{algorithm}\"")]
    UnsupportedAlgorithm { algorithm: String },

    /// Signature header has no `sig=` segment.
    #[error("missing signature value")]
    MissingSignatureValue,

    /// Signature header has no `ts=` segment.
    #[error("missing signature timestamp")]
    MissingTimestamp,

    /// `ts=` is not a positive finite number.
    #[error("invalid signature timestamp \"{value}\"")]
    InvalidTimestamp { value: String },

    /// Signature timestamp outside the freshness window.
    #[error("signature timestamp is outside allowed window ({age_ms}ms > {max_age_ms}ms)")]
    SignatureExpired { age_ms: u64, max_age_ms: u64 },

    /// Policy has no key to verify with.
    #[error("missing public key for signature verification")]
    MissingPublicKey,

    /// Signature did not verify (or could not be decoded).
    #[error("signature verification failed: {reason}")]
    SignatureInvalid { reason: String },

    /// Sanitizer produced no output.
    #[error("SVG failed sanitization")]
    SanitizationFailed,
}

impl TrustError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Network/transient
            Self::Network { .. } => 5,

            // Content policy
            Self::PayloadTooLarge { .. } => 3,
            Self::InvalidContentType { .. } => 3,

            // Signature issues
            Self::MissingSignature { .. } => 4,
            Self::UnsupportedAlgorithm { .. } => 4,
            Self::MissingSignatureValue => 4,
            Self::MissingTimestamp => 4,
            Self::InvalidTimestamp { .. } => 4,
            Self::SignatureExpired { .. } => 4,
            Self::MissingPublicKey => 4,
            Self::SignatureInvalid { .. } => 4,

            // Markup
            Self::SanitizationFailed => 6,
        }
    }

    /// Whether the error came out of signature verification (steps after fetch).
    pub fn is_verification_failure(&self) -> bool {
        !matches!(self, Self::Network { .. } | Self::SanitizationFailed)
    }

    pub(crate) fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub(crate) fn signature_invalid(reason: impl Into<String>) -> Self {
        Self::SignatureInvalid {
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for TrustError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for pipeline operations.
pub type TrustResult<T> = Result<T, TrustError>;
