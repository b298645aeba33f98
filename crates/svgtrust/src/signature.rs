//! Signature header wire format.
//!
//! ```text
//! X-Asset-Signature: ed25519; v=1; ts=1717171717; sig=BASE64(bXlzaWc...)
//! ```
//!
//! Segments are `;`-separated and trimmed; empty segments are dropped. The
//! first segment is the algorithm token, the rest are `key=value` pairs.

/// The only supported algorithm token.
pub const ALGORITHM_ED25519: &str = "ed25519";

/// Timestamps above this are milliseconds; below, seconds.
const MS_THRESHOLD: f64 = 1e12;

/// Parsed signature header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedSignature {
    /// Lower-cased algorithm token.
    pub algorithm: String,

    /// `v=` value, stored verbatim.
    pub version: Option<String>,

    /// `ts=` value exactly as sent (part of the canonical payload).
    pub timestamp: Option<String>,

    /// `sig=` value with any `BASE64(...)` wrapper removed.
    pub signature: Option<String>,
}

/// Parse a signature header value. `None` when there is no segment at all.
pub fn parse_signature_header(value: &str) -> Option<ParsedSignature> {
    let mut parts = value.split(';').map(str::trim).filter(|p| !p.is_empty());

    let mut parsed = ParsedSignature {
        algorithm: parts.next()?.to_ascii_lowercase(),
        ..Default::default()
    };

    for part in parts {
        let Some((key, rest)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let rest = rest.trim();
        match key.as_str() {
            "v" => parsed.version = Some(rest.to_string()),
            "ts" => parsed.timestamp = Some(rest.to_string()),
            "sig" => parsed.signature = Some(unwrap_base64(rest).to_string()),
            _ => {}
        }
    }

    Some(parsed)
}

/// Strip a `BASE64(...)` wrapper.
pub fn unwrap_base64(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed
        .strip_prefix("BASE64(")
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(trimmed)
}

/// Parse a `ts=` value into epoch milliseconds.
///
/// Values above 1e12 are taken as milliseconds, anything else as seconds.
/// Returns `None` for non-numeric, non-finite or non-positive input.
pub fn parse_timestamp_ms(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let numeric: f64 = if trimmed.is_empty() {
        0.0
    } else {
        trimmed.parse().ok()?
    };
    if !numeric.is_finite() || numeric <= 0.0 {
        return None;
    }
    Some(if numeric > MS_THRESHOLD {
        numeric
    } else {
        numeric * 1000.0
    })
}

/// Format a header value the way the server is expected to send it.
pub fn format_signature_header(version: Option<&str>, timestamp: &str, signature_b64: &str) -> String {
    let mut out = String::from(ALGORITHM_ED25519);
    if let Some(v) = version {
        out.push_str("; v=");
        out.push_str(v);
    }
    out.push_str("; ts=");
    out.push_str(timestamp);
    out.push_str("; sig=BASE64(");
    out.push_str(signature_b64);
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_header() {
        let parsed =
            parse_signature_header("Ed25519; v=1; ts=1700000000; sig=BASE64(AAAA==)").unwrap();
        assert_eq!(parsed.algorithm, "ed25519");
        assert_eq!(parsed.version.as_deref(), Some("1"));
        assert_eq!(parsed.timestamp.as_deref(), Some("1700000000"));
        assert_eq!(parsed.signature.as_deref(), Some("AAAA=="));
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_empty_segments() {
        let parsed = parse_signature_header(" ed25519 ;; TS = 17 ;  sig =abc= ; ").unwrap();
        assert_eq!(parsed.timestamp.as_deref(), Some("17"));
        // Value is everything after the first '='.
        assert_eq!(parsed.signature.as_deref(), Some("abc="));
        assert!(parsed.version.is_none());
    }

    #[test]
    fn test_parse_ignores_unknown_and_bare_segments() {
        let parsed = parse_signature_header("ed25519; kid=abc; garbage; ts=5").unwrap();
        assert_eq!(parsed.timestamp.as_deref(), Some("5"));
        assert!(parsed.signature.is_none());
    }

    #[test]
    fn test_parse_empty_header() {
        assert!(parse_signature_header("").is_none());
        assert!(parse_signature_header(" ; ; ").is_none());
    }

    #[test]
    fn test_unwrap_base64() {
        assert_eq!(unwrap_base64("BASE64(abc)"), "abc");
        assert_eq!(unwrap_base64("  abc  "), "abc");
        assert_eq!(unwrap_base64("BASE64(abc"), "BASE64(abc");
        assert_eq!(unwrap_base64("base64(abc)"), "base64(abc)");
    }

    #[test]
    fn test_timestamp_seconds_and_millis() {
        assert_eq!(parse_timestamp_ms("1700000000"), Some(1_700_000_000_000.0));
        assert_eq!(parse_timestamp_ms("1700000000000"), Some(1_700_000_000_000.0));
        assert_eq!(parse_timestamp_ms("1000000000000"), Some(1e15));
        assert_eq!(parse_timestamp_ms("1.5"), Some(1500.0));
    }

    #[test]
    fn test_timestamp_rejects_invalid() {
        assert!(parse_timestamp_ms("abc").is_none());
        assert!(parse_timestamp_ms("0").is_none());
        assert!(parse_timestamp_ms("-5").is_none());
        assert!(parse_timestamp_ms("").is_none());
        assert!(parse_timestamp_ms("inf").is_none());
        assert!(parse_timestamp_ms("NaN").is_none());
    }

    #[test]
    fn test_format_roundtrips_through_parser() {
        let header = format_signature_header(Some("1"), "1700000000", "c2ln");
        assert_eq!(header, "ed25519; v=1; ts=1700000000; sig=BASE64(c2ln)");

        let parsed = parse_signature_header(&header).unwrap();
        assert_eq!(parsed.signature.as_deref(), Some("c2ln"));
    }
}
