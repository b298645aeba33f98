//! Canonical payload construction.
//!
//! ```text
//! payload = body || "\n" || canonical_path || "\n" || content_type || "\n" || ts
//! ```
//!
//! The textual suffix is UTF-8. `ts` is the raw header value, not the parsed
//! number, so signer and verifier agree byte for byte.

use url::Url;

use crate::policy::{PathMode, PayloadInput};

/// Base used to resolve relative locators, and the fallback for malformed ones.
pub const FALLBACK_BASE: &str = "http://localhost";

/// Build the default canonical payload.
pub fn build_default_payload(input: &PayloadInput<'_>, mode: PathMode) -> Vec<u8> {
    let path = canonical_path(input.url, mode);
    let suffix = format!("\n{}\n{}\n{}", path, input.content_type, input.timestamp);

    let mut payload = Vec::with_capacity(input.svg_bytes.len() + suffix.len());
    payload.extend_from_slice(input.svg_bytes);
    payload.extend_from_slice(suffix.as_bytes());
    payload
}

/// Path (and optionally query) of `url` after resolution against
/// [`FALLBACK_BASE`].
pub fn canonical_path(url: &str, mode: PathMode) -> String {
    let Some(resolved) = resolve_url(url) else {
        return "/".to_string();
    };

    let query = resolved.query().filter(|q| !q.is_empty());
    match (mode, query) {
        (PathMode::PathAndQuery, Some(q)) => format!("{}?{}", resolved.path(), q),
        _ => resolved.path().to_string(),
    }
}

fn resolve_url(value: &str) -> Option<Url> {
    let base = Url::parse(FALLBACK_BASE).ok()?;
    match base.join(value) {
        Ok(url) => Some(url),
        Err(_) => Some(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(body: &'a [u8], url: &'a str) -> PayloadInput<'a> {
        PayloadInput {
            svg_bytes: body,
            url,
            content_type: "image/svg+xml",
            timestamp: "1700000000",
        }
    }

    #[test]
    fn test_default_payload_layout() {
        let payload = build_default_payload(
            &input(b"<svg/>", "https://cdn.test/icons/a.svg?v=2"),
            PathMode::PathAndQuery,
        );
        assert_eq!(
            payload,
            b"<svg/>\n/icons/a.svg?v=2\nimage/svg+xml\n1700000000".to_vec()
        );
    }

    #[test]
    fn test_path_only_mode_drops_query() {
        let payload = build_default_payload(
            &input(b"<svg/>", "https://cdn.test/icons/a.svg?v=2"),
            PathMode::PathOnly,
        );
        assert_eq!(
            payload,
            b"<svg/>\n/icons/a.svg\nimage/svg+xml\n1700000000".to_vec()
        );
    }

    #[test]
    fn test_body_bytes_are_kept_raw() {
        let payload = build_default_payload(&input(b"\xff\x00", "/a.svg"), PathMode::PathOnly);
        assert_eq!(&payload[..2], b"\xff\x00");
    }

    #[test]
    fn test_relative_locator_resolves_against_base() {
        assert_eq!(
            canonical_path("/icons/a.svg?x=1", PathMode::PathAndQuery),
            "/icons/a.svg?x=1"
        );
        assert_eq!(canonical_path("icons/a.svg", PathMode::PathOnly), "/icons/a.svg");
    }

    #[test]
    fn test_empty_query_is_omitted() {
        assert_eq!(
            canonical_path("https://cdn.test/a.svg?", PathMode::PathAndQuery),
            "/a.svg"
        );
    }

    #[test]
    fn test_malformed_url_falls_back_to_root() {
        assert_eq!(canonical_path("http://[::1", PathMode::PathAndQuery), "/");
    }

    #[test]
    fn test_fragment_is_not_part_of_path() {
        assert_eq!(
            canonical_path("https://cdn.test/a.svg?v=1#frag", PathMode::PathAndQuery),
            "/a.svg?v=1"
        );
    }
}
