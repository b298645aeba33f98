//! Allow-list SVG sanitizer.
//!
//! Only known drawing/structure elements and presentation attributes survive.
//! Everything else is dropped: unknown elements with their subtree, comments,
//! event handlers, external `href`s and non-fragment `url(...)` references.
//!
//! Parsing and serialization go through a [`MarkupCodec`]. Without one, strict
//! mode yields an empty document and lenient mode returns the input untouched;
//! the lenient path is an escape hatch, not a security guarantee.

use std::sync::{Arc, LazyLock};

use regex::Regex;

mod roxml;
mod tree;

pub use roxml::RoxmlCodec;
pub use tree::{serialize, Element, Node};

/// Root element every sanitized document must have.
const ROOT_TAG: &str = "svg";

const ALLOWED_TAGS: &[&str] = &[
    "svg",
    "g",
    "path",
    "rect",
    "circle",
    "ellipse",
    "line",
    "polyline",
    "polygon",
    "defs",
    "use",
    "symbol",
    "title",
    "desc",
    "lineargradient",
    "radialgradient",
    "stop",
    "clippath",
    "mask",
    "pattern",
];

const ALLOWED_ATTRIBUTES: &[&str] = &[
    "xmlns",
    "xmlns:xlink",
    "viewbox",
    "width",
    "height",
    "x",
    "y",
    "x1",
    "y1",
    "x2",
    "y2",
    "cx",
    "cy",
    "r",
    "rx",
    "ry",
    "d",
    "points",
    "fill",
    "fill-rule",
    "fill-opacity",
    "stroke",
    "stroke-width",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
    "stroke-dasharray",
    "stroke-dashoffset",
    "stroke-opacity",
    "opacity",
    "transform",
    "pathlength",
    "clip-path",
    "mask",
    "filter",
    "id",
    "class",
    "preserveaspectratio",
    "vector-effect",
    "shape-rendering",
    "marker-start",
    "marker-mid",
    "marker-end",
    "gradientunits",
    "gradienttransform",
    "offset",
    "stop-color",
    "stop-opacity",
    "href",
    "xlink:href",
    "role",
    "focusable",
    "aria-hidden",
    "aria-label",
];

static URL_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)url\(([^)]+)\)").expect("valid regex"));

/// Markup failed to parse.
#[derive(Debug, Clone, thiserror::Error)]
#[error("markup parse error: {0}")]
pub struct MarkupError(pub String);

/// Parse/serialize capability.
pub trait MarkupCodec: Send + Sync + 'static {
    /// Parse a document and return its root element.
    fn parse(&self, markup: &str) -> Result<Element, MarkupError>;

    fn serialize(&self, root: &Element) -> String;
}

/// Allow-list sanitizer.
#[derive(Clone)]
pub struct Sanitizer {
    codec: Option<Arc<dyn MarkupCodec>>,
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer")
            .field("has_codec", &self.codec.is_some())
            .finish()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer {
    /// Sanitizer backed by roxmltree.
    pub fn new() -> Self {
        Self::with_codec(Arc::new(RoxmlCodec))
    }

    pub fn with_codec(codec: Arc<dyn MarkupCodec>) -> Self {
        Self { codec: Some(codec) }
    }

    /// Sanitizer with no markup capability.
    pub fn without_codec() -> Self {
        Self { codec: None }
    }

    /// Sanitize `raw`. Returns an empty string when the document is rejected.
    pub fn sanitize(&self, raw: &str, strict: bool) -> String {
        if raw.is_empty() {
            return String::new();
        }

        let Some(codec) = &self.codec else {
            return if strict { String::new() } else { raw.to_string() };
        };

        let mut root = match codec.parse(raw) {
            Ok(root) => root,
            Err(e) => {
                tracing::debug!(error = %e, "svg rejected by parser");
                return String::new();
            }
        };
        if !root.name.eq_ignore_ascii_case(ROOT_TAG) {
            tracing::debug!(root = %root.name, "svg rejected: unexpected root element");
            return String::new();
        }

        sanitize_element(&mut root);
        codec.serialize(&root)
    }
}

/// Sanitize with the default roxmltree codec.
pub fn sanitize_svg(raw: &str, strict: bool) -> String {
    Sanitizer::new().sanitize(raw, strict)
}

fn sanitize_element(element: &mut Element) {
    element.attributes.retain(|(name, value)| keep_attribute(name, value));

    element.children.retain_mut(|child| match child {
        Node::Comment(_) => false,
        Node::Text(_) => true,
        Node::Element(e) => {
            if !is_allowed_tag(&e.name) {
                return false;
            }
            sanitize_element(e);
            true
        }
    });
}

fn is_allowed_tag(name: &str) -> bool {
    ALLOWED_TAGS.contains(&name.to_ascii_lowercase().as_str())
}

fn keep_attribute(name: &str, value: &str) -> bool {
    let lower = name.to_ascii_lowercase();

    if lower.starts_with("on") {
        return false;
    }
    if !ALLOWED_ATTRIBUTES.contains(&lower.as_str()) && !lower.starts_with("aria-") {
        return false;
    }
    if (lower == "href" || lower == "xlink:href") && !is_fragment_reference(value) {
        return false;
    }
    if value.to_ascii_lowercase().contains("url(") && !url_references_are_local(value) {
        return false;
    }
    true
}

fn is_fragment_reference(value: &str) -> bool {
    value.trim().starts_with('#')
}

fn url_references_are_local(value: &str) -> bool {
    URL_REFERENCE.captures_iter(value).all(|caps| {
        let candidate = caps.get(1).map_or("", |m| m.as_str()).trim();
        let candidate = candidate
            .strip_prefix(['\'', '"'])
            .unwrap_or(candidate);
        let candidate = candidate.strip_suffix(['\'', '"']).unwrap_or(candidate);
        candidate.starts_with('#')
    })
}
