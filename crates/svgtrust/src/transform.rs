//! Text transforms applied to trusted SVG markup.
//!
//! These run after verification and sanitization and operate on the
//! serialized text, not on a parsed tree.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n").expect("valid regex"));

static SVG_OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<svg\b([^>]*)>").expect("valid regex"));

static SIZE_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s(width|height)=("[^"]*"|'[^']*'|[^\s>]+)"#).expect("valid regex")
});

static REPEATED_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

// The quote alternatives stand in for a backreference; the value may not
// contain quotes, whitespace or `>`.
static FILL_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| color_attribute("fill"));
static STROKE_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| color_attribute("stroke"));

fn color_attribute(name: &str) -> Regex {
    let value = r#"[^"'\s>]+"#;
    Regex::new(&format!(
        r#"(?i)\s{name}=(?:"(?P<dq>{value})"|'(?P<sq>{value})'|(?P<bare>{value}))"#
    ))
    .expect("valid regex")
}

/// Which transforms [`process_svg`] applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Rewrite `fill`/`stroke` colours to `currentColor`.
    pub replace_colors: bool,
    /// Accessible title injected into the root element.
    pub title: Option<String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            replace_colors: true,
            title: None,
        }
    }
}

impl TransformOptions {
    pub fn with_replace_colors(mut self, replace_colors: bool) -> Self {
        self.replace_colors = replace_colors;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Remove line breaks and surrounding whitespace.
pub fn normalize_svg(svg: &str) -> String {
    LINE_BREAK.replace_all(svg, "").trim().to_string()
}

/// Drop `width`/`height` from the first `<svg>` open tag so the graphic
/// scales with its container. Nested elements are untouched.
pub fn strip_width_height(svg: &str) -> String {
    SVG_OPEN_TAG
        .replace(svg, |caps: &Captures<'_>| {
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let cleaned = SIZE_ATTRIBUTE.replace_all(attrs, "");
            let collapsed = REPEATED_WHITESPACE.replace_all(&cleaned, " ");
            let normalized = collapsed.trim();
            if normalized.is_empty() {
                "<svg>".to_string()
            } else {
                format!("<svg {}>", normalized)
            }
        })
        .into_owned()
}

/// Replace every `fill` and `stroke` value except `none` with `currentColor`.
pub fn to_current_color(svg: &str) -> String {
    let filled = replace_color_attribute(svg, &FILL_ATTRIBUTE, "fill");
    replace_color_attribute(&filled, &STROKE_ATTRIBUTE, "stroke").into_owned()
}

fn replace_color_attribute<'a>(svg: &'a str, pattern: &Regex, name: &str) -> Cow<'a, str> {
    pattern.replace_all(svg, |caps: &Captures<'_>| {
        let (quote, value) = if let Some(m) = caps.name("dq") {
            ("\"", m.as_str())
        } else if let Some(m) = caps.name("sq") {
            ("'", m.as_str())
        } else {
            ("\"", caps.name("bare").map_or("", |m| m.as_str()))
        };

        if value.eq_ignore_ascii_case("none") {
            return caps[0].to_string();
        }
        format!(" {name}={quote}currentColor{quote}")
    })
}

/// Strip angle brackets so a title cannot open markup, and escape `&` so it
/// stays well-formed text.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        match c {
            '<' | '>' => {}
            '&' => out.push_str("&amp;"),
            c => out.push(c),
        }
    }
    out
}

/// Insert `<title>` right after the first `<svg>` open tag. An empty title is
/// a no-op. A self-closing root is expanded so the title lands inside it.
pub fn inject_title(svg: &str, title: &str) -> String {
    if title.is_empty() {
        return svg.to_string();
    }
    let Some(m) = SVG_OPEN_TAG.find(svg) else {
        return svg.to_string();
    };

    let tag = m.as_str();
    match tag.strip_suffix("/>") {
        Some(open) => format!(
            "{}{}><title>{}</title></svg>{}",
            &svg[..m.start()],
            open.trim_end(),
            title,
            &svg[m.end()..]
        ),
        None => format!("{}<title>{}</title>{}", &svg[..m.end()], title, &svg[m.end()..]),
    }
}

/// Full transform chain: normalize, strip size, recolour, add title.
pub fn process_svg(raw: &str, options: &TransformOptions) -> String {
    let mut svg = strip_width_height(&normalize_svg(raw));
    if options.replace_colors {
        svg = to_current_color(&svg);
    }
    let title = options.title.as_deref().map(sanitize_title).unwrap_or_default();
    inject_title(&svg, &title)
}
