//! `svgtrust sanitize`: run the allow-list sanitizer over local markup.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use svgtrust::{process_svg, Sanitizer, TransformOptions, TrustError};

use crate::cli::args::SanitizeArgs;
use crate::exit_codes::SUCCESS;

pub fn run(args: SanitizeArgs) -> anyhow::Result<i32> {
    let raw = read_input(&args.file)?;
    let markup = sanitize(&Sanitizer::new(), &raw, !args.lenient, args.transform)
        .with_context(|| format!("failed to sanitize {}", args.file.display()))?;
    println!("{}", markup);
    Ok(SUCCESS)
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn sanitize(
    sanitizer: &Sanitizer,
    raw: &str,
    strict: bool,
    transform: bool,
) -> Result<String, TrustError> {
    let mut markup = sanitizer.sanitize(raw, strict);
    if transform && !markup.is_empty() {
        markup = sanitizer.sanitize(&process_svg(&markup, &TransformOptions::default()), strict);
    }
    if markup.is_empty() {
        return Err(TrustError::SanitizationFailed);
    }
    Ok(markup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_with_transform() {
        let out = sanitize(
            &Sanitizer::new(),
            r##"<svg width="10" height="10"><script/><rect fill="#f00"/></svg>"##,
            true,
            true,
        )
        .unwrap();
        assert_eq!(out, r#"<svg><rect fill="currentColor"/></svg>"#);
    }

    #[test]
    fn test_rejected_markup_is_an_error() {
        let err = sanitize(&Sanitizer::new(), "<html/>", true, false).unwrap_err();
        assert_eq!(err, TrustError::SanitizationFailed);
    }

    #[test]
    fn test_lenient_without_codec_passes_through() {
        let out = sanitize(&Sanitizer::without_codec(), "<svg><script/></svg>", false, false)
            .unwrap();
        assert_eq!(out, "<svg><script/></svg>");
    }
}
