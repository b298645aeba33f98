//! `svgtrust fetch`: load one remote SVG through the full pipeline.

use std::fs;

use anyhow::Context;
use serde::Serialize;
use svgtrust::{
    LoadedSvg, PathMode, PolicyOverride, RemoteSvgLoader, SecurityOptions, TransformOptions,
};
use tracing::info;

use crate::cli::args::{FetchArgs, OutputFormat, PathModeArg};
use crate::exit_codes::SUCCESS;

#[derive(Debug, Serialize)]
struct FetchReport<'a> {
    url: &'a str,
    cache_key: &'a str,
    secured: bool,
    signed: bool,
    version: Option<&'a str>,
    signed_at: Option<String>,
    bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    markup: Option<&'a str>,
}

pub async fn run(args: FetchArgs) -> anyhow::Result<i32> {
    let policy = build_policy(&args)?;
    let transform = TransformOptions {
        replace_colors: !args.keep_colors,
        title: args.title.clone(),
    };

    let loader = RemoteSvgLoader::from_env().context("failed to create HTTP client")?;
    let loaded = loader
        .load_detailed(&args.url, &policy, &transform)
        .await
        .with_context(|| format!("failed to load {}", args.url))?;

    if let Some(outcome) = &loaded.verification {
        info!(url = %args.url, signed = outcome.signed, "document accepted");
    }

    if let Some(path) = &args.output {
        fs::write(path, &loaded.markup)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    match args.format {
        OutputFormat::Text => {
            if args.output.is_none() {
                println!("{}", loaded.markup);
            }
        }
        OutputFormat::Json => {
            let report = report(&args, &loaded);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(SUCCESS)
}

/// Environment options, overridden by flags.
fn build_policy(args: &FetchArgs) -> anyhow::Result<PolicyOverride> {
    policy_with_env(args, SecurityOptions::from_env())
}

/// Any security flag re-enables security even when `SVGTRUST_SECURITY`
/// turned it off.
fn policy_with_env(
    args: &FetchArgs,
    env: Option<SecurityOptions>,
) -> anyhow::Result<PolicyOverride> {
    if args.no_security {
        return Ok(PolicyOverride::Disabled);
    }

    let mut options = env.unwrap_or_default();
    if has_security_flags(args) {
        options.enabled = None;
    }
    if let Some(key) = &args.public_key {
        options = options.with_public_key(key.as_str());
    }
    if let Some(path) = &args.public_key_file {
        let key = fs::read_to_string(path)
            .with_context(|| format!("failed to read public key {}", path.display()))?;
        options = options.with_public_key(key);
    }
    if let Some(header) = &args.signature_header {
        options = options.with_signature_header(header.as_str());
    }
    if let Some(max_age_ms) = args.max_age_ms {
        options = options.with_max_age_ms(max_age_ms);
    }
    if let Some(max_bytes) = args.max_bytes {
        options = options.with_max_bytes(max_bytes);
    }
    if let Some(mode) = args.path_mode {
        options = options.with_path_mode(match mode {
            PathModeArg::Pathname => PathMode::PathOnly,
            PathModeArg::PathnameSearch => PathMode::PathAndQuery,
        });
    }
    if args.allow_unsigned {
        options = options.with_require_signature(false);
    }
    if args.no_sanitize {
        options = options.with_sanitize(false);
    }

    Ok(PolicyOverride::Use(options))
}

fn has_security_flags(args: &FetchArgs) -> bool {
    args.public_key.is_some()
        || args.public_key_file.is_some()
        || args.signature_header.is_some()
        || args.max_age_ms.is_some()
        || args.max_bytes.is_some()
        || args.path_mode.is_some()
        || args.allow_unsigned
        || args.no_sanitize
}

fn report<'a>(args: &'a FetchArgs, loaded: &'a LoadedSvg) -> FetchReport<'a> {
    let outcome = loaded.verification.as_ref();
    FetchReport {
        url: &args.url,
        cache_key: &loaded.cache_key,
        secured: outcome.is_some(),
        signed: outcome.is_some_and(|o| o.signed),
        version: outcome.and_then(|o| o.version.as_deref()),
        signed_at: outcome
            .and_then(|o| o.timestamp_ms)
            .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
            .map(|t| t.to_rfc3339()),
        bytes: loaded.markup.len(),
        markup: args.output.is_none().then_some(loaded.markup.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Command};
    use clap::Parser;
    use svgtrust::{resolve_policy, KeyMaterial};

    fn fetch_args(extra: &[&str]) -> FetchArgs {
        let mut argv = vec!["svgtrust", "fetch", "https://cdn.test/a.svg"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().cmd {
            Command::Fetch(args) => args,
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_no_security_disables_policy() {
        let policy = build_policy(&fetch_args(&["--no-security"])).unwrap();
        assert!(matches!(policy, PolicyOverride::Disabled));
    }

    #[test]
    fn test_flags_map_onto_options() {
        let policy = build_policy(&fetch_args(&[
            "--public-key",
            "00ff",
            "--signature-header",
            "X-Sig",
            "--max-bytes",
            "10",
            "--path-mode",
            "pathname",
            "--allow-unsigned",
            "--no-sanitize",
        ]))
        .unwrap();

        let resolved = resolve_policy(&policy, None).unwrap();
        assert_eq!(resolved.public_key, Some(KeyMaterial::Text("00ff".into())));
        assert_eq!(resolved.signature_header, "X-Sig");
        assert_eq!(resolved.max_bytes, 10);
        assert_eq!(resolved.path_mode, PathMode::PathOnly);
        assert!(!resolved.require_signature);
        assert!(!resolved.sanitize);
    }

    #[test]
    fn test_key_flag_overrides_disabled_env() {
        let env = Some(SecurityOptions::disabled().with_max_bytes(512));

        let args = fetch_args(&["--public-key", "00ff"]);
        let policy = policy_with_env(&args, env.clone()).unwrap();
        let resolved = resolve_policy(&policy, None).expect("security re-enabled");
        assert_eq!(resolved.public_key, Some(KeyMaterial::Text("00ff".into())));
        assert_eq!(resolved.max_bytes, 512);

        // Without security flags the environment still decides.
        let policy = policy_with_env(&fetch_args(&[]), env).unwrap();
        assert!(resolve_policy(&policy, None).is_none());
    }

    #[test]
    fn test_report_without_verification() {
        let args = fetch_args(&["--no-security", "--format", "json"]);
        let loaded = LoadedSvg {
            markup: "<svg/>".into(),
            cache_key: "https://cdn.test/a.svg".into(),
            verification: None,
        };
        let value = serde_json::to_value(report(&args, &loaded)).unwrap();
        assert_eq!(value["secured"], false);
        assert_eq!(value["signed"], false);
        assert_eq!(value["markup"], "<svg/>");
        assert!(value["signed_at"].is_null());
    }
}
