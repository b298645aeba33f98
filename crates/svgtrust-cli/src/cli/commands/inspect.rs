//! `svgtrust inspect-header`: explain a signature header without verifying it.

use serde::Serialize;
use svgtrust::crypto::decode_signature;
use svgtrust::signature::{parse_signature_header, parse_timestamp_ms, ALGORITHM_ED25519};

use crate::cli::args::{InspectHeaderArgs, OutputFormat};
use crate::exit_codes::{SUCCESS, VERIFICATION_FAILED};

#[derive(Debug, Default, Serialize)]
struct HeaderReport {
    algorithm: String,
    version: Option<String>,
    timestamp: Option<String>,
    signed_at: Option<String>,
    signature_bytes: Option<usize>,
    problems: Vec<String>,
}

pub fn run(args: InspectHeaderArgs) -> anyhow::Result<i32> {
    let report = inspect(&args.value);

    match args.format {
        OutputFormat::Text => {
            println!("algorithm: {}", report.algorithm);
            println!("version:   {}", report.version.as_deref().unwrap_or("-"));
            println!(
                "timestamp: {} ({})",
                report.timestamp.as_deref().unwrap_or("-"),
                report.signed_at.as_deref().unwrap_or("unparseable")
            );
            match report.signature_bytes {
                Some(n) => println!("signature: {} bytes", n),
                None => println!("signature: -"),
            }
            for problem in &report.problems {
                eprintln!("problem: {}", problem);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(if report.problems.is_empty() {
        SUCCESS
    } else {
        VERIFICATION_FAILED
    })
}

fn inspect(value: &str) -> HeaderReport {
    let Some(parsed) = parse_signature_header(value) else {
        return HeaderReport {
            problems: vec!["header is empty".to_string()],
            ..Default::default()
        };
    };

    let mut problems = Vec::new();
    if parsed.algorithm != ALGORITHM_ED25519 {
        problems.push(format!("unsupported algorithm: {}", parsed.algorithm));
    }

    let signed_at = match parsed.timestamp.as_deref().filter(|t| !t.is_empty()) {
        None => {
            problems.push("missing ts".to_string());
            None
        }
        Some(ts) => match parse_timestamp_ms(ts)
            .and_then(|ms| chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms as i64))
        {
            Some(t) => Some(t.to_rfc3339()),
            None => {
                problems.push(format!("invalid ts: {}", ts));
                None
            }
        },
    };

    let signature_bytes = match parsed.signature.as_deref().filter(|s| !s.is_empty()) {
        None => {
            problems.push("missing sig".to_string());
            None
        }
        Some(sig) => match decode_signature(sig) {
            Ok(bytes) => {
                if bytes.len() != 64 {
                    problems.push(format!("signature is {} bytes, expected 64", bytes.len()));
                }
                Some(bytes.len())
            }
            Err(e) => {
                problems.push(e.to_string());
                None
            }
        },
    };

    HeaderReport {
        algorithm: parsed.algorithm,
        version: parsed.version,
        timestamp: parsed.timestamp,
        signed_at,
        signature_bytes,
        problems,
    }
}
