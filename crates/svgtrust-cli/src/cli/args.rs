use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "svgtrust",
    version,
    about = "Fetch, verify and sanitize remote SVG documents"
)]
pub struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch a remote SVG, verify its signature and print trusted markup
    Fetch(FetchArgs),
    /// Parse a signature header value and show its fields
    InspectHeader(InspectHeaderArgs),
    /// Sanitize a local SVG file
    Sanitize(SanitizeArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathModeArg {
    /// Sign the path only
    Pathname,
    /// Sign path and query string
    #[value(name = "pathname+search")]
    PathnameSearch,
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// URL of the SVG document
    pub url: String,

    /// Ed25519 public key (PEM, hex or Base64)
    #[arg(long, conflicts_with = "public_key_file")]
    pub public_key: Option<String>,

    /// Read the public key from a file
    #[arg(long)]
    pub public_key_file: Option<PathBuf>,

    /// Header carrying the signature
    #[arg(long)]
    pub signature_header: Option<String>,

    /// Signature freshness window in milliseconds (0 disables)
    #[arg(long)]
    pub max_age_ms: Option<u64>,

    /// Maximum body size in bytes (0 disables)
    #[arg(long)]
    pub max_bytes: Option<u64>,

    /// What part of the URL is signed
    #[arg(long, value_enum)]
    pub path_mode: Option<PathModeArg>,

    /// Accept documents without a signature header
    #[arg(long)]
    pub allow_unsigned: bool,

    /// Skip sanitization of verified markup
    #[arg(long)]
    pub no_sanitize: bool,

    /// Disable verification and sanitization entirely
    #[arg(long, conflicts_with_all = ["public_key", "public_key_file", "allow_unsigned"])]
    pub no_security: bool,

    /// Keep original fill/stroke colours
    #[arg(long)]
    pub keep_colors: bool,

    /// Accessible title to inject
    #[arg(long)]
    pub title: Option<String>,

    /// Write markup to a file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct InspectHeaderArgs {
    /// Header value, e.g. "ed25519; v=1; ts=1700000000; sig=..."
    pub value: String,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct SanitizeArgs {
    /// SVG file to sanitize ("-" reads stdin)
    pub file: PathBuf,

    /// Return input unchanged if it cannot be processed instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Also apply presentation transforms (size stripping, currentColor)
    #[arg(long)]
    pub transform: bool,
}
