//! Secure loading of remote SVG documents.
//!
//! This crate fetches SVG markup over HTTP and only hands it out after it has
//! been checked, providing:
//!
//! - Request coalescing cache (one network call per cache key)
//! - Detached Ed25519 signature verification over body, path, content type
//!   and timestamp
//! - Freshness, size and content-type gates
//! - Allow-list sanitization of the markup tree
//! - Presentation transforms (`currentColor`, size stripping, titles)
//!
//! # Quick Start
//!
//! ```no_run
//! use svgtrust::{PolicyOverride, RemoteSvgLoader, SecurityOptions};
//!
//! # async fn example() -> svgtrust::TrustResult<()> {
//! let loader = RemoteSvgLoader::from_env()?;
//!
//! let policy = SecurityOptions::default()
//!     .with_public_key("MCowBQYDK2VwAyEA...")
//!     .with_max_age_ms(60_000);
//!
//! let svg = loader
//!     .load("https://cdn.example.com/icons/home.svg", &PolicyOverride::Use(policy))
//!     .await?;
//! println!("{}", svg);
//! # Ok(())
//! # }
//! ```
//!
//! # Signature header
//!
//! Servers sign `body \n path \n content-type \n ts` and send
//!
//! ```text
//! X-Asset-Signature: ed25519; v=1; ts=1700000000; sig=BASE64(...)
//! ```
//!
//! # Configuration
//!
//! Fallback options are read from the process-wide [`SecurityRegistry`]; they
//! can be populated from the environment with [`SecurityOptions::from_env`].
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `SVGTRUST_SECURITY` | `0`/`false` disables the fallback policy |
//! | `SVGTRUST_PUBLIC_KEY` | Ed25519 public key (PEM, hex or Base64) |
//! | `SVGTRUST_SIGNATURE_HEADER` | Signature header name (default: `X-Asset-Signature`) |
//! | `SVGTRUST_MAX_AGE_MS` | Signature freshness window (default: 300000, `0` disables) |
//! | `SVGTRUST_MAX_BYTES` | Body size cap (default: 262144, `0` disables) |
//! | `SVGTRUST_REQUIRE_SIGNATURE` | `0`/`false` allows unsigned documents |
//! | `SVGTRUST_SANITIZE` | `0`/`false` skips sanitization |
//! | `SVGTRUST_PATH_MODE` | `pathname` or `pathname+search` (default) |
//! | `SVGTRUST_USER_AGENT` | HTTP user agent |
//! | `SVGTRUST_FETCH_TIMEOUT` | HTTP timeout in seconds (default: none) |

pub mod cache;
pub mod crypto;
pub mod error;
pub mod fetch;
pub mod payload;
pub mod pipeline;
pub mod policy;
pub mod registry;
pub mod sanitize;
pub mod signature;
pub mod transform;
pub mod types;
pub mod verify;

// Re-export main types
pub use cache::{FetchCache, SlotId};
pub use crypto::{DalekBackend, SignatureBackend};
pub use error::{TrustError, TrustResult};
pub use fetch::{Fetcher, HttpFetcher};
pub use pipeline::{LoadedSvg, RemoteSvgLoader};
pub use policy::{
    cache_key, resolve_policy, KeyMaterial, PathMode, PayloadBuilder, PayloadInput,
    PolicyOverride, SecurityOptions, SecurityPolicy, DEFAULT_MAX_AGE_MS, DEFAULT_MAX_BYTES,
    DEFAULT_SIGNATURE_HEADER,
};
pub use registry::SecurityRegistry;
pub use sanitize::{sanitize_svg, MarkupCodec, MarkupError, RoxmlCodec, Sanitizer};
pub use signature::{format_signature_header, parse_signature_header, ParsedSignature};
pub use transform::{process_svg, TransformOptions};
pub use types::{FetchConfig, FetchResult, FetchedResponse};
pub use verify::{Clock, FixedClock, SignatureVerifier, SystemClock, VerifyOutcome};
