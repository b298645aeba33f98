//! Exit codes for the `svgtrust` binary.
//! Codes 3-6 come from [`TrustError::exit_code`] and are part of the public contract.

use svgtrust::TrustError;

pub const SUCCESS: i32 = 0;
pub const INTERNAL_ERROR: i32 = 2; // Bad arguments, unreadable input, I/O failure
pub const CONTENT_POLICY: i32 = 3; // Size or content-type gate
pub const VERIFICATION_FAILED: i32 = 4; // Signature missing, stale or invalid
pub const NETWORK_ERROR: i32 = 5; // Transport failure or non-2xx status
pub const SANITIZATION_FAILED: i32 = 6; // Markup rejected by the sanitizer

/// Exit code for a command failure: the [`TrustError`] in the chain, if any,
/// decides; anything else is an internal error.
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<TrustError>())
        .map_or(INTERNAL_ERROR, TrustError::exit_code)
}
