//! Key/signature decoding and the Ed25519 verify capability.
//!
//! Verification never panics and never errors on malformed input: a key or
//! signature that cannot be decoded simply does not verify.

use std::sync::LazyLock;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH};
use regex::Regex;

use crate::error::{TrustError, TrustResult};
use crate::policy::KeyMaterial;

/// Standard alphabet, padding optional.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static PEM_ARMOUR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-----[^-]+-----").expect("valid regex"));

/// Ed25519 verification primitive.
pub trait SignatureBackend: Send + Sync + 'static {
    /// `true` only if `signature` is a valid signature of `payload` under
    /// `public_key`.
    fn verify_ed25519(&self, public_key: &[u8], signature: &[u8], payload: &[u8]) -> bool;
}

/// [`SignatureBackend`] over `ed25519-dalek`.
///
/// Accepts raw 32-byte keys and SPKI DER encoded keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct DalekBackend;

impl SignatureBackend for DalekBackend {
    fn verify_ed25519(&self, public_key: &[u8], signature: &[u8], payload: &[u8]) -> bool {
        let Some(key) = verifying_key(public_key) else {
            tracing::debug!(len = public_key.len(), "public key rejected");
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        key.verify(payload, &signature).is_ok()
    }
}

fn verifying_key(bytes: &[u8]) -> Option<VerifyingKey> {
    use pkcs8::DecodePublicKey;

    if let Ok(raw) = <[u8; PUBLIC_KEY_LENGTH]>::try_from(bytes) {
        return VerifyingKey::from_bytes(&raw).ok();
    }
    VerifyingKey::from_public_key_der(bytes).ok()
}

/// Decode a Base64 signature value.
pub fn decode_signature(value: &str) -> TrustResult<Vec<u8>> {
    decode_base64(value)
        .map_err(|e| TrustError::signature_invalid(format!("invalid base64 signature: {}", e)))
}

/// Decode configured key material to bytes.
///
/// Text is tried as PEM (armour stripped, Base64 body), then as even-length
/// hex, then as Base64.
pub fn decode_key_material(key: &KeyMaterial) -> TrustResult<Vec<u8>> {
    let text = match key {
        KeyMaterial::Bytes(bytes) => return Ok(bytes.clone()),
        KeyMaterial::Text(text) => text.trim(),
    };

    if text.starts_with("-----BEGIN") {
        let body: String = PEM_ARMOUR
            .replace_all(text, "")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        return decode_base64(&body)
            .map_err(|e| TrustError::signature_invalid(format!("invalid PEM public key: {}", e)));
    }

    if !text.is_empty() && text.len() % 2 == 0 && text.chars().all(|c| c.is_ascii_hexdigit()) {
        return hex::decode(text)
            .map_err(|e| TrustError::signature_invalid(format!("invalid hex public key: {}", e)));
    }

    decode_base64(text)
        .map_err(|e| TrustError::signature_invalid(format!("invalid base64 public key: {}", e)))
}

fn decode_base64(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64.decode(compact)
}
