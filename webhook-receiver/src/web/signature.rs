//! Webhook signature verification.
//!
//! Senders sign the request body with HMAC-SHA256 and put the lowercase hex
//! digest in `X-Hub-Signature-256`, optionally prefixed with `sha256=`.
//! The signed payload is the raw body exactly as received, never a
//! re-serialized form of the parsed JSON.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature. Header lookup is case-insensitive.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify a webhook signature.
///
/// # Arguments
///
/// * `payload` - The raw request body
/// * `signature` - The value of the signature header, if present
/// * `secret` - The shared secret; `None` or blank disables verification
///
/// # Returns
///
/// `true` when verification is disabled or the signature matches,
/// `false` otherwise.
pub fn validate_signature(payload: &[u8], signature: Option<&str>, secret: Option<&str>) -> bool {
    let secret = match secret {
        Some(s) if is_signature_verification_enabled(Some(s)) => s,
        _ => return true,
    };

    let signature = match signature {
        Some(s) => s,
        None => {
            debug!("webhook_signature_missing");
            return false;
        }
    };

    let expected = match compute_digest(payload, secret) {
        Some(digest) => digest,
        None => return false,
    };

    let provided = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);

    let valid = constant_time_compare(&expected, provided);

    if !valid {
        debug!(
            expected_length = expected.len(),
            actual_length = provided.len(),
            "webhook_signature_mismatch"
        );
    }

    valid
}

/// Sign a payload the way a sender would, producing `sha256=<hex>`.
pub fn sign_payload(payload: &[u8], secret: &str) -> String {
    let digest = compute_digest(payload, secret).unwrap_or_default();
    format!("{}{}", SIGNATURE_PREFIX, digest)
}

/// Check if webhook signature verification is enabled for this secret.
pub fn is_signature_verification_enabled(secret: Option<&str>) -> bool {
    secret.map(|k| !k.trim().is_empty()).unwrap_or(false)
}

/// Lowercase hex HMAC-SHA256 of `payload` keyed by `secret`.
fn compute_digest(payload: &[u8], secret: &str) -> Option<String> {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("webhook_signature_invalid_key");
            return None;
        }
    };

    mac.update(payload);

    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
