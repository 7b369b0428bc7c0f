//! Webflow webhook signature verification.
//!
//! Webflow signs webhook requests with HMAC-SHA256 over the raw request body
//! and sends the lowercase hex digest in `X-Webflow-Signature`. Several
//! secrets may be configured at once so a secret can be rotated without a
//! window where legitimate webhooks are rejected.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC digest.
pub const SIGNATURE_HEADER: &str = "x-webflow-signature";

/// Verify a webhook body against every accepted secret.
///
/// # Arguments
///
/// * `raw_body` - The request body exactly as sent, before any JSON decoding
/// * `signature` - The value of the `X-Webflow-Signature` header
/// * `secrets` - Accepted signing secrets, in any order
///
/// # Returns
///
/// `true` as soon as one secret produces a matching digest, `false` otherwise.
/// Never errors: anything unexpected counts as a failed verification.
pub fn verify_webhook_signature(raw_body: &[u8], signature: &str, secrets: &[String]) -> bool {
    if raw_body.is_empty() || signature.is_empty() || secrets.is_empty() {
        debug!(
            has_body = !raw_body.is_empty(),
            has_signature = !signature.is_empty(),
            secret_count = secrets.len(),
            "webhook_signature_missing_fields"
        );
        return false;
    }

    for (index, secret) in secrets.iter().enumerate() {
        if secret.is_empty() {
            continue;
        }

        let expected = match sign(raw_body, secret) {
            Some(digest) => digest,
            None => {
                warn!(secret_index = index, "webhook_signature_invalid_key");
                continue;
            }
        };

        if constant_time_compare(&expected, signature) {
            debug!(secret_index = index, "webhook_signature_verified");
            return true;
        }
    }

    warn!(
        actual_length = signature.len(),
        secret_count = secrets.len(),
        "webhook_signature_mismatch"
    );

    false
}

/// Compute the lowercase hex HMAC-SHA256 digest of `body` under `secret`.
fn sign(body: &[u8], secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
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

/// Recover the bytes that were actually signed.
///
/// Some gateways forward binary bodies base64-encoded. A body that fails to
/// decode becomes empty, which can never verify.
pub fn decode_raw_body(body: &[u8], base64_encoded: bool) -> Vec<u8> {
    if !base64_encoded {
        return body.to_vec();
    }

    let trimmed = body.trim_ascii();
    match STANDARD.decode(trimmed) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, body_length = body.len(), "webhook_body_base64_invalid");
            Vec::new()
        }
    }
}
