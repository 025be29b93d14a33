use axum::http::HeaderMap;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Check a LINE webhook signature: base64(HMAC-SHA256(secret, raw body)).
///
/// The MAC covers the bytes exactly as received. A missing or blank secret
/// never verifies.
pub fn verify_signature(secret: Option<&str>, raw_body: &[u8], provided: &str) -> bool {
    let Some(secret) = secret.filter(|value| !value.trim().is_empty()) else {
        return false;
    };
    let provided = provided.trim();
    if provided.is_empty() {
        return false;
    }
    let Ok(provided) = base64::engine::general_purpose::STANDARD.decode(provided) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&provided).is_ok()
}

pub fn sign_body(secret: &str, raw_body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(raw_body);
    Some(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

pub(crate) fn verify_line_request(
    secret: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), &'static str> {
    if secret.map_or(true, |value| value.trim().is_empty()) {
        return Err("signing_secret_not_configured");
    }
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or("missing_signature")?;
    if !verify_signature(secret, body, signature) {
        return Err("invalid_signature");
    }
    Ok(())
}
