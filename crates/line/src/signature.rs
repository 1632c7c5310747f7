use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Base64-encoded HMAC-SHA256 of the body under the channel secret,
/// the value LINE sends in the `x-line-signature` header (no prefix).
pub fn sign_body(body: &[u8], channel_secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Verify the platform signature against the exact raw body bytes.
/// Must run before any JSON parsing; re-serialization changes byte layout
/// and breaks the comparison. The digest compare is constant-time.
pub fn verify_signature(body: &[u8], signature_header: &str, channel_secret: &str) -> bool {
    let Ok(provided) = STANDARD.decode(signature_header.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}
