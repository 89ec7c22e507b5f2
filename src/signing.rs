//! HMAC-signed, time-bounded media access tokens.
//!
//! A token is the pair of query parameters `exp` (unix seconds) and `sig`,
//! where `sig = base64url(HMAC-SHA256(secret, "{key}:{exp}"))` with padding
//! stripped. Tokens are stateless: anyone holding the secret can mint one,
//! and a token stays valid until `exp` passes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A media object key, normalized and validated at the boundary.
///
/// Normalization trims whitespace and surrounding slashes; after that the key
/// must be non-empty with no `..` and no empty path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaKey(String);

impl MediaKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().trim_matches('/');
        if normalized.is_empty() {
            return None;
        }
        if normalized
            .split('/')
            .any(|seg| seg.is_empty() || seg == "..")
        {
            return None;
        }
        Some(MediaKey(normalized.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MediaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn mac_for(key: &str, exp: i64, secret: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{key}:{exp}").as_bytes());
    mac
}

/// Compute the unpadded base64url signature for `key` expiring at `exp`.
pub fn sign(key: &MediaKey, exp: i64, secret: &str) -> String {
    let mac = mac_for(key.as_str(), exp, secret);
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Issue a token for `key` valid for `ttl_secs` from `now`.
pub fn issue(key: &MediaKey, secret: &str, now: i64, ttl_secs: i64) -> (i64, String) {
    let exp = now + ttl_secs;
    let sig = sign(key, exp, secret);
    (exp, sig)
}

/// Verify a token against the shared secret.
///
/// The MAC comparison is constant-time (`Mac::verify_slice`); an expired
/// `exp`, an undecodable `sig`, or a MAC mismatch all return `false`.
pub fn verify(key: &MediaKey, exp: i64, sig: &str, secret: &str, now: i64) -> bool {
    if now > exp {
        return false;
    }
    let sig_bytes = match URL_SAFE_NO_PAD.decode(sig) {
        Ok(b) => b,
        Err(_) => return false,
    };
    mac_for(key.as_str(), exp, secret)
        .verify_slice(&sig_bytes)
        .is_ok()
}
