//! HMAC primitives and query canonicalization shared by the venue signers.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

// HMAC accepts keys of any length; the error arm is unreachable.
fn hmac_sha256(secret: &str, message: &str) -> Vec<u8> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map(|mut mac| {
            mac.update(message.as_bytes());
            mac.finalize().into_bytes().to_vec()
        })
        .unwrap_or_default()
}

/// Lowercase hex HMAC-SHA256 (Binance).
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    hex::encode(hmac_sha256(secret, message))
}

/// Base64 HMAC-SHA256 (Bitget, OKX).
#[must_use]
pub fn hmac_sha256_base64(secret: &str, message: &str) -> String {
    BASE64.encode(hmac_sha256(secret, message))
}

/// Lowercase hex HMAC-SHA512 (Gate).
#[must_use]
pub fn hmac_sha512_hex(secret: &str, message: &str) -> String {
    HmacSha512::new_from_slice(secret.as_bytes())
        .map(|mut mac| {
            mac.update(message.as_bytes());
            hex::encode(mac.finalize().into_bytes())
        })
        .unwrap_or_default()
}

/// Lowercase hex SHA-512 digest.
#[must_use]
pub fn sha512_hex(data: &str) -> String {
    hex::encode(Sha512::digest(data.as_bytes()))
}

/// Ordered query parameters.
pub type Params = Vec<(String, String)>;

/// Url-encode `params` in the given order.
#[must_use]
pub fn encode_query(params: &[(String, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Url-encode `params` sorted by key.
#[must_use]
pub fn encode_sorted_query(params: &[(String, String)]) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    encode_query(&sorted)
}

/// Build a parameter list from borrowed pairs.
#[must_use]
pub fn params<K: ToString, V: ToString>(pairs: &[(K, V)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
