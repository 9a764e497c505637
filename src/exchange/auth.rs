//! MEXC request signing.
//!
//! MEXC spot v3 uses the Binance-style scheme: the URL-encoded query string
//! (including `timestamp`) is signed with HMAC-SHA256 over the secret key and
//! the lowercase hex digest is appended as `signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute an HMAC-SHA256 signature and return it as a lowercase hex string.
pub fn hmac_sha256_sign(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Join parameters into a URL-encoded query string, in the given order.
pub fn build_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build a query string with `&signature=<hex>` appended.
pub fn build_signed_query(params: &[(&str, String)], secret: &str) -> String {
    let query = build_query(params);
    let signature = hmac_sha256_sign(secret, &query);
    format!("{query}&signature={signature}")
}
