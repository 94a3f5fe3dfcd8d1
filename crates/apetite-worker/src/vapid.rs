//! VAPID application server key codec.
//!
//! Push subscriptions carry the application server key as base64url text.
//! The platform wants raw bytes, so the key is normalized to the standard
//! alphabet, padded, and decoded here.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::error::{Error, Result};

/// Decode a base64url application server key to raw bytes.
///
/// Accepts unpadded input: `-` and `_` are mapped to the standard alphabet
/// and `=` padding is restored to a multiple of four before decoding.
///
/// # Errors
///
/// Returns an error if the key is empty or is not valid base64.
pub fn decode_server_key(key: &str) -> Result<Vec<u8>> {
    if key.is_empty() {
        return Err(Error::server_key("key is empty"));
    }

    let pad_len = (4 - key.len() % 4) % 4;
    let mut normalized = String::with_capacity(key.len() + pad_len);
    for ch in key.chars() {
        normalized.push(match ch {
            '-' => '+',
            '_' => '/',
            other => other,
        });
    }
    for _ in 0..pad_len {
        normalized.push('=');
    }

    STANDARD
        .decode(&normalized)
        .map_err(|err| Error::server_key(err.to_string()))
}

/// Encode raw key bytes as unpadded base64url.
#[must_use]
pub fn encode_server_key(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}
