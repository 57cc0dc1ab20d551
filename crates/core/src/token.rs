// SPDX-License-Identifier: MIT

//! Bearer token generation and hashing.
//!
//! Only the hash is ever persisted; the plaintext token is handed to the
//! agent once, at registration or rotation, and never stored server-side.

use sha2::{Digest, Sha256};

/// Generate a fresh high-entropy bearer token.
pub fn generate_token() -> String {
    nanoid::nanoid!(43)
}

/// Generate a short, url-safe single-use registration code.
pub fn generate_registration_code() -> String {
    nanoid::nanoid!(12)
}

/// Hash a bearer token for persistence/comparison. Never log or persist the
/// plaintext input to this function.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
