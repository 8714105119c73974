//! Request key generation.

use sha2::{Digest, Sha256};

/// Compute the store key for a request descriptor.
///
/// The key covers method and canonical URL; `Vary`-selected headers are
/// checked separately at match time.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
