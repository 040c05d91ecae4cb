//! API key comparison.

use sha2::{Digest, Sha256};

/// Compare a presented key with the configured one without leaking the
/// position of the first mismatch or the configured key's length.
#[must_use]
pub fn api_key_matches(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    constant_time_eq(&presented, &expected)
}

/// Constant-time byte comparison.
///
/// Returns `false` for inputs of different lengths.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b) {
        result |= x ^ y;
    }
    result == 0
}
