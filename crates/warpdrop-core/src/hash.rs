//! Content digests and integrity verification.
//!
//! The sender computes a SHA-256 digest over the full file content
//! once, before the first chunk goes out; the receiver computes it
//! once more after reassembly and compares. Digests are never taken
//! per chunk or incrementally, so a digest always describes a whole
//! payload.
//!
//! Digests travel as lowercase hex strings (64 characters).

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of `data` as a lowercase hex string.
///
/// The result is always exactly 64 characters.
#[must_use]
pub fn digest(data: &[u8]) -> String {
    use std::fmt::Write;

    let mut hasher = Sha256::new();
    hasher.update(data);
    let bytes = hasher.finalize();

    let mut hex = String::with_capacity(64);
    for byte in bytes {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Verify a computed digest against the expected one.
///
/// Exact string equality; both sides produce canonical lowercase hex.
#[must_use]
pub fn verify(computed: &str, expected: &str) -> bool {
    computed == expected
}

/// Format a digest for display: first 8 and last 8 characters joined
/// by an ellipsis. Inputs shorter than 16 characters are returned
/// unchanged.
#[must_use]
pub fn preview(digest: &str) -> String {
    if digest.chars().count() < 16 {
        return digest.to_string();
    }

    let head: String = digest.chars().take(8).collect();
    let tail: String = digest
        .chars()
        .skip(digest.chars().count() - 8)
        .collect();
    format!("{head}...{tail}")
}
