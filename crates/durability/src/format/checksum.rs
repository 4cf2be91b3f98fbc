//! SHA-256 stamped-zero checksum convention.
//!
//! For any structure whose serialization ends with a 32-byte trailing
//! checksum, the stored value is `SHA-256(body_bytes || zero32)`. Every
//! caller (header page, footer, TOC, commit-marker) goes through
//! `stamped_checksum`/`verify_stamped` instead of re-deriving the rule.

use sha2::{Digest, Sha256};

const ZERO32: [u8; 32] = [0u8; 32];

/// Compute `SHA-256(body || zero32)`.
pub fn stamped_checksum(body: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hasher.update(ZERO32);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Recompute the stamped-zero checksum over `body` and compare to `expected`.
pub fn verify_stamped(body: &[u8], expected: &[u8; 32]) -> bool {
    &stamped_checksum(body) == expected
}

/// Plain SHA-256 over a byte slice (used for canonical/stored content checksums,
/// which do not use the stamped-zero convention — there is no trailing
/// checksum region within the hashed bytes themselves).
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}
