//! Content hashing for lockfile integrity pins.

use sha2::{Digest, Sha256};

/// SHA-256 of a downloaded artifact, as lowercase hex.
///
/// This is the exact form every integrity field in `zargo.lock` carries, so
/// pins can be compared and re-emitted without normalization.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compare a pinned digest against a freshly computed one.
///
/// Manifest-supplied pins are user input and may be uppercase; lockfile pins
/// are always lowercase. Comparison ignores case so both forms verify.
pub fn digest_eq(expected: &str, actual: &str) -> bool {
    expected.eq_ignore_ascii_case(actual)
}
