// crates/container-gate-core/src/hashing.rs
// ============================================================================
// Module: Container Gate Hashing
// Description: SHA-256 digests and constant-time comparison for token material.
// Purpose: Keep caller tokens and the admin secret out of comparable plaintext.
// Dependencies: sha2, subtle
// ============================================================================

//! ## Overview
//! Caller tokens are only ever handled as SHA-256 digests once they cross the
//! gate boundary. Digests are rendered as lowercase hex so they can double as
//! stable audit fingerprints. Comparisons between digests run in constant time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Hashes raw bytes with SHA-256 and returns the raw digest.
#[must_use]
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Hashes raw bytes with SHA-256 and returns a lowercase hex digest.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex_encode(&sha256(bytes))
}

// ============================================================================
// SECTION: Constant-Time Comparisons
// ============================================================================

/// Compares two byte slices in constant time.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}
