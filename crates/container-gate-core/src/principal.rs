// crates/container-gate-core/src/principal.rs
// ============================================================================
// Module: Caller Principals
// Description: Token fingerprints and the admin bypass capability.
// Purpose: Perform the admin check identically at every decision point.
// Dependencies: crate::hashing, serde
// ============================================================================

//! ## Overview
//! A caller is identified by the SHA-256 fingerprint of the opaque token it
//! sends in the agreed header. The admin secret is reduced to a digest when the
//! [`AdminPrincipal`] is built and the plaintext is dropped; every admin check
//! hashes the request token and compares digests in constant time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

use crate::hashing::constant_time_eq;
use crate::hashing::sha256;
use crate::hashing::sha256_hex;

// ============================================================================
// SECTION: Token Fingerprint
// ============================================================================

/// SHA-256 fingerprint of a caller token, lowercase hex.
///
/// # Invariants
/// - Always 64 hex characters; never holds the plaintext token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TokenFingerprint(String);

impl TokenFingerprint {
    /// Fingerprints a plaintext caller token.
    #[must_use]
    pub fn of(token: &str) -> Self {
        Self(sha256_hex(token.as_bytes()))
    }

    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares two fingerprints in constant time.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        constant_time_eq(self.0.as_bytes(), other.0.as_bytes())
    }
}

impl fmt::Display for TokenFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Admin Principal
// ============================================================================

/// Admin bypass capability derived from the shared admin secret.
///
/// # Invariants
/// - Only the digest of the secret is retained.
/// - An empty secret never matches any caller.
#[derive(Clone)]
pub struct AdminPrincipal {
    /// SHA-256 digest of the admin secret, `None` when disabled.
    digest: Option<[u8; 32]>,
}

impl AdminPrincipal {
    /// Builds the principal from the plaintext admin secret.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        if secret.is_empty() {
            return Self::disabled();
        }
        Self {
            digest: Some(sha256(secret.as_bytes())),
        }
    }

    /// Builds a principal that never grants admin rights.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            digest: None,
        }
    }

    /// Returns true when an admin secret is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.digest.is_some()
    }

    /// Returns true when the presented caller token is the admin secret.
    #[must_use]
    pub fn is_admin(&self, token: Option<&str>) -> bool {
        match (self.digest.as_ref(), token) {
            (Some(expected), Some(token)) if !token.is_empty() => {
                constant_time_eq(expected, &sha256(token.as_bytes()))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for AdminPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminPrincipal").field("enabled", &self.is_enabled()).finish()
    }
}
