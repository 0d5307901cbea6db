// crates/container-gate-core/src/identifier.rs
// ============================================================================
// Module: Identifier Resolver
// Description: Canonical container identifiers and path-segment resolution.
// Purpose: Map full IDs, short IDs, and names onto one 12-character key.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Container-scoped routes carry a caller-supplied reference in the segment
//! after the namespace prefix. That reference may be a container name, a full
//! 64-character ID, a 12-character short ID, or an arbitrary prefix. Resolution
//! always yields either a [`ContainerId`] or [`ResolvedId::Unresolved`]; an
//! unresolved reference is not an error and callers let it through.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Length of a canonical container identifier.
pub const CANONICAL_ID_LEN: usize = 12;

/// Length of a full container identifier.
pub const FULL_ID_LEN: usize = 64;

// ============================================================================
// SECTION: Container Identifier
// ============================================================================

/// Canonical 12-character container identifier.
///
/// # Invariants
/// - Always exactly [`CANONICAL_ID_LEN`] bytes of ASCII.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Canonicalizes a full or short identifier by taking its first 12 characters.
    ///
    /// Returns `None` when the input is shorter than 12 characters or not ASCII.
    #[must_use]
    pub fn canonicalize(raw: &str) -> Option<Self> {
        if !raw.is_ascii() {
            return None;
        }
        raw.get(..CANONICAL_ID_LEN).map(|prefix| Self(prefix.to_string()))
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of resolving a caller-supplied container reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedId {
    /// The reference maps to a canonical identifier.
    Canonical(ContainerId),
    /// The reference could not be confidently mapped; callers fail open.
    Unresolved,
}

impl ResolvedId {
    /// Returns the canonical identifier when resolved.
    #[must_use]
    pub const fn container_id(&self) -> Option<&ContainerId> {
        match self {
            Self::Canonical(id) => Some(id),
            Self::Unresolved => None,
        }
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Extracts the path segment following a namespace prefix.
///
/// Returns `None` when the path is outside the namespace or the segment is empty.
#[must_use]
pub fn extract_candidate<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    let segment = rest.split('/').next().unwrap_or_default();
    if segment.is_empty() { None } else { Some(segment) }
}

/// Resolves a candidate reference against known names and identifiers.
///
/// Order: exact name match, then full/short ID length rule, then a unique
/// prefix match over mapped and `known_ids` identifiers. Anything else is
/// unresolved.
#[must_use]
pub fn resolve<'a, I>(
    candidate: &str,
    names: &'a BTreeMap<ContainerId, String>,
    known_ids: I,
) -> ResolvedId
where
    I: IntoIterator<Item = &'a ContainerId>,
{
    if candidate.is_empty() {
        return ResolvedId::Unresolved;
    }
    if let Some((id, _)) = names.iter().find(|(_, name)| name.as_str() == candidate) {
        return ResolvedId::Canonical(id.clone());
    }
    if matches!(candidate.len(), FULL_ID_LEN | CANONICAL_ID_LEN) {
        return ContainerId::canonicalize(candidate)
            .map_or(ResolvedId::Unresolved, ResolvedId::Canonical);
    }
    resolve_prefix(candidate, names.keys().chain(known_ids))
}

/// Resolves an ambiguous short form by unique prefix match.
fn resolve_prefix<'a, I>(candidate: &str, ids: I) -> ResolvedId
where
    I: Iterator<Item = &'a ContainerId>,
{
    let Some(prefix) = truncate_ascii(candidate, CANONICAL_ID_LEN) else {
        return ResolvedId::Unresolved;
    };
    let matches: BTreeSet<&ContainerId> =
        ids.filter(|id| id.as_str().starts_with(prefix)).collect();
    let mut iter = matches.into_iter();
    match (iter.next(), iter.next()) {
        (Some(id), None) => ResolvedId::Canonical(id.clone()),
        _ => ResolvedId::Unresolved,
    }
}

/// Truncates ASCII text to at most `max` bytes.
fn truncate_ascii(text: &str, max: usize) -> Option<&str> {
    if !text.is_ascii() {
        return None;
    }
    Some(&text[..text.len().min(max)])
}
