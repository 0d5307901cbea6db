// crates/container-gate-core/src/ownership.rs
// ============================================================================
// Module: Ownership Store & Reconciler
// Description: First-touch container ownership with inventory reconciliation.
// Purpose: Bind each container to the first caller that references it.
// Dependencies: crate::identifier, crate::interfaces, crate::principal, thiserror
// ============================================================================

//! ## Overview
//! The store keeps two maps keyed by canonical container identifier: the
//! owner fingerprint and the display name. Both live behind a single mutex so
//! that reconciliation, resolution, and first-touch binding are each atomic
//! with respect to one another. The raw maps are never exposed.
//!
//! Ownership is fixed at first touch and only disappears when reconciliation
//! observes that the container is gone from the runtime inventory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::btree_map::Entry;
use std::sync::Mutex;
use std::sync::MutexGuard;

use thiserror::Error;

use crate::identifier::ContainerId;
use crate::identifier::ResolvedId;
use crate::identifier::resolve;
use crate::interfaces::InventoryEntry;
use crate::principal::TokenFingerprint;

// ============================================================================
// SECTION: Inventory Snapshot
// ============================================================================

/// Ground-truth set of existing containers, keyed by canonical identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    /// Canonical identifier to normalized display name.
    containers: BTreeMap<ContainerId, String>,
}

impl InventorySnapshot {
    /// Builds a snapshot from raw inventory entries.
    ///
    /// Entries whose identifier is shorter than a canonical identifier are
    /// skipped. A single leading `/` is stripped from each name.
    #[must_use]
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = InventoryEntry>,
    {
        let containers = entries
            .into_iter()
            .filter_map(|entry| {
                let id = ContainerId::canonicalize(&entry.id)?;
                let name = entry.name.strip_prefix('/').unwrap_or(&entry.name).to_string();
                Some((id, name))
            })
            .collect();
        Self {
            containers,
        }
    }

    /// Returns the number of containers in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Returns true when the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Returns true when the snapshot contains the identifier.
    #[must_use]
    pub fn contains(&self, id: &ContainerId) -> bool {
        self.containers.contains_key(id)
    }
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Ownership check outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipDecision {
    /// Reference was unresolved; allowed without a check.
    UnresolvedPassThrough,
    /// The container was unowned and is now bound to the requester.
    Bound,
    /// The requester owns the container.
    Owner,
    /// The requester is the admin principal.
    AdminOverride,
    /// Another caller owns the container.
    NotOwner,
}

impl OwnershipDecision {
    /// Returns true when the decision allows the request.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        !matches!(self, Self::NotOwner)
    }
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Identifiers newly added to the name mapping.
    pub added: usize,
    /// Identifiers pruned from the mapping and ownership records.
    pub pruned: usize,
}

/// Ownership store errors.
#[derive(Debug, Error)]
pub enum OwnershipError {
    /// The store lock was poisoned by a panicking holder.
    #[error("ownership store unavailable: {0}")]
    Unavailable(String),
}

/// Mutable state guarded by the store mutex.
#[derive(Debug, Default)]
struct OwnershipState {
    /// Canonical identifier to owner fingerprint.
    owners: BTreeMap<ContainerId, TokenFingerprint>,
    /// Canonical identifier to display name.
    names: BTreeMap<ContainerId, String>,
}

// ============================================================================
// SECTION: Ownership Store
// ============================================================================

/// Process-wide ownership and name mapping store.
#[derive(Debug, Default)]
pub struct OwnershipStore {
    /// Owner and name maps behind one lock.
    state: Mutex<OwnershipState>,
}

impl OwnershipStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an inventory snapshot: adds new identifiers, refreshes names,
    /// and prunes names and owners for identifiers that no longer exist.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError`] when the store lock is poisoned.
    pub fn reconcile(
        &self,
        snapshot: &InventorySnapshot,
    ) -> Result<ReconcileSummary, OwnershipError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let mut summary = ReconcileSummary::default();
        for (id, name) in &snapshot.containers {
            if state.names.insert(id.clone(), name.clone()).is_none() {
                summary.added += 1;
            }
        }
        let stale: BTreeSet<ContainerId> = state
            .names
            .keys()
            .chain(state.owners.keys())
            .filter(|id| !snapshot.contains(id))
            .cloned()
            .collect();
        for id in &stale {
            state.names.remove(id);
            state.owners.remove(id);
        }
        summary.pruned = stale.len();
        Ok(summary)
    }

    /// Resolves a caller-supplied container reference.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError`] when the store lock is poisoned.
    pub fn resolve(&self, candidate: &str) -> Result<ResolvedId, OwnershipError> {
        let guard = self.lock()?;
        Ok(resolve(candidate, &guard.names, guard.owners.keys()))
    }

    /// Authorizes a requester, binding unowned containers on first touch.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError`] when the store lock is poisoned.
    pub fn authorize(
        &self,
        id: &ResolvedId,
        requester: &TokenFingerprint,
        is_admin: bool,
    ) -> Result<OwnershipDecision, OwnershipError> {
        let ResolvedId::Canonical(id) = id else {
            return Ok(OwnershipDecision::UnresolvedPassThrough);
        };
        let mut guard = self.lock()?;
        match guard.owners.entry(id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(requester.clone());
                Ok(OwnershipDecision::Bound)
            }
            Entry::Occupied(slot) => Ok(compare_owner(slot.get(), requester, is_admin)),
        }
    }

    /// Authorizes a requester against an existing record without binding.
    ///
    /// Returns `None` when the identifier is unresolved or has no owner.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError`] when the store lock is poisoned.
    pub fn authorize_existing(
        &self,
        id: &ResolvedId,
        requester: &TokenFingerprint,
        is_admin: bool,
    ) -> Result<Option<OwnershipDecision>, OwnershipError> {
        let ResolvedId::Canonical(id) = id else {
            return Ok(None);
        };
        let guard = self.lock()?;
        Ok(guard.owners.get(id).map(|owner| compare_owner(owner, requester, is_admin)))
    }

    /// Returns the owner fingerprint recorded for an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError`] when the store lock is poisoned.
    pub fn owner_of(&self, id: &ContainerId) -> Result<Option<TokenFingerprint>, OwnershipError> {
        Ok(self.lock()?.owners.get(id).cloned())
    }

    /// Returns the number of ownership records.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError`] when the store lock is poisoned.
    pub fn owned_count(&self) -> Result<usize, OwnershipError> {
        Ok(self.lock()?.owners.len())
    }

    /// Acquires the store lock.
    fn lock(&self) -> Result<MutexGuard<'_, OwnershipState>, OwnershipError> {
        self.state
            .lock()
            .map_err(|_| OwnershipError::Unavailable("ownership store mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Compares a stored owner against the requester.
fn compare_owner(
    owner: &TokenFingerprint,
    requester: &TokenFingerprint,
    is_admin: bool,
) -> OwnershipDecision {
    if owner.matches(requester) {
        OwnershipDecision::Owner
    } else if is_admin {
        OwnershipDecision::AdminOverride
    } else {
        OwnershipDecision::NotOwner
    }
}

#[cfg(test)]
mod tests;
