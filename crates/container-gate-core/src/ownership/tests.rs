// crates/container-gate-core/src/ownership/tests.rs
// ============================================================================
// Module: Ownership Store Tests
// Description: Unit tests for first-touch binding and reconciliation pruning.
// Purpose: Ensure ownership is bound once and dropped with the container.
// Dependencies: container-gate-core
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use super::InventorySnapshot;
use super::OwnershipDecision;
use super::OwnershipStore;
use crate::identifier::ContainerId;
use crate::identifier::ResolvedId;
use crate::interfaces::InventoryEntry;
use crate::principal::TokenFingerprint;

const FULL_ID: &str = "f760a15e19af19f97e52ead30d4cb5f8c906e601bab8cb63ccc071857df44b75";

fn canonical(raw: &str) -> ResolvedId {
    ResolvedId::Canonical(ContainerId::canonicalize(raw).expect("canonical id"))
}

fn snapshot(entries: &[(&str, &str)]) -> InventorySnapshot {
    InventorySnapshot::from_entries(
        entries.iter().map(|(id, name)| InventoryEntry::new(*id, *name)),
    )
}

#[test]
fn snapshot_normalizes_names_and_skips_short_ids() {
    let snap = snapshot(&[(FULL_ID, "/test_container"), ("abc", "/tiny")]);
    assert_eq!(snap.len(), 1);
    let store = OwnershipStore::new();
    store.reconcile(&snap).unwrap();
    assert_eq!(store.resolve("test_container").unwrap(), canonical(FULL_ID));
    assert_eq!(store.resolve("/test_container").unwrap(), ResolvedId::Unresolved);
}

#[test]
fn first_touch_binds_and_later_callers_are_denied() {
    let store = OwnershipStore::new();
    let alice = TokenFingerprint::of("alice");
    let mallory = TokenFingerprint::of("mallory");
    let id = canonical(FULL_ID);

    assert_eq!(store.authorize(&id, &alice, false).unwrap(), OwnershipDecision::Bound);
    assert_eq!(store.authorize(&id, &alice, false).unwrap(), OwnershipDecision::Owner);
    assert_eq!(store.authorize(&id, &mallory, false).unwrap(), OwnershipDecision::NotOwner);
    assert_eq!(store.authorize(&id, &mallory, true).unwrap(), OwnershipDecision::AdminOverride);
    let owner = store.owner_of(id.container_id().unwrap()).unwrap().unwrap();
    assert!(owner.matches(&alice));
}

#[test]
fn unresolved_identifiers_pass_through_without_binding() {
    let store = OwnershipStore::new();
    let decision =
        store.authorize(&ResolvedId::Unresolved, &TokenFingerprint::of("alice"), false).unwrap();
    assert_eq!(decision, OwnershipDecision::UnresolvedPassThrough);
    assert!(decision.is_allowed());
    assert_eq!(store.owned_count().unwrap(), 0);
}

#[test]
fn authorize_existing_never_binds() {
    let store = OwnershipStore::new();
    let alice = TokenFingerprint::of("alice");
    let id = canonical("0123456789ab");
    assert_eq!(store.authorize_existing(&id, &alice, false).unwrap(), None);
    assert_eq!(store.owned_count().unwrap(), 0);
    store.authorize(&id, &alice, false).unwrap();
    assert_eq!(
        store.authorize_existing(&id, &TokenFingerprint::of("bob"), false).unwrap(),
        Some(OwnershipDecision::NotOwner)
    );
}

#[test]
fn reconcile_prunes_owner_and_name_for_vanished_containers() {
    let store = OwnershipStore::new();
    let alice = TokenFingerprint::of("alice");
    let bob = TokenFingerprint::of("bob");
    let id = canonical(FULL_ID);

    let summary = store.reconcile(&snapshot(&[(FULL_ID, "/test_container")])).unwrap();
    assert_eq!(summary.added, 1);
    store.authorize(&id, &alice, false).unwrap();

    let summary = store.reconcile(&snapshot(&[])).unwrap();
    assert_eq!(summary.pruned, 1);
    assert_eq!(store.owned_count().unwrap(), 0);
    assert_eq!(store.resolve("test_container").unwrap(), ResolvedId::Unresolved);

    assert_eq!(store.authorize(&id, &bob, false).unwrap(), OwnershipDecision::Bound);
}

#[test]
fn reconcile_prunes_owned_ids_never_seen_in_inventory() {
    let store = OwnershipStore::new();
    store.authorize(&canonical("aaaaaaaaaaaa"), &TokenFingerprint::of("alice"), false).unwrap();
    let summary = store.reconcile(&snapshot(&[(FULL_ID, "web")])).unwrap();
    assert_eq!(summary, super::ReconcileSummary {
        added: 1,
        pruned: 1,
    });
    assert_eq!(store.owned_count().unwrap(), 0);
}

#[test]
fn reconcile_refreshes_renamed_containers() {
    let store = OwnershipStore::new();
    store.reconcile(&snapshot(&[(FULL_ID, "/old")])).unwrap();
    store.reconcile(&snapshot(&[(FULL_ID, "/new")])).unwrap();
    assert_eq!(store.resolve("new").unwrap(), canonical(FULL_ID));
    assert_eq!(store.resolve("old").unwrap(), ResolvedId::Unresolved);
}

#[test]
fn concurrent_first_touch_has_exactly_one_winner() {
    let store = Arc::new(OwnershipStore::new());
    let id = canonical(FULL_ID);
    let callers = 16;
    let barrier = Arc::new(Barrier::new(callers));
    let handles: Vec<_> = (0..callers)
        .map(|idx| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let id = id.clone();
            thread::spawn(move || {
                let token = TokenFingerprint::of(&format!("caller-{idx}"));
                barrier.wait();
                store.authorize(&id, &token, false).unwrap()
            })
        })
        .collect();
    let decisions: Vec<OwnershipDecision> =
        handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    let bound = decisions.iter().filter(|d| **d == OwnershipDecision::Bound).count();
    let denied = decisions.iter().filter(|d| **d == OwnershipDecision::NotOwner).count();
    assert_eq!(bound, 1);
    assert_eq!(denied, callers - 1);
}
