// crates/container-gate-docker/tests/docker_inventory.rs
// ============================================================================
// Module: Docker Inventory Tests
// Description: Inventory client tests against a fake Engine API socket.
// Purpose: Pin request shape, size limits, and failure mapping.
// Dependencies: container-gate-docker, container-gate-core, axum, tokio
// ============================================================================

//! Docker inventory client tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    reason = "Test-only panic-based assertions are permitted."
)]

mod common;

use axum::http::StatusCode;
use common::DaemonReply;
use common::FakeDaemon;
use container_gate_core::ContainerId;
use container_gate_core::ContainerInventory;
use container_gate_core::InventoryEntry;
use container_gate_core::InventoryError;
use container_gate_core::InventorySnapshot;
use container_gate_core::OwnershipStore;
use container_gate_docker::DEFAULT_MAX_RESPONSE_BYTES;
use container_gate_docker::DockerInventory;

const WEB_ID: &str = "f760a15e19af19f97e52ead30d4cb5f8c906e601bab8cb63ccc071857df44b75";
const DB_ID: &str = "0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f9a0b1c";

fn listing() -> String {
    format!(
        r#"[{{"Id":"{WEB_ID}","Names":["/web"],"State":"running"}},
            {{"Id":"{DB_ID}","Names":["/db"],"State":"exited"}}]"#
    )
}

#[tokio::test]
async fn lists_running_and_stopped_containers() {
    let daemon = FakeDaemon::start(DaemonReply::ok(listing())).await;
    let inventory = DockerInventory::new(&daemon.socket_path, DEFAULT_MAX_RESPONSE_BYTES);

    let entries = inventory.list_containers().await.unwrap();

    assert_eq!(entries, vec![InventoryEntry::new(WEB_ID, "/web"), InventoryEntry::new(DB_ID, "/db")]);
    assert_eq!(daemon.queries(), vec![Some("all=1".to_string())]);
}

#[tokio::test]
async fn each_fetch_reflects_the_current_daemon_state() {
    let daemon = FakeDaemon::start(DaemonReply::ok(listing())).await;
    let inventory = DockerInventory::new(&daemon.socket_path, DEFAULT_MAX_RESPONSE_BYTES);
    assert_eq!(inventory.list_containers().await.unwrap().len(), 2);

    daemon.set_reply(DaemonReply::ok("[]"));

    assert!(inventory.list_containers().await.unwrap().is_empty());
    assert_eq!(daemon.queries().len(), 2);
}

#[tokio::test]
async fn fetched_inventory_drives_reconciliation() {
    let daemon = FakeDaemon::start(DaemonReply::ok(listing())).await;
    let inventory = DockerInventory::new(&daemon.socket_path, DEFAULT_MAX_RESPONSE_BYTES);
    let store = OwnershipStore::new();

    let snapshot = InventorySnapshot::from_entries(inventory.list_containers().await.unwrap());
    let summary = store.reconcile(&snapshot).unwrap();

    assert_eq!(summary.added, 2);
    assert_eq!(summary.pruned, 0);
    let resolved = store.resolve("web").unwrap();
    assert_eq!(resolved.container_id().map(ContainerId::as_str), Some(&WEB_ID[..12]));
}

#[tokio::test]
async fn missing_socket_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = DockerInventory::new(dir.path().join("absent.sock"), DEFAULT_MAX_RESPONSE_BYTES);

    let err = inventory.list_containers().await.unwrap_err();

    assert!(matches!(err, InventoryError::Unreachable(_)), "unexpected error: {err}");
}

#[tokio::test]
async fn oversized_response_is_rejected() {
    let daemon = FakeDaemon::start(DaemonReply::ok(listing())).await;
    let inventory = DockerInventory::new(&daemon.socket_path, 16);

    let err = inventory.list_containers().await.unwrap_err();

    match err {
        InventoryError::InvalidResponse(message) => assert!(message.contains("size limit")),
        InventoryError::Unreachable(message) => panic!("unexpected unreachable: {message}"),
    }
}

#[tokio::test]
async fn daemon_error_status_is_invalid_response() {
    let daemon = FakeDaemon::start(DaemonReply::status(StatusCode::INTERNAL_SERVER_ERROR)).await;
    let inventory = DockerInventory::new(&daemon.socket_path, DEFAULT_MAX_RESPONSE_BYTES);

    let err = inventory.list_containers().await.unwrap_err();

    match err {
        InventoryError::InvalidResponse(message) => assert!(message.contains("500")),
        InventoryError::Unreachable(message) => panic!("unexpected unreachable: {message}"),
    }
}

#[tokio::test]
async fn malformed_listing_is_invalid_response() {
    let daemon = FakeDaemon::start(DaemonReply::ok("not json")).await;
    let inventory = DockerInventory::new(&daemon.socket_path, DEFAULT_MAX_RESPONSE_BYTES);

    let err = inventory.list_containers().await.unwrap_err();

    assert!(matches!(err, InventoryError::InvalidResponse(_)));
}
