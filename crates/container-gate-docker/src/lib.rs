// crates/container-gate-docker/src/lib.rs
// ============================================================================
// Module: Container Gate Docker Library
// Description: Docker Engine API adapters for the admission engine.
// Purpose: Provide the live container inventory used for reconciliation.
// Dependencies: crate::inventory
// ============================================================================

//! ## Overview
//! This crate implements [`container_gate_core::ContainerInventory`] against
//! the Docker Engine API served on a local Unix socket. It is the only crate
//! in the workspace that speaks to the runtime directly.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod inventory;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use inventory::CONTAINER_LIST_PATH;
pub use inventory::DEFAULT_MAX_RESPONSE_BYTES;
pub use inventory::DockerInventory;
pub use inventory::parse_container_list;
