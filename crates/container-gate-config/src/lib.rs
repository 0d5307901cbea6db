// crates/container-gate-config/src/lib.rs
// ============================================================================
// Module: Container Gate Config Library
// Description: Canonical config model, validation, and admin secret loading.
// Purpose: Single source of truth for container-gate.toml semantics.
// Dependencies: container-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! `container-gate-config` defines the configuration model for the Container
//! Gate plugin. Validation is strict and fail-closed: a config that loads is
//! safe to turn into a route table, gate settings, and an admin principal.
//!
//! Security posture: config inputs are untrusted; the admin secret is read
//! once at startup and reduced to a digest immediately.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
