// crates/container-gate-cli/src/lib.rs
// ============================================================================
// Module: Container Gate CLI Library
// Description: Shared helpers for the Container Gate command-line interface.
// Purpose: Assemble the admission gate from configuration for the binary and tests.
// Dependencies: crate::{bootstrap, policy_check}
// ============================================================================

//! ## Overview
//! The binary entry point (`src/main.rs`) parses arguments and prints results;
//! everything it wires together lives here so it can be exercised without
//! spawning a process.
//!
//! Security posture: CLI inputs are untrusted and are size-bounded before use.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bootstrap;
pub mod policy_check;
