// crates/container-gate-plugin/src/lib.rs
// ============================================================================
// Module: Container Gate Plugin Library
// Description: Docker authorization plugin transport for the admission engine.
// Purpose: Expose the plugin wire types and the Unix-socket server.
// Dependencies: crate::{protocol, server}
// ============================================================================

//! ## Overview
//! The runtime consults an authorization plugin over HTTP on a Unix socket.
//! [`protocol`] holds the wire payloads and their boundary decoding;
//! [`server`] routes the plugin endpoints to an
//! [`container_gate_core::AdmissionGate`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod protocol;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use protocol::AUTHZ_CAPABILITY;
pub use protocol::ActivateResponse;
pub use protocol::AuthZRequest;
pub use protocol::AuthZResponse;
pub use protocol::ProtocolError;
pub use protocol::decode_request_uri;
pub use server::ACTIVATE_PATH;
pub use server::AUTHZ_REQUEST_PATH;
pub use server::AUTHZ_RESPONSE_PATH;
pub use server::PluginServer;
pub use server::PluginServerError;
