// crates/container-gate-plugin/src/protocol.rs
// ============================================================================
// Module: Authorization Plugin Protocol
// Description: Wire payloads exchanged with the container runtime.
// Purpose: Decode plugin requests at the boundary into admission requests.
// Dependencies: base64, percent-encoding, serde, container-gate-core
// ============================================================================

//! ## Overview
//! The runtime posts JSON payloads with Go-style capitalized field names. The
//! request URI arrives percent-encoded and the body arrives base64-encoded;
//! both are decoded here so the admission engine only sees plain values.
//!
//! Security posture: payloads are untrusted. A URI that cannot be decoded is
//! replaced by an empty URI, which the engine denies as malformed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use container_gate_core::AdmissionRequest;
use container_gate_core::Decision;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Plugin capability advertised on activation.
pub const AUTHZ_CAPABILITY: &str = "authz";

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Plugin activation reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateResponse {
    /// Implemented plugin subsystems.
    #[serde(rename = "Implements")]
    pub implements: Vec<String>,
}

impl ActivateResponse {
    /// Activation reply for an authorization plugin.
    #[must_use]
    pub fn authz() -> Self {
        Self {
            implements: vec![AUTHZ_CAPABILITY.to_string()],
        }
    }
}

/// Authorization request forwarded by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthZRequest {
    /// Authenticated runtime user, empty without TLS client auth.
    #[serde(rename = "User", default)]
    pub user: String,
    /// HTTP method of the API call.
    #[serde(rename = "RequestMethod", default)]
    pub request_method: String,
    /// Percent-encoded request URI.
    #[serde(rename = "RequestURI", default)]
    pub request_uri: String,
    /// Request headers.
    #[serde(rename = "RequestHeaders", default)]
    pub request_headers: Option<BTreeMap<String, String>>,
    /// Base64-encoded request body.
    #[serde(rename = "RequestBody", default)]
    pub request_body: Option<String>,
}

impl AuthZRequest {
    /// Parses a request payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidPayload`] when the JSON is malformed.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(bytes).map_err(|err| ProtocolError::InvalidPayload(err.to_string()))
    }

    /// Decodes the payload into an admission request.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidBody`] when the body is not base64.
    pub fn into_admission_request(self) -> Result<AdmissionRequest, ProtocolError> {
        let body = match self.request_body.as_deref() {
            Some(encoded) if !encoded.is_empty() => STANDARD
                .decode(encoded)
                .map_err(|err| ProtocolError::InvalidBody(err.to_string()))?,
            _ => Vec::new(),
        };
        Ok(AdmissionRequest {
            method: self.request_method,
            uri: decode_request_uri(&self.request_uri),
            headers: self.request_headers.unwrap_or_default(),
            body,
        })
    }
}

/// Authorization reply returned to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthZResponse {
    /// Whether the call may proceed.
    #[serde(rename = "Allow")]
    pub allow: bool,
    /// Message shown to the caller on deny.
    #[serde(rename = "Msg", default)]
    pub msg: String,
    /// Plugin-side error; a non-empty value also refuses the call.
    #[serde(rename = "Err", default)]
    pub err: String,
}

impl AuthZResponse {
    /// Reply that lets the call proceed.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            allow: true,
            msg: String::new(),
            err: String::new(),
        }
    }

    /// Reply for a payload the plugin could not interpret.
    #[must_use]
    pub fn protocol_error(error: &ProtocolError) -> Self {
        Self {
            allow: false,
            msg: String::new(),
            err: error.to_string(),
        }
    }
}

impl From<&Decision> for AuthZResponse {
    fn from(decision: &Decision) -> Self {
        Self {
            allow: decision.is_allowed(),
            msg: decision.message(),
            err: String::new(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Plugin payload decoding errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload is not a valid request document.
    #[error("invalid authz request: {0}")]
    InvalidPayload(String),
    /// The request body is not valid base64.
    #[error("invalid authz request body: {0}")]
    InvalidBody(String),
}

// ============================================================================
// SECTION: URI Decoding
// ============================================================================

/// Percent-decodes a request URI.
///
/// Returns an empty string when an escape is truncated or not hex, or when the
/// decoded bytes are not UTF-8. `+` is kept literally.
#[must_use]
pub fn decode_request_uri(raw: &str) -> String {
    if !escapes_are_well_formed(raw) {
        return String::new();
    }
    percent_decode_str(raw).decode_utf8().map(|decoded| decoded.into_owned()).unwrap_or_default()
}

/// Returns true when every `%` introduces two hex digits.
fn escapes_are_well_formed(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let valid = bytes
                .get(index + 1..index + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return false;
            }
            index += 3;
        } else {
            index += 1;
        }
    }
    true
}

#[cfg(test)]
mod tests;
