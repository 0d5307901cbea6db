// crates/container-gate-plugin/src/protocol/tests.rs
// ============================================================================
// Module: Plugin Protocol Tests
// Description: Payload decoding and reply encoding tests.
// Purpose: Pin the wire names and boundary decoding rules.
// Dependencies: container-gate-plugin
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use container_gate_core::Decision;
use container_gate_core::DenyReason;
use serde_json::json;

use super::ActivateResponse;
use super::AuthZRequest;
use super::AuthZResponse;
use super::ProtocolError;
use super::decode_request_uri;

#[test]
fn decodes_runtime_payload_into_admission_request() {
    let payload = json!({
        "User": "",
        "RequestMethod": "POST",
        "RequestURI": "/v1.41/containers/create?name=web%20one",
        "RequestHeaders": {"Authheader": "abc", "Content-Type": "application/json"},
        "RequestBody": "eyJJbWFnZSI6ImFscGluZSJ9",
        "UserAuthNMethod": ""
    });
    let request = AuthZRequest::from_slice(payload.to_string().as_bytes()).unwrap();
    let admission = request.into_admission_request().unwrap();
    assert_eq!(admission.method, "POST");
    assert_eq!(admission.uri, "/v1.41/containers/create?name=web one");
    assert_eq!(admission.header("authheader"), Some("abc"));
    assert_eq!(admission.body, br#"{"Image":"alpine"}"#.to_vec());
}

#[test]
fn absent_headers_and_body_are_empty() {
    let request =
        AuthZRequest::from_slice(br#"{"RequestMethod":"GET","RequestURI":"/_ping"}"#).unwrap();
    let admission = request.into_admission_request().unwrap();
    assert!(admission.headers.is_empty());
    assert!(admission.body.is_empty());
}

#[test]
fn invalid_base64_body_is_rejected() {
    let request = AuthZRequest {
        request_method: "POST".to_string(),
        request_uri: "/containers/create".to_string(),
        request_body: Some("not base64!".to_string()),
        ..AuthZRequest::default()
    };
    let err = request.into_admission_request().unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidBody(_)));
}

#[test]
fn malformed_payload_is_rejected() {
    let err = AuthZRequest::from_slice(b"{not json").unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidPayload(_)));
    let reply = AuthZResponse::protocol_error(&err);
    assert!(!reply.allow);
    assert!(reply.err.starts_with("invalid authz request"));
}

#[test]
fn uri_decoding_fails_closed() {
    assert_eq!(decode_request_uri("/containers/my%2Dweb/start"), "/containers/my-web/start");
    assert_eq!(decode_request_uri("/images/a+b/json"), "/images/a+b/json");
    assert_eq!(decode_request_uri("/containers/%zz/start"), "");
    assert_eq!(decode_request_uri("/containers/abc%2"), "");
    assert_eq!(decode_request_uri("/containers/%ff/start"), "");
}

#[test]
fn replies_use_runtime_field_names() {
    let deny = AuthZResponse::from(&Decision::Deny(DenyReason::NotOwner));
    let value = serde_json::to_value(&deny).unwrap();
    assert_eq!(value["Allow"], false);
    assert_eq!(value["Msg"], "Access denied by authz plugin. That's not your container");
    assert_eq!(value["Err"], "");
    let activate = serde_json::to_value(ActivateResponse::authz()).unwrap();
    assert_eq!(activate, json!({"Implements": ["authz"]}));
    assert!(AuthZResponse::allow().allow);
}
