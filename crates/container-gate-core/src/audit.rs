// crates/container-gate-core/src/audit.rs
// ============================================================================
// Module: Admission Audit Logging
// Description: Structured audit events for admission decisions and notices.
// Purpose: Emit redacted JSON-line audit logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every admission decision produces one `admission_decision` event. Degraded
//! conditions (inventory outages, policy load failures, unrecognized policy
//! kinds) produce `gate_notice` events. Caller tokens appear only as
//! fingerprints and request bodies only as byte counts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::identifier::ContainerId;
use crate::principal::TokenFingerprint;
use crate::route::RouteCategory;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Admission decision audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Upper-cased request method.
    pub method: String,
    /// Version-free route when the request was well formed.
    pub route: Option<String>,
    /// Route category when classified.
    pub category: Option<RouteCategory>,
    /// Whether the request was allowed.
    pub allowed: bool,
    /// Deny reason label.
    pub reason: Option<&'static str>,
    /// Deny message shown to the caller.
    pub message: Option<String>,
    /// Caller token fingerprint when a token was presented.
    pub caller: Option<TokenFingerprint>,
    /// Whether the caller presented the admin secret.
    pub admin: bool,
    /// Canonical container identifier when resolved.
    pub container_id: Option<ContainerId>,
    /// Request body size in bytes.
    pub body_bytes: usize,
}

/// Inputs required to construct an admission audit event.
pub struct AdmissionAuditEventParams {
    /// Upper-cased request method.
    pub method: String,
    /// Version-free route when the request was well formed.
    pub route: Option<String>,
    /// Route category when classified.
    pub category: Option<RouteCategory>,
    /// Whether the request was allowed.
    pub allowed: bool,
    /// Deny reason label.
    pub reason: Option<&'static str>,
    /// Deny message shown to the caller.
    pub message: Option<String>,
    /// Caller token fingerprint when a token was presented.
    pub caller: Option<TokenFingerprint>,
    /// Whether the caller presented the admin secret.
    pub admin: bool,
    /// Canonical container identifier when resolved.
    pub container_id: Option<ContainerId>,
    /// Request body size in bytes.
    pub body_bytes: usize,
}

/// Kind of operational notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateNoticeKind {
    /// Gate started; message describes the security posture.
    Startup,
    /// Inventory fetch failed; stale ownership state was used.
    InventoryUnavailable,
    /// Inventory fetch timed out; stale ownership state was used.
    InventoryTimeout,
    /// Container policy table could not be loaded.
    PolicyUnavailable,
    /// A policy row with an unrecognized kind ended evaluation early.
    UnrecognizedPolicyKind,
    /// Ownership store could not be consulted.
    StoreUnavailable,
    /// Supplementary policy evaluation failed.
    SupplementaryPolicyError,
}

/// Operational notice audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct GateNoticeEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Notice kind.
    pub kind: GateNoticeKind,
    /// Human-readable detail.
    pub message: String,
}

impl AdmissionAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: AdmissionAuditEventParams) -> Self {
        Self {
            event: "admission_decision",
            timestamp_ms: now_ms(),
            method: params.method,
            route: params.route,
            category: params.category,
            allowed: params.allowed,
            reason: params.reason,
            message: params.message,
            caller: params.caller,
            admin: params.admin,
            container_id: params.container_id,
            body_bytes: params.body_bytes,
        }
    }
}

impl GateNoticeEvent {
    /// Creates a new notice with a consistent timestamp.
    #[must_use]
    pub fn new(kind: GateNoticeKind, message: impl Into<String>) -> Self {
        Self {
            event: "gate_notice",
            timestamp_ms: now_ms(),
            kind,
            message: message.into(),
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for admission events.
pub trait GateAuditSink: Send + Sync {
    /// Record an admission decision.
    fn record(&self, event: &AdmissionAuditEvent);

    /// Record an operational notice.
    fn record_notice(&self, _event: &GateNoticeEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl GateAuditSink for StderrAuditSink {
    fn record(&self, event: &AdmissionAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_notice(&self, event: &GateNoticeEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event line.
    fn write_line<T: Serialize>(&self, event: &T) {
        let Ok(payload) = serde_json::to_string(event) else {
            return;
        };
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{payload}");
        }
    }
}

impl GateAuditSink for FileAuditSink {
    fn record(&self, event: &AdmissionAuditEvent) {
        self.write_line(event);
    }

    fn record_notice(&self, event: &GateNoticeEvent) {
        self.write_line(event);
    }
}

/// No-op audit sink for tests or disabled audit logging.
pub struct NoopAuditSink;

impl GateAuditSink for NoopAuditSink {
    fn record(&self, _event: &AdmissionAuditEvent) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Milliseconds since the Unix epoch, zero if the clock is before it.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
