// crates/container-gate-core/src/decision.rs
// ============================================================================
// Module: Admission Decisions
// Description: Transport-neutral request descriptor and allow/deny outcomes.
// Purpose: Give every admission outcome a stable reason and operator message.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`AdmissionRequest`] is what the plugin callback layer hands the gate after
//! boundary decoding. [`Decision`] is what it gets back: an allow, or a deny
//! carrying a [`DenyReason`] whose rendered message is shown to the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix shared by every deny message.
pub const DENY_MESSAGE_PREFIX: &str = "Access denied by authz plugin.";

// ============================================================================
// SECTION: Request
// ============================================================================

/// Runtime API call submitted for admission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionRequest {
    /// HTTP method of the runtime API call.
    pub method: String,
    /// Decoded request URI, including any version segment and query.
    pub uri: String,
    /// Request headers as forwarded by the runtime.
    pub headers: BTreeMap<String, String>,
    /// Raw request body.
    pub body: Vec<u8>,
}

impl AdmissionRequest {
    /// Builds a request with no headers or body.
    #[must_use]
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns a header value, matching the name case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DenyReason {
    /// The request URI was empty or not a rooted path.
    MalformedRequest,
    /// The route is on the forbid-list and the caller is not admin.
    ForbiddenRoute {
        /// Version-free route that was refused.
        route: String,
    },
    /// A container policy rule was violated.
    PolicyViolation {
        /// Lower-cased field name of the violated rule.
        field: String,
    },
    /// The container policy could not be loaded.
    PolicyUnavailable {
        /// Load failure description.
        reason: String,
    },
    /// The caller token header was absent or empty.
    MissingToken {
        /// Expected header name.
        header: String,
        /// Remediation documentation link.
        help_url: String,
    },
    /// The container belongs to another caller.
    NotOwner,
    /// The exec target belongs to another caller.
    ExecNotOwner,
    /// The ownership store could not be consulted.
    StoreUnavailable,
    /// The supplementary policy failed to evaluate.
    SupplementaryPolicy {
        /// Evaluation failure description.
        reason: String,
    },
}

impl DenyReason {
    /// Returns a stable label for audit events.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedRequest => "malformed_request",
            Self::ForbiddenRoute {
                ..
            } => "forbidden_route",
            Self::PolicyViolation {
                ..
            } => "policy_violation",
            Self::PolicyUnavailable {
                ..
            } => "policy_unavailable",
            Self::MissingToken {
                ..
            } => "missing_token",
            Self::NotOwner => "not_owner",
            Self::ExecNotOwner => "exec_not_owner",
            Self::StoreUnavailable => "store_unavailable",
            Self::SupplementaryPolicy {
                ..
            } => "supplementary_policy",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DENY_MESSAGE_PREFIX} ")?;
        match self {
            Self::MalformedRequest => f.write_str("Empty request"),
            Self::ForbiddenRoute {
                route,
            } => write!(f, "Forbidden route: {route}"),
            Self::PolicyViolation {
                field,
            } => write!(f, "Container policy violation: {field}"),
            Self::PolicyUnavailable {
                reason,
            } => write!(f, "Container policy unavailable: {reason}"),
            Self::MissingToken {
                header,
                help_url,
            } => write!(f, "{header} is empty. Follow the instruction - {help_url}"),
            Self::NotOwner => f.write_str("That's not your container"),
            Self::ExecNotOwner => f.write_str("You can't exec other people's containers"),
            Self::StoreUnavailable => f.write_str("Ownership store unavailable"),
            Self::SupplementaryPolicy {
                reason,
            } => write!(f, "Supplementary policy error: {reason}"),
        }
    }
}

/// Final admission outcome for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Allow,
    /// The request is refused.
    Deny(DenyReason),
}

impl Decision {
    /// Returns true when the request may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns the deny reason, if any.
    #[must_use]
    pub const fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Allow => None,
            Self::Deny(reason) => Some(reason),
        }
    }

    /// Returns the caller-facing message; empty for allows.
    #[must_use]
    pub fn message(&self) -> String {
        self.deny_reason().map(ToString::to_string).unwrap_or_default()
    }
}
