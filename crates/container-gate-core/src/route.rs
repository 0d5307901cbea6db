// crates/container-gate-core/src/route.rs
// ============================================================================
// Module: Route Classifier
// Description: Version-free normalization and coarse classification of API routes.
// Purpose: Map every runtime API call onto exactly one admission category.
// Dependencies: regex, serde, thiserror
// ============================================================================

//! ## Overview
//! The classifier strips a leading `/vMAJOR.MINOR` segment from the request
//! path and then applies an ordered set of checks: exact allow-list, prefix
//! forbid-list, creation/update, container namespace, exec namespace. The
//! first match wins; anything else is [`RouteCategory::Unclassified`].
//! Classification is a pure function of the path and method.

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default exact-match allow-list (health checks and read-only listings).
pub const DEFAULT_ALLOW_LIST: &[&str] =
    &["/_ping", "/version", "/info", "/containers/json", "/images/json"];

/// Default prefix forbid-list (image commits, volume and plugin management).
pub const DEFAULT_FORBID_LIST: &[&str] = &["/commit", "/volumes", "/plugins"];

/// Default container-scoped namespace prefix.
pub const DEFAULT_CONTAINER_PREFIX: &str = "/containers/";

/// Default exec namespace prefix.
pub const DEFAULT_EXEC_PREFIX: &str = "/exec/";

/// Default container creation endpoint.
pub const DEFAULT_CREATE_PATH: &str = "/containers/create";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Admission category assigned to a request route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCategory {
    /// Exact allow-list hit.
    AllowListed,
    /// Forbid-list prefix hit.
    ForbiddenListed,
    /// Container creation or update; the body is policy-checked.
    CreationOrUpdate,
    /// Container-scoped action subject to ownership.
    ContainerScoped,
    /// Exec-scoped action subject to ownership when known.
    ExecScoped,
    /// No rule matched; default allow.
    Unclassified,
}

impl RouteCategory {
    /// Returns a stable label for audit events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllowListed => "allow_listed",
            Self::ForbiddenListed => "forbidden_listed",
            Self::CreationOrUpdate => "creation_or_update",
            Self::ContainerScoped => "container_scoped",
            Self::ExecScoped => "exec_scoped",
            Self::Unclassified => "unclassified",
        }
    }
}

/// Normalized and classified request route.
///
/// # Invariants
/// - `route` never carries an API version segment.
/// - `path` is `route` without its query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRoute {
    /// Upper-cased request method.
    pub method: String,
    /// Version-free route including any query string.
    pub route: String,
    /// Version-free path used for matching.
    pub path: String,
    /// Assigned category.
    pub category: RouteCategory,
}

/// Errors raised when building a route table.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The table definition is unusable.
    #[error("invalid route table: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Route Table
// ============================================================================

/// Ordered classification rules for runtime API routes.
#[derive(Debug, Clone)]
pub struct RouteTable {
    /// Exact-match allow-list.
    allow: Vec<String>,
    /// Prefix forbid-list.
    forbid: Vec<String>,
    /// Container namespace prefix (trailing slash included).
    container_prefix: String,
    /// Exec namespace prefix (trailing slash included).
    exec_prefix: String,
    /// Exact creation endpoint.
    create_path: String,
    /// Matches `<container_prefix><id>/update`.
    update_pattern: Regex,
}

impl RouteTable {
    /// Builds a route table from explicit rule lists.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] when a prefix is empty or not rooted.
    pub fn new(
        allow: Vec<String>,
        forbid: Vec<String>,
        container_prefix: &str,
        exec_prefix: &str,
        create_path: &str,
    ) -> Result<Self, RouteError> {
        for (label, value) in [
            ("container_prefix", container_prefix),
            ("exec_prefix", exec_prefix),
            ("create_path", create_path),
        ] {
            if !value.starts_with('/') || value.len() < 2 {
                return Err(RouteError::Invalid(format!("{label} must be a rooted path")));
            }
        }
        if forbid.iter().any(|prefix| prefix.is_empty()) {
            return Err(RouteError::Invalid("forbid prefixes must be non-empty".to_string()));
        }
        let container_prefix = with_trailing_slash(container_prefix);
        let exec_prefix = with_trailing_slash(exec_prefix);
        let update_pattern =
            Regex::new(&format!("^{}[^/]+/update$", regex::escape(&container_prefix)))
                .map_err(|err| RouteError::Invalid(err.to_string()))?;
        Ok(Self {
            allow,
            forbid,
            container_prefix,
            exec_prefix,
            create_path: create_path.to_string(),
            update_pattern,
        })
    }

    /// Builds the default route table.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] when the built-in rules fail to compile.
    pub fn with_defaults() -> Result<Self, RouteError> {
        Self::new(
            DEFAULT_ALLOW_LIST.iter().map(ToString::to_string).collect(),
            DEFAULT_FORBID_LIST.iter().map(ToString::to_string).collect(),
            DEFAULT_CONTAINER_PREFIX,
            DEFAULT_EXEC_PREFIX,
            DEFAULT_CREATE_PATH,
        )
    }

    /// Returns the container namespace prefix.
    #[must_use]
    pub fn container_prefix(&self) -> &str {
        &self.container_prefix
    }

    /// Returns the exec namespace prefix.
    #[must_use]
    pub fn exec_prefix(&self) -> &str {
        &self.exec_prefix
    }

    /// Returns true when `path` is the container creation endpoint.
    #[must_use]
    pub fn is_create_path(&self, path: &str) -> bool {
        path == self.create_path
    }

    /// Normalizes and classifies a request.
    #[must_use]
    pub fn classify(&self, method: &str, uri: &str) -> ClassifiedRoute {
        let route = strip_api_version(uri).to_string();
        let path = route.split(['?', '#']).next().unwrap_or_default().to_string();
        let category = self.category_for(&path);
        ClassifiedRoute {
            method: method.trim().to_ascii_uppercase(),
            route,
            path,
            category,
        }
    }

    /// Applies the ordered classification rules to a version-free path.
    fn category_for(&self, path: &str) -> RouteCategory {
        if self.allow.iter().any(|allowed| allowed == path) {
            return RouteCategory::AllowListed;
        }
        if self.forbid.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return RouteCategory::ForbiddenListed;
        }
        if self.is_create_path(path) || self.update_pattern.is_match(path) {
            return RouteCategory::CreationOrUpdate;
        }
        if path.starts_with(self.container_prefix.as_str()) {
            return RouteCategory::ContainerScoped;
        }
        if path.starts_with(self.exec_prefix.as_str()) {
            return RouteCategory::ExecScoped;
        }
        RouteCategory::Unclassified
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Removes a leading `/vMAJOR.MINOR` segment, keeping the leading slash.
#[must_use]
pub fn strip_api_version(uri: &str) -> &str {
    let Some(rest) = uri.strip_prefix("/v") else {
        return uri;
    };
    let end = rest.find(['/', '?']).unwrap_or(rest.len());
    let (segment, tail) = rest.split_at(end);
    let Some((major, minor)) = segment.split_once('.') else {
        return uri;
    };
    let numeric = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !numeric(major) || !numeric(minor) {
        return uri;
    }
    if tail.is_empty() { "/" } else if tail.starts_with('?') { uri } else { tail }
}

/// Ensures a namespace prefix ends with a slash.
fn with_trailing_slash(prefix: &str) -> String {
    if prefix.ends_with('/') { prefix.to_string() } else { format!("{prefix}/") }
}
