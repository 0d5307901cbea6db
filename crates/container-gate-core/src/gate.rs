// crates/container-gate-core/src/gate.rs
// ============================================================================
// Module: Decision Orchestrator
// Description: Per-request admission state machine over the gate components.
// Purpose: Turn one runtime API call into exactly one allow/deny decision.
// Dependencies: tokio, crate::{route, identifier, ownership, policy, audit}
// ============================================================================

//! ## Overview
//! [`AdmissionGate::decide`] classifies the route, applies the allow/forbid
//! shortcuts and the admin bypass, checks creation/update bodies against the
//! container policy, and enforces first-touch ownership for container- and
//! exec-scoped routes. Anything left over goes to the supplementary policy.
//!
//! Security posture: per-request faults never escape as errors. An inventory
//! outage degrades to stale ownership state, a policy load failure denies only
//! the request it was gating, and an ownership store fault denies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::audit::AdmissionAuditEvent;
use crate::audit::AdmissionAuditEventParams;
use crate::audit::GateAuditSink;
use crate::audit::GateNoticeEvent;
use crate::audit::GateNoticeKind;
use crate::decision::AdmissionRequest;
use crate::decision::Decision;
use crate::decision::DenyReason;
use crate::identifier::ContainerId;
use crate::identifier::ResolvedId;
use crate::identifier::extract_candidate;
use crate::interfaces::ContainerInventory;
use crate::interfaces::PolicySource;
use crate::interfaces::SupplementaryPolicy;
use crate::ownership::InventorySnapshot;
use crate::ownership::OwnershipDecision;
use crate::ownership::OwnershipError;
use crate::ownership::OwnershipStore;
use crate::ownership::ReconcileSummary;
use crate::policy::PolicyVerdict;
use crate::principal::AdminPrincipal;
use crate::principal::TokenFingerprint;
use crate::route::ClassifiedRoute;
use crate::route::RouteCategory;
use crate::route::RouteTable;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Default caller token header name.
pub const DEFAULT_TOKEN_HEADER: &str = "AuthHeader";

/// Default remediation link for missing tokens.
pub const DEFAULT_HELP_URL: &str =
    "https://docs.docker.com/engine/reference/commandline/cli/#custom-http-headers";

/// Default inventory fetch timeout.
pub const DEFAULT_INVENTORY_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Tunable gate behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSettings {
    /// Header carrying the caller token, matched case-insensitively.
    pub token_header: String,
    /// Remediation link included in missing-token denies.
    pub help_url: String,
    /// Upper bound on one inventory fetch.
    pub inventory_timeout: Duration,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
            help_url: DEFAULT_HELP_URL.to_string(),
            inventory_timeout: DEFAULT_INVENTORY_TIMEOUT,
        }
    }
}

/// Collaborators wired into the gate.
pub struct GateComponents {
    /// Route classification rules.
    pub routes: RouteTable,
    /// Admin bypass capability.
    pub admin: AdminPrincipal,
    /// Shared ownership store.
    pub store: Arc<OwnershipStore>,
    /// Live container inventory.
    pub inventory: Arc<dyn ContainerInventory>,
    /// Container policy source.
    pub policy: Arc<dyn PolicySource>,
    /// Rule evaluator for fall-through routes.
    pub supplementary: Arc<dyn SupplementaryPolicy>,
    /// Audit sink.
    pub audit: Arc<dyn GateAuditSink>,
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Facts gathered while deciding, reported in the audit event.
#[derive(Default)]
struct DecisionTrace {
    /// Classified route when the request was well formed.
    route: Option<ClassifiedRoute>,
    /// Caller token fingerprint.
    caller: Option<TokenFingerprint>,
    /// Whether the caller is admin.
    admin: bool,
    /// Resolved container identifier.
    container_id: Option<ContainerId>,
}

/// Caller identity for ownership checks.
struct Caller<'a> {
    /// Plaintext token, present and non-empty.
    token: Option<&'a str>,
    /// Whether the token is the admin secret.
    is_admin: bool,
}

/// Admission control engine.
pub struct AdmissionGate {
    /// Route classification rules.
    routes: RouteTable,
    /// Admin bypass capability.
    admin: AdminPrincipal,
    /// Shared ownership store.
    store: Arc<OwnershipStore>,
    /// Live container inventory.
    inventory: Arc<dyn ContainerInventory>,
    /// Container policy source.
    policy: Arc<dyn PolicySource>,
    /// Rule evaluator for fall-through routes.
    supplementary: Arc<dyn SupplementaryPolicy>,
    /// Audit sink.
    audit: Arc<dyn GateAuditSink>,
    /// Tunable behavior.
    settings: GateSettings,
    /// Held across one inventory fetch and its application to the store.
    reconcile_lock: Mutex<()>,
}

impl AdmissionGate {
    /// Builds a gate from its collaborators.
    #[must_use]
    pub fn new(components: GateComponents, settings: GateSettings) -> Self {
        Self {
            routes: components.routes,
            admin: components.admin,
            store: components.store,
            inventory: components.inventory,
            policy: components.policy,
            supplementary: components.supplementary,
            audit: components.audit,
            settings,
            reconcile_lock: Mutex::new(()),
        }
    }

    /// Returns the shared ownership store.
    #[must_use]
    pub fn store(&self) -> &Arc<OwnershipStore> {
        &self.store
    }

    /// Returns the gate settings.
    #[must_use]
    pub const fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// Decides one request and records an audit event.
    pub async fn decide(&self, request: &AdmissionRequest) -> Decision {
        let mut trace = DecisionTrace::default();
        let decision = self.evaluate(request, &mut trace).await;
        let reason = decision.deny_reason();
        let method = trace.route.as_ref().map_or_else(
            || request.method.trim().to_ascii_uppercase(),
            |route| route.method.clone(),
        );
        self.audit.record(&AdmissionAuditEvent::new(AdmissionAuditEventParams {
            method,
            route: trace.route.as_ref().map(|route| route.route.clone()),
            category: trace.route.as_ref().map(|route| route.category),
            allowed: decision.is_allowed(),
            reason: reason.map(DenyReason::code),
            message: reason.map(ToString::to_string),
            caller: trace.caller,
            admin: trace.admin,
            container_id: trace.container_id,
            body_bytes: request.body.len(),
        }));
        decision
    }

    /// Refreshes the ownership store from the live inventory.
    ///
    /// Inventory failures and timeouts are recorded as notices and return
    /// `Ok(None)`; the store keeps its previous state.
    ///
    /// Passes run one at a time. A snapshot is applied before any later fetch
    /// starts, so a snapshot taken before a container existed can never land
    /// after that container was bound and prune its owner.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError`] when the store itself is unavailable.
    pub async fn reconcile(&self) -> Result<Option<ReconcileSummary>, OwnershipError> {
        let _pass = self.reconcile_lock.lock().await;
        let fetch = self.inventory.list_containers();
        match tokio::time::timeout(self.settings.inventory_timeout, fetch).await {
            Ok(Ok(entries)) => {
                let snapshot = InventorySnapshot::from_entries(entries);
                self.store.reconcile(&snapshot).map(Some)
            }
            Ok(Err(err)) => {
                self.notice(GateNoticeKind::InventoryUnavailable, err.to_string());
                Ok(None)
            }
            Err(_) => {
                self.notice(
                    GateNoticeKind::InventoryTimeout,
                    format!(
                        "inventory fetch exceeded {} ms",
                        self.settings.inventory_timeout.as_millis()
                    ),
                );
                Ok(None)
            }
        }
    }

    /// Runs the admission state machine.
    async fn evaluate(&self, request: &AdmissionRequest, trace: &mut DecisionTrace) -> Decision {
        let uri = request.uri.trim();
        if uri.is_empty() || !uri.starts_with('/') {
            return Decision::Deny(DenyReason::MalformedRequest);
        }
        let route = self.routes.classify(&request.method, uri);
        let token = request
            .header(&self.settings.token_header)
            .map(str::trim)
            .filter(|token| !token.is_empty());
        let caller = Caller {
            token,
            is_admin: self.admin.is_admin(token),
        };
        trace.caller = token.map(TokenFingerprint::of);
        trace.admin = caller.is_admin;
        let category = route.category;
        trace.route = Some(route);

        match category {
            RouteCategory::AllowListed => Decision::Allow,
            RouteCategory::ForbiddenListed => {
                if caller.is_admin {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::ForbiddenRoute {
                        route: trace.route.as_ref().map(|r| r.route.clone()).unwrap_or_default(),
                    })
                }
            }
            RouteCategory::CreationOrUpdate => {
                if caller.is_admin {
                    return Decision::Allow;
                }
                if let Some(denied) = self.check_container_policy(request) {
                    return denied;
                }
                let creating = trace
                    .route
                    .as_ref()
                    .is_some_and(|route| self.routes.is_create_path(&route.path));
                if creating {
                    // The creation endpoint names no container.
                    if caller.token.is_none() {
                        return self.missing_token();
                    }
                    return Decision::Allow;
                }
                self.check_container_scope(&caller, trace).await
            }
            RouteCategory::ContainerScoped => self.check_container_scope(&caller, trace).await,
            RouteCategory::ExecScoped => self.check_exec_scope(&caller, trace).await,
            RouteCategory::Unclassified => self.fall_through(trace),
        }
    }

    /// Evaluates a creation/update body; returns a deny on violation.
    fn check_container_policy(&self, request: &AdmissionRequest) -> Option<Decision> {
        let evaluator = match self.policy.evaluator() {
            Ok(evaluator) => evaluator,
            Err(err) => {
                self.notice(GateNoticeKind::PolicyUnavailable, err.to_string());
                return Some(Decision::Deny(DenyReason::PolicyUnavailable {
                    reason: err.to_string(),
                }));
            }
        };
        let body = String::from_utf8_lossy(&request.body);
        match evaluator.evaluate(&body) {
            PolicyVerdict::Allow => None,
            PolicyVerdict::Deny {
                field,
            } => Some(Decision::Deny(DenyReason::PolicyViolation {
                field,
            })),
            PolicyVerdict::AllowedByUnrecognizedKind {
                field,
                kind,
            } => {
                self.notice(
                    GateNoticeKind::UnrecognizedPolicyKind,
                    format!("policy kind {kind} on field {field} ended evaluation early"),
                );
                None
            }
        }
    }

    /// Enforces first-touch ownership on a container-scoped route.
    async fn check_container_scope(
        &self,
        caller: &Caller<'_>,
        trace: &mut DecisionTrace,
    ) -> Decision {
        let Some(token) = caller.token else {
            return self.missing_token();
        };
        let prefix = self.routes.container_prefix();
        let resolved = match self.reconcile_and_resolve(prefix, trace).await {
            Ok(resolved) => resolved,
            Err(err) => return self.store_fault(&err),
        };
        let requester = TokenFingerprint::of(token);
        match self.store.authorize(&resolved, &requester, caller.is_admin) {
            Ok(OwnershipDecision::NotOwner) => Decision::Deny(DenyReason::NotOwner),
            Ok(_) => Decision::Allow,
            Err(err) => self.store_fault(&err),
        }
    }

    /// Enforces ownership on an exec-scoped route when a record exists.
    async fn check_exec_scope(&self, caller: &Caller<'_>, trace: &mut DecisionTrace) -> Decision {
        let Some(token) = caller.token else {
            return self.missing_token();
        };
        let prefix = self.routes.exec_prefix();
        let resolved = match self.reconcile_and_resolve(prefix, trace).await {
            Ok(resolved) => resolved,
            Err(err) => return self.store_fault(&err),
        };
        let requester = TokenFingerprint::of(token);
        match self.store.authorize_existing(&resolved, &requester, caller.is_admin) {
            Ok(Some(OwnershipDecision::NotOwner)) => Decision::Deny(DenyReason::ExecNotOwner),
            Ok(Some(_)) => Decision::Allow,
            Ok(None) => self.fall_through(trace),
            Err(err) => self.store_fault(&err),
        }
    }

    /// Reconciles, then resolves the segment after `prefix`.
    async fn reconcile_and_resolve(
        &self,
        prefix: &str,
        trace: &mut DecisionTrace,
    ) -> Result<ResolvedId, OwnershipError> {
        self.reconcile().await?;
        let path = trace.route.as_ref().map(|route| route.path.as_str()).unwrap_or_default();
        let resolved = match extract_candidate(path, prefix) {
            Some(candidate) => self.store.resolve(candidate)?,
            None => ResolvedId::Unresolved,
        };
        trace.container_id = resolved.container_id().cloned();
        Ok(resolved)
    }

    /// Consults the supplementary policy for routes with no dedicated check.
    fn fall_through(&self, trace: &DecisionTrace) -> Decision {
        let Some(route) = trace.route.as_ref() else {
            return Decision::Allow;
        };
        match self.supplementary.evaluate(route) {
            Ok(_) => Decision::Allow,
            Err(err) => {
                self.notice(GateNoticeKind::SupplementaryPolicyError, err.to_string());
                Decision::Deny(DenyReason::SupplementaryPolicy {
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Builds the missing-token deny.
    fn missing_token(&self) -> Decision {
        Decision::Deny(DenyReason::MissingToken {
            header: self.settings.token_header.clone(),
            help_url: self.settings.help_url.clone(),
        })
    }

    /// Records a store fault and denies.
    fn store_fault(&self, err: &OwnershipError) -> Decision {
        self.notice(GateNoticeKind::StoreUnavailable, err.to_string());
        Decision::Deny(DenyReason::StoreUnavailable)
    }

    /// Records an operational notice.
    fn notice(&self, kind: GateNoticeKind, message: impl Into<String>) {
        self.audit.record_notice(&GateNoticeEvent::new(kind, message));
    }
}
