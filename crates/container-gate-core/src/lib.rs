// crates/container-gate-core/src/lib.rs
// ============================================================================
// Module: Container Gate Core Library
// Description: Public API surface for the Container Gate admission engine.
// Purpose: Expose routing, ownership, policy, and decision types.
// Dependencies: crate::{route, identifier, ownership, policy, gate}
// ============================================================================

//! ## Overview
//! Container Gate core decides whether a container-runtime API call may
//! proceed. It classifies routes, binds containers to the caller that first
//! touched them, and checks creation bodies against a declarative container
//! policy. It is transport-agnostic and reaches the runtime only through the
//! [`ContainerInventory`] seam.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod decision;
pub mod gate;
pub mod hashing;
pub mod identifier;
pub mod interfaces;
pub mod ownership;
pub mod policy;
pub mod policy_table;
pub mod principal;
pub mod route;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AdmissionAuditEvent;
pub use audit::FileAuditSink;
pub use audit::GateAuditSink;
pub use audit::GateNoticeEvent;
pub use audit::GateNoticeKind;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use decision::AdmissionRequest;
pub use decision::Decision;
pub use decision::DenyReason;
pub use gate::AdmissionGate;
pub use gate::GateComponents;
pub use gate::GateSettings;
pub use identifier::ContainerId;
pub use identifier::ResolvedId;
pub use interfaces::ContainerInventory;
pub use interfaces::InventoryEntry;
pub use interfaces::InventoryError;
pub use interfaces::PermitAllSupplementary;
pub use interfaces::PolicySource;
pub use interfaces::StaticPolicySource;
pub use interfaces::SupplementaryPolicy;
pub use interfaces::SupplementaryPolicyError;
pub use ownership::InventorySnapshot;
pub use ownership::OwnershipDecision;
pub use ownership::OwnershipError;
pub use ownership::OwnershipStore;
pub use ownership::ReconcileSummary;
pub use policy::ContainerPolicyEvaluator;
pub use policy::PolicyDataType;
pub use policy::PolicyKind;
pub use policy::PolicyRule;
pub use policy::PolicyTableError;
pub use policy::PolicyVerdict;
pub use policy::RegexPolicyEvaluator;
pub use policy_table::CsvPolicyFile;
pub use policy_table::load_policy_table;
pub use policy_table::parse_policy_table;
pub use principal::AdminPrincipal;
pub use principal::TokenFingerprint;
pub use route::ClassifiedRoute;
pub use route::RouteCategory;
pub use route::RouteError;
pub use route::RouteTable;
