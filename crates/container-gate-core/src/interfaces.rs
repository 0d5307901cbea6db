// crates/container-gate-core/src/interfaces.rs
// ============================================================================
// Module: Container Gate Interfaces
// Description: Collaborator seams for inventory, policy tables, and extra rules.
// Purpose: Keep the admission engine transport- and runtime-agnostic.
// Dependencies: async-trait, thiserror, crate::policy
// ============================================================================

//! ## Overview
//! The admission engine talks to the outside world through three seams: the
//! live container inventory, the container policy source, and an optional
//! supplementary rule evaluator. Implementations live in other crates or in
//! tests; the engine never depends on a concrete runtime client.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::policy::ContainerPolicyEvaluator;
use crate::policy::PolicyTableError;
use crate::route::ClassifiedRoute;

// ============================================================================
// SECTION: Container Inventory
// ============================================================================

/// One container as reported by the runtime inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    /// Full container identifier.
    pub id: String,
    /// Display name, possibly prefixed with `/`.
    pub name: String,
}

impl InventoryEntry {
    /// Builds an inventory entry.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Inventory fetch errors.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The runtime could not be reached.
    #[error("inventory unreachable: {0}")]
    Unreachable(String),
    /// The runtime answered with an unusable payload.
    #[error("inventory response invalid: {0}")]
    InvalidResponse(String),
}

/// Source of truth for currently existing containers, including stopped ones.
#[async_trait]
pub trait ContainerInventory: Send + Sync {
    /// Lists every container known to the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError`] when the runtime cannot be queried.
    async fn list_containers(&self) -> Result<Vec<InventoryEntry>, InventoryError>;
}

// ============================================================================
// SECTION: Policy Source
// ============================================================================

/// Provides the container policy evaluator for creation and update bodies.
pub trait PolicySource: Send + Sync {
    /// Returns the evaluator for the current policy table.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyTableError`] when the table cannot be loaded.
    fn evaluator(&self) -> Result<Arc<dyn ContainerPolicyEvaluator>, PolicyTableError>;
}

/// Policy source that always returns the same evaluator.
pub struct StaticPolicySource {
    /// Shared evaluator.
    evaluator: Arc<dyn ContainerPolicyEvaluator>,
}

impl StaticPolicySource {
    /// Wraps an evaluator.
    #[must_use]
    pub fn new(evaluator: Arc<dyn ContainerPolicyEvaluator>) -> Self {
        Self {
            evaluator,
        }
    }
}

impl PolicySource for StaticPolicySource {
    fn evaluator(&self) -> Result<Arc<dyn ContainerPolicyEvaluator>, PolicyTableError> {
        Ok(Arc::clone(&self.evaluator))
    }
}

// ============================================================================
// SECTION: Supplementary Policy
// ============================================================================

/// Supplementary policy evaluation errors.
#[derive(Debug, Error)]
pub enum SupplementaryPolicyError {
    /// The evaluator failed to reach a decision.
    #[error("{0}")]
    Evaluation(String),
}

/// Attribute-based rule evaluator consulted for routes with no dedicated check.
///
/// A match result is advisory: fall-through routes are allowed whether or not
/// a rule matched. Only an evaluation error denies.
pub trait SupplementaryPolicy: Send + Sync {
    /// Evaluates the route and returns whether an explicit rule matched.
    ///
    /// # Errors
    ///
    /// Returns [`SupplementaryPolicyError`] when evaluation fails.
    fn evaluate(&self, route: &ClassifiedRoute) -> Result<bool, SupplementaryPolicyError>;
}

/// Supplementary policy that matches every route.
pub struct PermitAllSupplementary;

impl SupplementaryPolicy for PermitAllSupplementary {
    fn evaluate(&self, _route: &ClassifiedRoute) -> Result<bool, SupplementaryPolicyError> {
        Ok(true)
    }
}
