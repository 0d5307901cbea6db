// crates/container-gate-cli/src/policy_check.rs
// ============================================================================
// Module: Offline Policy Check
// Description: Evaluates a creation body against a policy table file.
// Purpose: Let operators test policy tables without a running runtime.
// Dependencies: container-gate-core, serde
// ============================================================================

//! ## Overview
//! The check loads the table with the same parser the gate uses and reports
//! the verdict as JSON. A deny maps to exit code [`DENY_EXIT_CODE`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use container_gate_core::ContainerPolicyEvaluator;
use container_gate_core::PolicyTableError;
use container_gate_core::PolicyVerdict;
use container_gate_core::load_policy_table;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Exit code reported when the body violates the policy.
pub const DENY_EXIT_CODE: u8 = 2;

/// Maximum size of a body checked offline.
pub const MAX_CHECK_BODY_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: Report
// ============================================================================

/// Outcome of an offline policy check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyCheckReport {
    /// Whether the body would be admitted.
    pub allowed: bool,
    /// Number of rules in the table.
    pub rules: usize,
    /// Detailed verdict.
    #[serde(flatten)]
    pub verdict: PolicyVerdict,
}

/// Evaluates `body` against the policy table at `policy`.
///
/// # Errors
///
/// Returns [`PolicyTableError`] when the table cannot be loaded.
pub fn check_body(policy: &Path, body: &str) -> Result<PolicyCheckReport, PolicyTableError> {
    let evaluator = load_policy_table(policy)?;
    let verdict = evaluator.evaluate(body);
    Ok(PolicyCheckReport {
        allowed: verdict.is_allowed(),
        rules: evaluator.len(),
        verdict,
    })
}
