// crates/container-gate-core/src/policy.rs
// ============================================================================
// Module: Container Policy Evaluator
// Description: Declarative rule evaluation over raw container creation bodies.
// Purpose: Deny dangerous container configuration before it reaches the runtime.
// Dependencies: regex, serde, thiserror
// ============================================================================

//! ## Overview
//! Rules are evaluated against the raw, lower-cased request body rather than a
//! parsed document. Each rule compiles into an extraction pattern keyed on the
//! JSON field name and its data type; every non-overlapping occurrence is
//! checked so a repeated key cannot smuggle a second value past the policy.
//! Whitespace is accepted on both sides of the colon, and `\uXXXX` escapes of
//! printable ASCII are decoded first so an escaped key still matches.
//!
//! Security posture: request bodies are untrusted and attacker-controlled.
//! The evaluator sits behind [`ContainerPolicyEvaluator`] so a structural JSON
//! implementation can replace it without touching the orchestrator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Rule Model
// ============================================================================

/// Value shape extracted for a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDataType {
    /// Quoted string value.
    String,
    /// Bracketed list value.
    Slice,
    /// Bare token value such as `true` or `false`.
    Bool,
}

impl PolicyDataType {
    /// Parses a data type label (`string`, `slice`, `bool`).
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "string" => Some(Self::String),
            "slice" => Some(Self::Slice),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }

    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Slice => "slice",
            Self::Bool => "bool",
        }
    }
}

/// Comparison applied to extracted values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Every occurrence must equal the expected value.
    ExpectToSee,
    /// No extracted element may appear in the expected set.
    DoesntExpectToSee,
    /// Every extracted element must appear in the expected set.
    AllowToUse,
    /// Kind label the evaluator does not know.
    Unrecognized(String),
}

impl PolicyKind {
    /// Parses a kind label. Unknown labels are kept as [`PolicyKind::Unrecognized`].
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim() {
            "ExpectToSee" => Self::ExpectToSee,
            "DoesntExpectToSee" => Self::DoesntExpectToSee,
            "AllowToUse" => Self::AllowToUse,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Returns the kind label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ExpectToSee => "ExpectToSee",
            Self::DoesntExpectToSee => "DoesntExpectToSee",
            Self::AllowToUse => "AllowToUse",
            Self::Unrecognized(label) => label,
        }
    }
}

/// One row of the container policy table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyRule {
    /// JSON field name, matched case-insensitively.
    pub field: String,
    /// Expected value; a bracketed, comma-separated set for list comparisons.
    pub expected: String,
    /// Extraction shape.
    pub data_type: PolicyDataType,
    /// Comparison kind.
    pub kind: PolicyKind,
}

impl PolicyRule {
    /// Builds a rule.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        data_type: PolicyDataType,
        kind: PolicyKind,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            data_type,
            kind,
        }
    }
}

// ============================================================================
// SECTION: Verdicts & Errors
// ============================================================================

/// Result of evaluating a body against the policy table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum PolicyVerdict {
    /// No rule was violated.
    Allow,
    /// A rule was violated; `field` is the lower-cased field name.
    Deny {
        /// Violated field.
        field: String,
    },
    /// A matching rule had an unrecognized kind and evaluation stopped early.
    ///
    /// Rules after the offending row are not evaluated. This is a known
    /// fail-open path kept for compatibility with existing policy tables.
    AllowedByUnrecognizedKind {
        /// Field of the offending rule.
        field: String,
        /// Unrecognized kind label.
        kind: String,
    },
}

impl PolicyVerdict {
    /// Returns true when the verdict admits the request.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        !matches!(self, Self::Deny { .. })
    }
}

impl fmt::Display for PolicyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny {
                field,
            } => write!(f, "deny: {field}"),
            Self::AllowedByUnrecognizedKind {
                field,
                kind,
            } => write!(f, "allow: unrecognized policy kind {kind} on {field}"),
        }
    }
}

/// Policy table loading and compilation errors.
#[derive(Debug, Error)]
pub enum PolicyTableError {
    /// The policy table could not be read.
    #[error("policy table io error: {0}")]
    Io(String),
    /// The policy table content is malformed.
    #[error("policy table malformed: {0}")]
    Malformed(String),
    /// A rule produced an unusable extraction pattern.
    #[error("policy rule pattern invalid: {0}")]
    Pattern(String),
}

// ============================================================================
// SECTION: Evaluator Trait
// ============================================================================

/// Evaluates raw creation/update bodies against a container policy.
pub trait ContainerPolicyEvaluator: Send + Sync {
    /// Evaluates the raw request body.
    fn evaluate(&self, body: &str) -> PolicyVerdict;
}

// ============================================================================
// SECTION: Regex Evaluator
// ============================================================================

/// Rule compiled into its extraction pattern and normalized expectations.
#[derive(Debug, Clone)]
struct CompiledRule {
    /// Lower-cased field name reported on deny.
    field: String,
    /// Lower-cased, trimmed expected scalar.
    expected: String,
    /// Lower-cased expected element set for list comparisons.
    expected_set: BTreeSet<String>,
    /// Comparison kind.
    kind: PolicyKind,
    /// Extraction pattern with one capture group.
    pattern: Regex,
}

/// Matches a JSON string escape: an escaped backslash or a `\uXXXX` code unit.
const STRING_ESCAPE_PATTERN: &str = r"\\(?:\\|u([0-9a-f]{4}))";

/// Regex-over-raw-body evaluator.
///
/// # Invariants
/// - Rules are evaluated in table order.
/// - Every occurrence of a field is checked, not just the first.
#[derive(Debug, Clone)]
pub struct RegexPolicyEvaluator {
    /// Compiled rules in table order.
    rules: Vec<CompiledRule>,
    /// Escape sequences decoded before matching.
    escapes: Regex,
}

impl RegexPolicyEvaluator {
    /// Compiles policy rules.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyTableError`] when a field name is empty or a pattern
    /// fails to compile.
    pub fn new(rules: Vec<PolicyRule>) -> Result<Self, PolicyTableError> {
        let rules = rules.into_iter().map(compile_rule).collect::<Result<Vec<_>, _>>()?;
        let escapes = Regex::new(STRING_ESCAPE_PATTERN)
            .map_err(|err| PolicyTableError::Pattern(format!("string escapes: {err}")))?;
        Ok(Self {
            rules,
            escapes,
        })
    }

    /// Returns the number of compiled rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when no rules are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl ContainerPolicyEvaluator for RegexPolicyEvaluator {
    fn evaluate(&self, body: &str) -> PolicyVerdict {
        let lowered = body.to_lowercase();
        let body = decode_ascii_escapes(&self.escapes, &lowered);
        for rule in &self.rules {
            for captures in rule.pattern.captures_iter(&body) {
                let Some(value) = captures.get(1).map(|found| found.as_str()) else {
                    continue;
                };
                let violated = match &rule.kind {
                    PolicyKind::ExpectToSee => value.trim() != rule.expected,
                    PolicyKind::DoesntExpectToSee => {
                        list_elements(value).any(|item| rule.expected_set.contains(item))
                    }
                    PolicyKind::AllowToUse => {
                        list_elements(value).any(|item| !rule.expected_set.contains(item))
                    }
                    PolicyKind::Unrecognized(kind) => {
                        return PolicyVerdict::AllowedByUnrecognizedKind {
                            field: rule.field.clone(),
                            kind: kind.clone(),
                        };
                    }
                };
                if violated {
                    return PolicyVerdict::Deny {
                        field: rule.field.clone(),
                    };
                }
            }
        }
        PolicyVerdict::Allow
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Normalizes a rule and builds its extraction pattern.
fn compile_rule(rule: PolicyRule) -> Result<CompiledRule, PolicyTableError> {
    let field = rule.field.trim().to_lowercase();
    if field.is_empty() {
        return Err(PolicyTableError::Malformed("policy rule field must be non-empty".to_string()));
    }
    let expected = rule.expected.trim().to_lowercase();
    let expected_set = list_elements(expected.trim_matches(['[', ']']))
        .map(ToString::to_string)
        .collect();
    let key = regex::escape(&field);
    let source = match rule.data_type {
        PolicyDataType::String => format!(r#""{key}"\s*:\s*"([^"]+)""#),
        PolicyDataType::Slice => format!(r#""{key}"\s*:\s*\[([^\]]*)\]"#),
        PolicyDataType::Bool => format!(r#""{key}"\s*:\s*([^",}}\]\s]+)"#),
    };
    let pattern =
        Regex::new(&source).map_err(|err| PolicyTableError::Pattern(format!("{field}: {err}")))?;
    Ok(CompiledRule {
        field,
        expected,
        expected_set,
        kind: rule.kind,
        pattern,
    })
}

/// Replaces `\uXXXX` escapes of printable ASCII with the lower-cased character.
///
/// Escaped backslashes are kept so `\\u0050` stays literal text. Any other
/// escape is left encoded.
fn decode_ascii_escapes<'a>(escapes: &Regex, body: &'a str) -> Cow<'a, str> {
    escapes.replace_all(body, |captures: &regex::Captures<'_>| {
        let decoded = captures
            .get(1)
            .and_then(|hex| u32::from_str_radix(hex.as_str(), 16).ok())
            .and_then(char::from_u32)
            .filter(|ch| (ch.is_ascii_graphic() || *ch == ' ') && !matches!(*ch, '"' | '\\'));
        match decoded {
            Some(ch) => ch.to_ascii_lowercase().to_string(),
            None => captures[0].to_string(),
        }
    })
}

/// Splits list contents on commas, trimming quotes and whitespace.
///
/// Empty elements are dropped so `[]` carries no elements.
fn list_elements(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',')
        .map(|item| item.trim().trim_matches('"').trim())
        .filter(|item| !item.is_empty())
}
