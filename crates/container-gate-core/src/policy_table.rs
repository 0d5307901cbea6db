// crates/container-gate-core/src/policy_table.rs
// ============================================================================
// Module: Policy Table Source
// Description: CSV policy table parsing and modification-aware file caching.
// Purpose: Load container policy rules from an operator-managed table.
// Dependencies: csv, crate::policy, crate::interfaces
// ============================================================================

//! ## Overview
//! The policy table is a headerless CSV with four columns per row: field name,
//! expected value, data type, and policy kind. Lines starting with `#` are
//! comments. Unknown data types and short rows make the whole table malformed;
//! unknown kinds are accepted and handled by the evaluator.
//!
//! [`CsvPolicyFile`] compiles the table once and recompiles it only when the
//! file's modification time changes. A load failure is reported to the caller
//! so the orchestrator can deny just the request being gated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;

use csv::ReaderBuilder;
use csv::Trim;

use crate::interfaces::PolicySource;
use crate::policy::ContainerPolicyEvaluator;
use crate::policy::PolicyDataType;
use crate::policy::PolicyKind;
use crate::policy::PolicyRule;
use crate::policy::PolicyTableError;
use crate::policy::RegexPolicyEvaluator;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum policy table size in bytes.
pub const MAX_POLICY_TABLE_BYTES: usize = 256 * 1024;

/// Number of columns required per row.
const POLICY_COLUMNS: usize = 4;

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses CSV policy table text into rules, preserving row order.
///
/// # Errors
///
/// Returns [`PolicyTableError::Malformed`] when a row is short, a data type is
/// unknown, or the CSV itself cannot be read.
pub fn parse_policy_table(text: &str) -> Result<Vec<PolicyRule>, PolicyTableError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    let mut rules = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record =
            record.map_err(|err| PolicyTableError::Malformed(format!("row {row}: {err}")))?;
        if record.len() < POLICY_COLUMNS {
            return Err(PolicyTableError::Malformed(format!(
                "row {row}: expected {POLICY_COLUMNS} columns, found {}",
                record.len()
            )));
        }
        let field = record.get(0).unwrap_or_default();
        let expected = record.get(1).unwrap_or_default();
        let data_type_label = record.get(2).unwrap_or_default();
        let kind_label = record.get(3).unwrap_or_default();
        let data_type = PolicyDataType::parse(data_type_label).ok_or_else(|| {
            PolicyTableError::Malformed(format!("row {row}: unknown data type {data_type_label}"))
        })?;
        rules.push(PolicyRule::new(field, expected, data_type, PolicyKind::parse(kind_label)));
    }
    Ok(rules)
}

/// Reads and compiles a policy table file.
///
/// # Errors
///
/// Returns [`PolicyTableError`] when the file is unreadable, oversized, not
/// UTF-8, or malformed.
pub fn load_policy_table(path: &Path) -> Result<RegexPolicyEvaluator, PolicyTableError> {
    let bytes = fs::read(path)
        .map_err(|err| PolicyTableError::Io(format!("{}: {err}", path.display())))?;
    if bytes.len() > MAX_POLICY_TABLE_BYTES {
        return Err(PolicyTableError::Malformed("policy table exceeds size limit".to_string()));
    }
    let text = std::str::from_utf8(&bytes)
        .map_err(|_| PolicyTableError::Malformed("policy table must be utf-8".to_string()))?;
    RegexPolicyEvaluator::new(parse_policy_table(text)?)
}

// ============================================================================
// SECTION: File Source
// ============================================================================

/// Compiled table together with the modification time it was read at.
struct CachedTable {
    /// File modification time observed when compiling.
    modified: Option<SystemTime>,
    /// Compiled evaluator.
    evaluator: Arc<RegexPolicyEvaluator>,
}

/// Policy source backed by a CSV file, recompiled when the file changes.
pub struct CsvPolicyFile {
    /// Policy table path.
    path: PathBuf,
    /// Last successfully compiled table.
    cache: Mutex<Option<CachedTable>>,
}

impl CsvPolicyFile {
    /// Creates a lazily loaded file source.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// Creates a file source and compiles the table immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyTableError`] when the initial load fails.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PolicyTableError> {
        let source = Self::new(path);
        source.current()?;
        Ok(source)
    }

    /// Returns the policy table path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the compiled table, recompiling when the file changed.
    fn current(&self) -> Result<Arc<RegexPolicyEvaluator>, PolicyTableError> {
        let modified = fs::metadata(&self.path)
            .map_err(|err| PolicyTableError::Io(format!("{}: {err}", self.path.display())))?
            .modified()
            .ok();
        let mut guard = self
            .cache
            .lock()
            .map_err(|_| PolicyTableError::Io("policy cache mutex poisoned".to_string()))?;
        if let Some(cached) = guard.as_ref()
            && modified.is_some()
            && cached.modified == modified
        {
            return Ok(Arc::clone(&cached.evaluator));
        }
        let evaluator = Arc::new(load_policy_table(&self.path)?);
        *guard = Some(CachedTable {
            modified,
            evaluator: Arc::clone(&evaluator),
        });
        Ok(evaluator)
    }
}

impl PolicySource for CsvPolicyFile {
    fn evaluator(&self) -> Result<Arc<dyn ContainerPolicyEvaluator>, PolicyTableError> {
        let evaluator: Arc<dyn ContainerPolicyEvaluator> = self.current()?;
        Ok(evaluator)
    }
}
