// crates/container-gate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for container-gate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use container_gate_config::ConfigError;
use container_gate_config::ContainerGateConfig;

/// Test result alias.
pub type TestResult = Result<(), String>;

/// Parses and validates a TOML string.
pub fn config_from_toml(toml_str: &str) -> Result<ContainerGateConfig, ConfigError> {
    ContainerGateConfig::from_toml(toml_str)
}

/// Asserts that a config fails validation with a message containing `needle`.
pub fn assert_invalid(toml_str: &str, needle: &str) -> TestResult {
    match config_from_toml(toml_str) {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

/// Environment lookup that never finds a variable.
pub fn no_env(_name: &str) -> Option<String> {
    None
}
