// crates/container-gate-cli/src/bootstrap.rs
// ============================================================================
// Module: Gate Bootstrap
// Description: Builds the admission gate and plugin server from configuration.
// Purpose: Keep startup wiring in one place, separate from argument parsing.
// Dependencies: container-gate-{config, core, docker, plugin}, thiserror
// ============================================================================

//! ## Overview
//! Startup is the only place where missing configuration is fatal: an absent
//! admin secret or an unopenable audit log aborts startup. A policy table
//! that fails to load is not fatal; it is reported and retried on every
//! creation request, which is denied until the table loads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use container_gate_config::AuditConfig;
use container_gate_config::ContainerGateConfig;
use container_gate_core::AdmissionGate;
use container_gate_core::CsvPolicyFile;
use container_gate_core::FileAuditSink;
use container_gate_core::GateAuditSink;
use container_gate_core::GateComponents;
use container_gate_core::GateNoticeEvent;
use container_gate_core::GateNoticeKind;
use container_gate_core::NoopAuditSink;
use container_gate_core::OwnershipStore;
use container_gate_core::PermitAllSupplementary;
use container_gate_core::StderrAuditSink;
use container_gate_docker::DockerInventory;
use container_gate_plugin::PluginServer;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Startup wiring errors.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration could not be turned into components.
    #[error("config error: {0}")]
    Config(String),
    /// The audit sink could not be opened.
    #[error("audit log error: {0}")]
    Audit(String),
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

/// Builds the audit sink described by `[audit]`.
///
/// # Errors
///
/// Returns [`BootstrapError::Audit`] when the audit file cannot be opened.
pub fn audit_sink(config: &AuditConfig) -> Result<Arc<dyn GateAuditSink>, BootstrapError> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path.trim()))
                .map_err(|err| BootstrapError::Audit(format!("{path}: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Builds the admission gate, reading the admin secret through `lookup`.
///
/// # Errors
///
/// Returns [`BootstrapError`] when the admin secret, route table, or audit
/// sink cannot be produced.
pub fn build_gate<F>(
    config: &ContainerGateConfig,
    lookup: F,
) -> Result<Arc<AdmissionGate>, BootstrapError>
where
    F: Fn(&str) -> Option<String>,
{
    let admin = config
        .auth
        .admin_principal(lookup)
        .map_err(|err| BootstrapError::Config(err.to_string()))?;
    let routes = config.route_table().map_err(|err| BootstrapError::Config(err.to_string()))?;
    let audit = audit_sink(&config.audit)?;
    let policy_path = config.policy.path.trim();
    let policy = CsvPolicyFile::open(policy_path).unwrap_or_else(|err| {
        let notice = GateNoticeEvent::new(GateNoticeKind::PolicyUnavailable, err.to_string());
        audit.record_notice(&notice);
        CsvPolicyFile::new(policy_path)
    });
    let inventory = DockerInventory::new(
        config.inventory.docker_socket.trim(),
        config.inventory.max_response_bytes,
    );
    audit.record_notice(&GateNoticeEvent::new(GateNoticeKind::Startup, startup_posture(config)));
    let gate = AdmissionGate::new(
        GateComponents {
            routes,
            admin,
            store: Arc::new(OwnershipStore::new()),
            inventory: Arc::new(inventory),
            policy: Arc::new(policy),
            supplementary: Arc::new(PermitAllSupplementary),
            audit,
        },
        config.gate_settings(),
    );
    Ok(Arc::new(gate))
}

/// Builds the plugin server for an assembled gate.
#[must_use]
pub fn plugin_server(config: &ContainerGateConfig, gate: Arc<AdmissionGate>) -> PluginServer {
    PluginServer::new(gate, config.server.socket_path.trim(), config.server.max_body_bytes)
}

/// Describes the security posture announced at startup.
fn startup_posture(config: &ContainerGateConfig) -> String {
    format!(
        "admin bypass enabled; caller token header {}; policy table {}; inventory {}; \
         unresolved container references are allowed without an ownership check",
        config.auth.token_header.trim(),
        config.policy.path.trim(),
        config.inventory.docker_socket.trim(),
    )
}
