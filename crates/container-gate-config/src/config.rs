// crates/container-gate-config/src/config.rs
// ============================================================================
// Module: Container Gate Configuration
// Description: TOML configuration model and fail-closed validation.
// Purpose: Load plugin, routing, policy, inventory, and audit settings.
// Dependencies: container-gate-core, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is resolved from an explicit path, then the
//! `CONTAINER_GATE_CONFIG` environment variable, then `container-gate.toml` in
//! the working directory. Every section has defaults so an empty file is a
//! valid configuration; any value that is present is bounds-checked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;

use container_gate_core::AdminPrincipal;
use container_gate_core::GateSettings;
use container_gate_core::RouteTable;
use container_gate_core::route::DEFAULT_ALLOW_LIST;
use container_gate_core::route::DEFAULT_CONTAINER_PREFIX;
use container_gate_core::route::DEFAULT_CREATE_PATH;
use container_gate_core::route::DEFAULT_EXEC_PREFIX;
use container_gate_core::route::DEFAULT_FORBID_LIST;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default config file name.
const DEFAULT_CONFIG_NAME: &str = "container-gate.toml";

/// Environment variable overriding the config path.
pub const CONFIG_ENV_VAR: &str = "CONTAINER_GATE_CONFIG";

/// Maximum config file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

/// Maximum length of one path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;

/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Maximum number of allow-list or forbid-list entries.
pub(crate) const MAX_ROUTE_RULES: usize = 256;

/// Maximum plugin request body size.
pub(crate) const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Minimum inventory fetch timeout in milliseconds.
pub(crate) const MIN_INVENTORY_TIMEOUT_MS: u64 = 100;

/// Maximum inventory fetch timeout in milliseconds.
pub(crate) const MAX_INVENTORY_TIMEOUT_MS: u64 = 30_000;

/// Maximum inventory response size.
pub(crate) const MAX_INVENTORY_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

/// Maximum admin secret length in bytes.
pub(crate) const MAX_ADMIN_SECRET_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Root
// ============================================================================

/// Container Gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerGateConfig {
    /// Plugin socket settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Caller token and admin secret settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Route classification rules.
    #[serde(default)]
    pub routes: RoutesConfig,
    /// Container policy table location.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Container runtime inventory settings.
    #[serde(default)]
    pub inventory: InventoryConfig,
    /// Audit logging settings.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Modification time of the loaded file.
    #[serde(skip)]
    pub source_modified_at: Option<SystemTime>,
}

impl ContainerGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |name| env::var(name).ok())
    }

    /// Loads configuration using an explicit environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolved = resolve_path(path, &lookup)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml(content)?;
        config.source_modified_at = fs::metadata(&resolved).and_then(|meta| meta.modified()).ok();
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.auth.validate()?;
        self.routes.validate()?;
        self.policy.validate()?;
        self.inventory.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Builds the route table described by `[routes]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the rules cannot be compiled.
    pub fn route_table(&self) -> Result<RouteTable, ConfigError> {
        self.routes.route_table()
    }

    /// Returns the gate settings described by `[auth]` and `[inventory]`.
    #[must_use]
    pub fn gate_settings(&self) -> GateSettings {
        GateSettings {
            token_header: self.auth.token_header.trim().to_string(),
            help_url: self.auth.help_url.trim().to_string(),
            inventory_timeout: self.inventory.timeout(),
        }
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Plugin socket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Unix socket the plugin listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    /// Maximum plugin request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Validates server settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("server.socket_path", &self.socket_path)?;
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_BODY_BYTES}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Auth
// ============================================================================

/// Caller token and admin secret configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Header carrying the caller token.
    #[serde(default = "default_token_header")]
    pub token_header: String,
    /// Environment variable holding the admin secret.
    #[serde(default = "default_admin_token_env")]
    pub admin_token_env: String,
    /// File holding the admin secret; preferred over the environment.
    #[serde(default)]
    pub admin_token_file: Option<String>,
    /// Remediation link for missing-token denies.
    #[serde(default = "default_help_url")]
    pub help_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_header: default_token_header(),
            admin_token_env: default_admin_token_env(),
            admin_token_file: None,
            help_url: default_help_url(),
        }
    }
}

impl AuthConfig {
    /// Validates auth settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let header = self.token_header.trim();
        if header.is_empty() {
            return Err(ConfigError::Invalid("auth.token_header must be non-empty".to_string()));
        }
        if !header.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            return Err(ConfigError::Invalid(
                "auth.token_header must be a valid header name".to_string(),
            ));
        }
        if self.admin_token_env.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.admin_token_env must be non-empty".to_string()));
        }
        if let Some(path) = &self.admin_token_file {
            validate_path_string("auth.admin_token_file", path)?;
        }
        if self.help_url.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.help_url must be non-empty".to_string()));
        }
        Ok(())
    }

    /// Loads the admin secret and reduces it to an [`AdminPrincipal`].
    ///
    /// The file, when configured, takes precedence over the environment.
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when no secret is available, the secret is
    /// empty, or the file cannot be read.
    pub fn admin_principal<F>(&self, lookup: F) -> Result<AdminPrincipal, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = if let Some(path) = &self.admin_token_file {
            fs::read_to_string(path.trim())
                .map_err(|err| ConfigError::Io(format!("auth.admin_token_file: {err}")))?
        } else {
            let name = self.admin_token_env.trim();
            lookup(name).ok_or_else(|| {
                ConfigError::Invalid(format!("admin secret not set: define {name}"))
            })?
        };
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(ConfigError::Invalid("admin secret must be non-empty".to_string()));
        }
        if secret.len() > MAX_ADMIN_SECRET_LENGTH {
            return Err(ConfigError::Invalid("admin secret exceeds max length".to_string()));
        }
        Ok(AdminPrincipal::from_secret(secret))
    }
}

// ============================================================================
// SECTION: Routes
// ============================================================================

/// Route classification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutesConfig {
    /// Exact version-free paths that are always allowed.
    #[serde(default = "default_allow_list")]
    pub allow: Vec<String>,
    /// Path prefixes reserved for the admin.
    #[serde(default = "default_forbid_list")]
    pub forbid: Vec<String>,
    /// Container-scoped namespace prefix.
    #[serde(default = "default_container_prefix")]
    pub container_prefix: String,
    /// Exec namespace prefix.
    #[serde(default = "default_exec_prefix")]
    pub exec_prefix: String,
    /// Container creation endpoint.
    #[serde(default = "default_create_path")]
    pub create_path: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            allow: default_allow_list(),
            forbid: default_forbid_list(),
            container_prefix: default_container_prefix(),
            exec_prefix: default_exec_prefix(),
            create_path: default_create_path(),
        }
    }
}

impl RoutesConfig {
    /// Validates route rules.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, rules) in [("routes.allow", &self.allow), ("routes.forbid", &self.forbid)] {
            if rules.len() > MAX_ROUTE_RULES {
                return Err(ConfigError::Invalid(format!("{field} exceeds {MAX_ROUTE_RULES} rules")));
            }
            for rule in rules {
                validate_route(field, rule)?;
            }
        }
        validate_route("routes.container_prefix", &self.container_prefix)?;
        validate_route("routes.exec_prefix", &self.exec_prefix)?;
        validate_route("routes.create_path", &self.create_path)?;
        if self.forbid.iter().any(|prefix| prefix == "/") {
            return Err(ConfigError::Invalid("routes.forbid must not contain /".to_string()));
        }
        self.route_table().map(|_| ())
    }

    /// Compiles the route table.
    fn route_table(&self) -> Result<RouteTable, ConfigError> {
        RouteTable::new(
            self.allow.clone(),
            self.forbid.clone(),
            &self.container_prefix,
            &self.exec_prefix,
            &self.create_path,
        )
        .map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Container policy table configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Path to the CSV policy table.
    #[serde(default = "default_policy_path")]
    pub path: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: default_policy_path(),
        }
    }
}

impl PolicyConfig {
    /// Validates policy settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("policy.path", &self.path)
    }
}

// ============================================================================
// SECTION: Inventory
// ============================================================================

/// Container runtime inventory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    /// Docker Engine API socket.
    #[serde(default = "default_docker_socket")]
    pub docker_socket: String,
    /// Upper bound on one inventory fetch, in milliseconds.
    #[serde(default = "default_inventory_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum inventory response size in bytes.
    #[serde(default = "default_inventory_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            docker_socket: default_docker_socket(),
            timeout_ms: default_inventory_timeout_ms(),
            max_response_bytes: default_inventory_max_response_bytes(),
        }
    }
}

impl InventoryConfig {
    /// Validates inventory settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("inventory.docker_socket", &self.docker_socket)?;
        if !(MIN_INVENTORY_TIMEOUT_MS..=MAX_INVENTORY_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "inventory.timeout_ms must be between {MIN_INVENTORY_TIMEOUT_MS} and \
                 {MAX_INVENTORY_TIMEOUT_MS}"
            )));
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_INVENTORY_RESPONSE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "inventory.max_response_bytes must be between 1 and {MAX_INVENTORY_RESPONSE_BYTES}"
            )));
        }
        Ok(())
    }

    /// Returns the fetch timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit events are emitted.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Append-only audit log file; stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path<F>(path: Option<&Path>, lookup: &F) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Some(env_path) = lookup(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a version-free API route.
fn validate_route(field: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with('/') {
        return Err(ConfigError::Invalid(format!("{field} entries must start with /")));
    }
    if value.len() > MAX_TOTAL_PATH_LENGTH || value.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!("{field} entry {value} is not a valid route")));
    }
    Ok(())
}

/// Default plugin socket.
fn default_socket_path() -> String {
    "/run/docker/plugins/container-authz-plugin.sock".to_string()
}

/// Default plugin request body limit.
const fn default_max_body_bytes() -> usize {
    4 * 1024 * 1024
}

/// Default caller token header.
fn default_token_header() -> String {
    container_gate_core::gate::DEFAULT_TOKEN_HEADER.to_string()
}

/// Default admin secret environment variable.
fn default_admin_token_env() -> String {
    "CONTAINER_GATE_ADMIN_TOKEN".to_string()
}

/// Default missing-token remediation link.
fn default_help_url() -> String {
    container_gate_core::gate::DEFAULT_HELP_URL.to_string()
}

/// Default allow-list.
fn default_allow_list() -> Vec<String> {
    DEFAULT_ALLOW_LIST.iter().map(ToString::to_string).collect()
}

/// Default forbid-list.
fn default_forbid_list() -> Vec<String> {
    DEFAULT_FORBID_LIST.iter().map(ToString::to_string).collect()
}

/// Default container namespace prefix.
fn default_container_prefix() -> String {
    DEFAULT_CONTAINER_PREFIX.to_string()
}

/// Default exec namespace prefix.
fn default_exec_prefix() -> String {
    DEFAULT_EXEC_PREFIX.to_string()
}

/// Default creation endpoint.
fn default_create_path() -> String {
    DEFAULT_CREATE_PATH.to_string()
}

/// Default policy table path.
fn default_policy_path() -> String {
    "container_policy.csv".to_string()
}

/// Default Docker Engine API socket.
fn default_docker_socket() -> String {
    "/var/run/docker.sock".to_string()
}

/// Default inventory fetch timeout.
const fn default_inventory_timeout_ms() -> u64 {
    2_000
}

/// Default inventory response size limit.
const fn default_inventory_max_response_bytes() -> usize {
    8 * 1024 * 1024
}

/// Audit logging is on unless disabled.
const fn default_audit_enabled() -> bool {
    true
}
