// crates/container-gate-plugin/src/server.rs
// ============================================================================
// Module: Authorization Plugin Server
// Description: HTTP endpoints of the runtime authorization plugin protocol.
// Purpose: Serve admission decisions on a Unix socket.
// Dependencies: axum, tokio, container-gate-core, crate::protocol
// ============================================================================

//! ## Overview
//! Three endpoints are served: activation, request authorization, and
//! response authorization. Only request authorization consults the admission
//! gate; responses are never filtered. Oversized plugin payloads are refused
//! by the transport before they reach the gate.
//!
//! Security posture: the socket is the only listener; no TCP transport exists.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::routing::post;
use container_gate_core::AdmissionGate;
use tokio::net::UnixListener;

use crate::protocol::ActivateResponse;
use crate::protocol::AuthZRequest;
use crate::protocol::AuthZResponse;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Plugin activation endpoint.
pub const ACTIVATE_PATH: &str = "/Plugin.Activate";

/// Request authorization endpoint.
pub const AUTHZ_REQUEST_PATH: &str = "/AuthZPlugin.AuthZReq";

/// Response authorization endpoint.
pub const AUTHZ_RESPONSE_PATH: &str = "/AuthZPlugin.AuthZRes";

// ============================================================================
// SECTION: Server
// ============================================================================

/// Authorization plugin server.
pub struct PluginServer {
    /// Admission engine consulted per request.
    gate: Arc<AdmissionGate>,
    /// Unix socket the plugin listens on.
    socket_path: PathBuf,
    /// Maximum plugin payload size.
    max_body_bytes: usize,
}

impl PluginServer {
    /// Creates a server for the given gate.
    #[must_use]
    pub fn new(
        gate: Arc<AdmissionGate>,
        socket_path: impl Into<PathBuf>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            gate,
            socket_path: socket_path.into(),
            max_body_bytes,
        }
    }

    /// Returns the plugin socket path.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Builds the plugin endpoint router.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route(ACTIVATE_PATH, post(handle_activate))
            .route(AUTHZ_REQUEST_PATH, post(handle_authz_request))
            .route(AUTHZ_RESPONSE_PATH, post(handle_authz_response))
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .with_state(Arc::clone(&self.gate))
    }

    /// Binds the plugin socket, replacing a stale socket file.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PluginServerError`] when the path is occupied by a non-socket
    /// file or binding fails.
    pub fn bind(&self) -> Result<UnixListener, PluginServerError> {
        remove_stale_socket(&self.socket_path)?;
        if let Some(parent) = self.socket_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| {
                PluginServerError::Transport(format!("{}: {err}", parent.display()))
            })?;
        }
        UnixListener::bind(&self.socket_path).map_err(|err| {
            PluginServerError::Transport(format!("bind {}: {err}", self.socket_path.display()))
        })
    }

    /// Serves until the process is stopped.
    ///
    /// # Errors
    ///
    /// Returns [`PluginServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), PluginServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Binds the socket and serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`PluginServerError`] when binding or serving fails.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), PluginServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind()?;
        self.serve_on(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves, then
    /// removes the socket file.
    ///
    /// # Errors
    ///
    /// Returns [`PluginServerError`] when serving fails.
    pub async fn serve_on<F>(
        self,
        listener: UnixListener,
        shutdown: F,
    ) -> Result<(), PluginServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|err| PluginServerError::Transport(format!("plugin server failed: {err}")));
        let _ = fs::remove_file(&self.socket_path);
        result
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Answers plugin activation.
async fn handle_activate() -> Json<ActivateResponse> {
    Json(ActivateResponse::authz())
}

/// Decides one runtime API call.
async fn handle_authz_request(
    State(gate): State<Arc<AdmissionGate>>,
    bytes: Bytes,
) -> Json<AuthZResponse> {
    let request =
        match AuthZRequest::from_slice(&bytes).and_then(AuthZRequest::into_admission_request) {
            Ok(request) => request,
            Err(err) => return Json(AuthZResponse::protocol_error(&err)),
        };
    let decision = gate.decide(&request).await;
    Json(AuthZResponse::from(&decision))
}

/// Lets every runtime response through.
async fn handle_authz_response() -> Json<AuthZResponse> {
    Json(AuthZResponse::allow())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Removes a leftover socket file; refuses to remove anything else.
fn remove_stale_socket(path: &Path) -> Result<(), PluginServerError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => fs::remove_file(path).map_err(|err| {
            PluginServerError::Transport(format!("remove stale socket {}: {err}", path.display()))
        }),
        Ok(_) => Err(PluginServerError::Config(format!(
            "{} exists and is not a socket",
            path.display()
        ))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(PluginServerError::Transport(format!("{}: {err}", path.display()))),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Plugin server errors.
#[derive(Debug, thiserror::Error)]
pub enum PluginServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
