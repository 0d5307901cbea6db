// crates/container-gate-docker/src/inventory.rs
// ============================================================================
// Module: Docker Inventory Client
// Description: Lists containers through the Docker Engine API Unix socket.
// Purpose: Feed the ownership reconciler with the runtime's container set.
// Dependencies: container-gate-core, hyper, hyper-util, http-body-util, serde
// ============================================================================

//! ## Overview
//! [`DockerInventory`] opens one HTTP/1 connection per fetch, issues
//! `GET /containers/json?all=1` and maps each summary to an
//! [`InventoryEntry`] using the container's first name. Stopped containers are
//! included so that a stopped container keeps its owner.
//!
//! Security posture: the daemon response is untrusted input; the body is read
//! under a hard size limit and decoded strictly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use container_gate_core::ContainerInventory;
use container_gate_core::InventoryEntry;
use container_gate_core::InventoryError;
use http_body_util::BodyExt;
use http_body_util::Empty;
use http_body_util::LengthLimitError;
use http_body_util::Limited;
use hyper::Method;
use hyper::Request;
use hyper::client::conn::http1;
use hyper::header::ACCEPT;
use hyper::header::CONTENT_LENGTH;
use hyper::header::HOST;
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::net::UnixStream;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Engine API path listing every container, running or not.
pub const CONTAINER_LIST_PATH: &str = "/containers/json?all=1";

/// Default inventory response size limit.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Host header sent to the daemon; the socket path is the real address.
const DAEMON_HOST: &str = "docker";

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Subset of the Engine API container summary used for reconciliation.
#[derive(Debug, Deserialize)]
struct ContainerSummary {
    /// Full container identifier.
    #[serde(rename = "Id")]
    id: String,
    /// Container names, each prefixed with `/`.
    #[serde(rename = "Names", default)]
    names: Option<Vec<String>>,
}

/// Decodes a container list response body into inventory entries.
///
/// Containers without a name map to an empty name.
///
/// # Errors
///
/// Returns [`InventoryError::InvalidResponse`] when the body is not a JSON
/// array of container summaries.
pub fn parse_container_list(body: &[u8]) -> Result<Vec<InventoryEntry>, InventoryError> {
    let summaries: Vec<ContainerSummary> = serde_json::from_slice(body)
        .map_err(|err| InventoryError::InvalidResponse(format!("container list: {err}")))?;
    Ok(summaries
        .into_iter()
        .map(|summary| {
            let name = summary.names.and_then(|names| names.into_iter().next()).unwrap_or_default();
            InventoryEntry::new(summary.id, name)
        })
        .collect())
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Container inventory backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerInventory {
    /// Engine API Unix socket.
    socket_path: PathBuf,
    /// Maximum accepted response size in bytes.
    max_response_bytes: usize,
}

impl DockerInventory {
    /// Creates a client for the daemon listening on `socket_path`.
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>, max_response_bytes: usize) -> Self {
        Self {
            socket_path: socket_path.into(),
            max_response_bytes,
        }
    }

    /// Returns the daemon socket path.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Fetches the raw container list body.
    async fn fetch(&self) -> Result<Bytes, InventoryError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|err| {
            InventoryError::Unreachable(format!("{}: {err}", self.socket_path.display()))
        })?;
        let (mut sender, connection) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|err| InventoryError::Unreachable(format!("handshake failed: {err}")))?;
        let driver = tokio::spawn(async move {
            let _ = connection.await;
        });
        let result = self.exchange(&mut sender).await;
        driver.abort();
        result
    }

    /// Sends the list request on an established connection and reads the body.
    async fn exchange(
        &self,
        sender: &mut http1::SendRequest<Empty<Bytes>>,
    ) -> Result<Bytes, InventoryError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(CONTAINER_LIST_PATH)
            .header(HOST, DAEMON_HOST)
            .header(ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|err| InventoryError::Unreachable(format!("request build failed: {err}")))?;
        let response = sender
            .send_request(request)
            .await
            .map_err(|err| InventoryError::Unreachable(format!("request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(InventoryError::InvalidResponse(format!("unexpected status {status}")));
        }
        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        if declared.is_some_and(|length| length > self.max_response_bytes) {
            return Err(oversized());
        }
        let collected = Limited::new(response.into_body(), self.max_response_bytes)
            .collect()
            .await
            .map_err(|err| {
                if err.downcast_ref::<LengthLimitError>().is_some() {
                    oversized()
                } else {
                    InventoryError::InvalidResponse(format!("response body: {err}"))
                }
            })?;
        Ok(collected.to_bytes())
    }
}

#[async_trait]
impl ContainerInventory for DockerInventory {
    async fn list_containers(&self) -> Result<Vec<InventoryEntry>, InventoryError> {
        let body = self.fetch().await?;
        parse_container_list(&body)
    }
}

/// Error for a response over the configured size limit.
fn oversized() -> InventoryError {
    InventoryError::InvalidResponse("response exceeds size limit".to_string())
}
