// crates/container-gate-plugin/tests/common/mod.rs
// ============================================================================
// Module: Plugin Test Fixtures
// Description: Running plugin server and a Unix-socket HTTP client.
// Purpose: Drive the plugin endpoints the way the runtime does.
// Dependencies: container-gate-plugin, container-gate-core, hyper, tokio
// ============================================================================

#![allow(dead_code, reason = "Fixtures are shared across test binaries.")]

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use container_gate_core::AdmissionGate;
use container_gate_core::AdminPrincipal;
use container_gate_core::ContainerInventory;
use container_gate_core::GateComponents;
use container_gate_core::GateSettings;
use container_gate_core::InventoryEntry;
use container_gate_core::InventoryError;
use container_gate_core::NoopAuditSink;
use container_gate_core::OwnershipStore;
use container_gate_core::PermitAllSupplementary;
use container_gate_core::PolicyDataType;
use container_gate_core::PolicyKind;
use container_gate_core::PolicyRule;
use container_gate_core::RegexPolicyEvaluator;
use container_gate_core::RouteTable;
use container_gate_core::StaticPolicySource;
use container_gate_plugin::PluginServer;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::Request;
use hyper::StatusCode;
use hyper::client::conn::http1;
use hyper::header::CONTENT_TYPE;
use hyper::header::HOST;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::UnixStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Admin secret used by fixtures.
pub const ADMIN_TOKEN: &str = "admin-secret-token";

/// Full identifier of the `web` fixture container.
pub const WEB_ID: &str = "f760a15e19af19f97e52ead30d4cb5f8c906e601bab8cb63ccc071857df44b75";

/// Plugin payload limit used by fixtures.
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Inventory that always reports the `web` container.
struct StaticInventory;

#[async_trait]
impl ContainerInventory for StaticInventory {
    async fn list_containers(&self) -> Result<Vec<InventoryEntry>, InventoryError> {
        Ok(vec![InventoryEntry::new(WEB_ID, "/web")])
    }
}

/// Builds a gate that forbids privileged containers.
pub fn gate() -> Arc<AdmissionGate> {
    let rules = vec![PolicyRule::new(
        "privileged",
        "false",
        PolicyDataType::Bool,
        PolicyKind::ExpectToSee,
    )];
    let evaluator = RegexPolicyEvaluator::new(rules).expect("policy rules");
    Arc::new(AdmissionGate::new(
        GateComponents {
            routes: RouteTable::with_defaults().expect("default routes"),
            admin: AdminPrincipal::from_secret(ADMIN_TOKEN),
            store: Arc::new(OwnershipStore::new()),
            inventory: Arc::new(StaticInventory),
            policy: Arc::new(StaticPolicySource::new(Arc::new(evaluator))),
            supplementary: Arc::new(PermitAllSupplementary),
            audit: Arc::new(NoopAuditSink),
        },
        GateSettings::default(),
    ))
}

/// Plugin server running on a temp socket.
pub struct RunningPlugin {
    pub socket_path: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), container_gate_plugin::PluginServerError>>>,
    dir: Option<TempDir>,
}

impl RunningPlugin {
    pub fn start() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let socket_path = dir.path().join("plugins").join("container-authz-plugin.sock");
        Self::start_at(dir, socket_path)
    }

    pub fn start_at(dir: TempDir, socket_path: PathBuf) -> Self {
        let server = PluginServer::new(gate(), &socket_path, MAX_BODY_BYTES);
        let listener = server.bind().expect("bind plugin socket");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.serve_on(listener, async move {
            let _ = shutdown_rx.await;
        }));
        Self {
            socket_path,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            dir: Some(dir),
        }
    }

    /// Posts a raw payload and returns the status and JSON reply.
    pub async fn post(&self, path: &str, body: Vec<u8>) -> (StatusCode, Value) {
        let stream = UnixStream::connect(&self.socket_path).await.expect("connect plugin");
        let (mut sender, connection) =
            http1::handshake(TokioIo::new(stream)).await.expect("handshake");
        tokio::spawn(async move {
            let _ = connection.await;
        });
        let request = Request::post(path)
            .header(HOST, "plugin")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .expect("build request");
        let response = sender.send_request(request).await.expect("send request");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("read body").to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Posts a JSON payload.
    pub async fn post_json(&self, path: &str, payload: &Value) -> (StatusCode, Value) {
        self.post(path, payload.to_string().into_bytes()).await
    }

    /// Stops the server, waits for it to exit, and hands back the temp dir.
    pub async fn stop(mut self) -> Option<TempDir> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let result = task.await.expect("server task");
            assert!(result.is_ok(), "server exited with error");
        }
        self.dir.take()
    }
}

impl Drop for RunningPlugin {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
