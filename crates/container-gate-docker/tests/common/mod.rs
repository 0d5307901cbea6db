// crates/container-gate-docker/tests/common/mod.rs
// ============================================================================
// Module: Fake Docker Daemon
// Description: In-process Engine API stub served on a temp Unix socket.
// Purpose: Exercise the inventory client without a container runtime.
// Dependencies: axum, tempfile, tokio
// ============================================================================

#![allow(dead_code, reason = "Fixtures are shared across test binaries.")]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use axum::Router;
use axum::extract::RawQuery;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::get;
use tempfile::TempDir;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

/// Canned daemon reply.
#[derive(Clone)]
pub struct DaemonReply {
    pub status: StatusCode,
    pub body: String,
}

impl DaemonReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: r#"{"message":"daemon error"}"#.to_string(),
        }
    }
}

#[derive(Clone)]
struct DaemonState {
    reply: Arc<Mutex<DaemonReply>>,
    queries: Arc<Mutex<Vec<Option<String>>>>,
}

/// Engine API stub bound to a socket inside a temp dir.
pub struct FakeDaemon {
    pub socket_path: PathBuf,
    state: DaemonState,
    task: JoinHandle<()>,
    _dir: TempDir,
}

impl FakeDaemon {
    pub async fn start(reply: DaemonReply) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let socket_path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&socket_path).expect("bind fake daemon");
        let state = DaemonState {
            reply: Arc::new(Mutex::new(reply)),
            queries: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/containers/json", get(list_containers))
            .with_state(state.clone());
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            socket_path,
            state,
            task,
            _dir: dir,
        }
    }

    pub fn set_reply(&self, reply: DaemonReply) {
        *self.state.reply.lock().expect("reply lock") = reply;
    }

    pub fn queries(&self) -> Vec<Option<String>> {
        self.state.queries.lock().expect("queries lock").clone()
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn list_containers(
    State(state): State<DaemonState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    state.queries.lock().expect("queries lock").push(query);
    let reply = state.reply.lock().expect("reply lock").clone();
    (reply.status, [(CONTENT_TYPE, "application/json")], reply.body)
}
