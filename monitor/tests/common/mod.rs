//! Scripted exam-lab service used by the integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

/// Scripted exam-lab backend: session registration, spec generation,
/// deploy start, status queries and the websocket log stream.
#[derive(Clone)]
pub struct MockService {
    inner: Arc<MockInner>,
}

pub struct MockInner {
    /// Phase returned by status queries and `get_status` replies
    phase: Mutex<String>,
    exit_code: Mutex<Option<i32>>,

    /// Status queries that fail before the endpoint recovers
    status_failures: AtomicU32,

    /// Whether the deploy call is scripted to fail
    fail_deploy: AtomicBool,

    /// Whether client pings are answered with pongs
    answer_pings: AtomicBool,

    /// Log lines replayed on the first websocket connection
    first_connection_logs: Vec<String>,

    /// Whether the first websocket connection closes after the replay
    drop_after_logs: bool,

    ws_connects: AtomicU32,
    register_calls: AtomicU32,
    inventory_calls: AtomicU32,
    deploy_calls: AtomicU32,
}

impl MockService {
    pub fn new(first_connection_logs: Vec<String>, drop_after_logs: bool) -> Self {
        Self {
            inner: Arc::new(MockInner {
                phase: Mutex::new("running".to_string()),
                exit_code: Mutex::new(None),
                status_failures: AtomicU32::new(0),
                fail_deploy: AtomicBool::new(false),
                answer_pings: AtomicBool::new(true),
                first_connection_logs,
                drop_after_logs,
                ws_connects: AtomicU32::new(0),
                register_calls: AtomicU32::new(0),
                inventory_calls: AtomicU32::new(0),
                deploy_calls: AtomicU32::new(0),
            }),
        }
    }

    pub async fn spawn(self) -> SocketAddr {
        let app = Router::new()
            .route("/exam-sessions", post(register_session))
            .route("/exam-sessions/{sid}/kubespray/inventory", post(generate_inventory))
            .route("/exam-sessions/{sid}/kubespray/deploy", post(start_deploy))
            .route("/exam-sessions/{sid}/kubespray/deploy/status", get(deploy_status))
            .route("/exam-sessions/{sid}/kubespray/deploy/logs/ws", get(deploy_logs_ws))
            .with_state(self);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    pub fn set_phase(&self, phase: &str, exit_code: Option<i32>) {
        *self.inner.phase.lock().unwrap() = phase.to_string();
        *self.inner.exit_code.lock().unwrap() = exit_code;
    }

    pub fn fail_next_status_queries(&self, n: u32) {
        self.inner.status_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_fail_deploy(&self, fail: bool) {
        self.inner.fail_deploy.store(fail, Ordering::SeqCst);
    }

    pub fn set_silent_pings(&self) {
        self.inner.answer_pings.store(false, Ordering::SeqCst);
    }

    pub fn ws_connects(&self) -> u32 {
        self.inner.ws_connects.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> u32 {
        self.inner.register_calls.load(Ordering::SeqCst)
    }

    pub fn inventory_calls(&self) -> u32 {
        self.inner.inventory_calls.load(Ordering::SeqCst)
    }

    pub fn deploy_calls(&self) -> u32 {
        self.inner.deploy_calls.load(Ordering::SeqCst)
    }

    fn status_payload(&self, sid: &str) -> serde_json::Value {
        json!({
            "session_id": sid,
            "status": self.inner.phase.lock().unwrap().clone(),
            "playbook": "cluster.yml",
            "started_at": "2025-01-01T00:00:00",
            "completed_at": null,
            "exit_code": *self.inner.exit_code.lock().unwrap(),
        })
    }
}

async fn register_session(
    State(state): State<MockService>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.inner.register_calls.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::CREATED,
        Json(json!({
            "id": "sess-1",
            "question_set_id": body.get("question_set_id"),
            "vm_config_id": body.get("vm_config_id"),
            "status": "preparing",
        })),
    )
}

async fn generate_inventory(
    State(state): State<MockService>,
    Path(sid): Path<String>,
    Json(_body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.inner.inventory_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "session_id": sid,
        "inventory_path": format!("/kubespray/inventory/{}", sid),
        "generated_files": ["inventory.ini", "group_vars/all.yml"],
        "generated_at": "2025-01-01T00:00:00",
    }))
}

async fn start_deploy(
    State(state): State<MockService>,
    Path(sid): Path<String>,
    Json(_body): Json<serde_json::Value>,
) -> Response {
    state.inner.deploy_calls.fetch_add(1, Ordering::SeqCst);
    if state.inner.fail_deploy.load(Ordering::SeqCst) {
        return (
            StatusCode::CONFLICT,
            Json(json!({"detail": "another deployment is already in progress"})),
        )
            .into_response();
    }
    Json(json!({
        "session_id": sid,
        "status": "started",
        "playbook": "cluster.yml",
        "log_stream_url": format!("/exam-sessions/{}/kubespray/deploy/logs/ws", sid),
        "started_at": "2025-01-01T00:00:00",
    }))
    .into_response()
}

async fn deploy_status(State(state): State<MockService>, Path(sid): Path<String>) -> Response {
    if state.inner.status_failures.load(Ordering::SeqCst) > 0 {
        state.inner.status_failures.fetch_sub(1, Ordering::SeqCst);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "status backend unavailable"})),
        )
            .into_response();
    }
    Json(state.status_payload(&sid)).into_response()
}

async fn deploy_logs_ws(
    State(state): State<MockService>,
    Path(sid): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| drive_socket(socket, state, sid))
}

async fn drive_socket(mut socket: WebSocket, state: MockService, sid: String) {
    let connect_number = state.inner.ws_connects.fetch_add(1, Ordering::SeqCst) + 1;

    let _ = socket
        .send(Message::Text(
            json!({
                "type": "connected",
                "session_id": sid,
                "timestamp": "2025-01-01T00:00:00",
                "message": "stream established",
            })
            .to_string()
            .into(),
        ))
        .await;

    if connect_number == 1 && state.inner.drop_after_logs {
        for line in &state.inner.first_connection_logs {
            let _ = socket
                .send(Message::Text(
                    json!({
                        "type": "log",
                        "session_id": sid,
                        "data": {"timestamp": "2025-01-01T00:00:01", "message": line},
                    })
                    .to_string()
                    .into(),
                ))
                .await;
        }
        // Answer one round of client traffic, then drop the connection.
        let _ = tokio::time::timeout(Duration::from_millis(150), async {
            while let Some(Ok(message)) = socket.recv().await {
                respond(&mut socket, &state, &sid, message).await;
            }
        })
        .await;
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    if connect_number == 1 {
        for line in &state.inner.first_connection_logs {
            let _ = socket
                .send(Message::Text(
                    json!({
                        "type": "log",
                        "session_id": sid,
                        "data": {"timestamp": "2025-01-01T00:00:01", "message": line},
                    })
                    .to_string()
                    .into(),
                ))
                .await;
        }
    }

    // Long-lived connection: answer client traffic until the peer goes away.
    while let Some(Ok(message)) = socket.recv().await {
        respond(&mut socket, &state, &sid, message).await;
    }
}

async fn respond(socket: &mut WebSocket, state: &MockService, sid: &str, message: Message) {
    let Message::Text(text) = message else {
        return;
    };
    let value: serde_json::Value = match serde_json::from_str(text.as_str()) {
        Ok(value) => value,
        Err(_) => return,
    };

    match value.get("type").and_then(|t| t.as_str()) {
        Some("ping") => {
            if state.inner.answer_pings.load(Ordering::SeqCst) {
                let _ = socket
                    .send(Message::Text(
                        json!({"type": "pong", "session_id": sid}).to_string().into(),
                    ))
                    .await;
            }
        }
        Some("get_status") => {
            let _ = socket
                .send(Message::Text(
                    json!({
                        "type": "status",
                        "session_id": sid,
                        "data": state.status_payload(sid),
                    })
                    .to_string()
                    .into(),
                ))
                .await;
        }
        Some("command") => {
            let _ = socket
                .send(Message::Text(
                    json!({
                        "type": "command_received",
                        "session_id": sid,
                        "command": value.get("command"),
                        "message": "command received",
                    })
                    .to_string()
                    .into(),
                ))
                .await;
        }
        _ => {}
    }
}
