//! In-process mock of the BeatChecker background service
//!
//! Binds `127.0.0.1:0`, serves the seven routes of the HTTP contract and
//! records every request. Each route has a default reply; one-shot replies
//! can be queued in front of it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

pub const HEALTH: &str = "health";
pub const ANALYZE: &str = "analyze";
pub const DOWNLOAD: &str = "download";
pub const STATUS: &str = "license/status";
pub const ACTIVATE: &str = "license/activate";
pub const REFRESH: &str = "license/refresh";
pub const DEACTIVATE: &str = "license/deactivate";

pub const TRACK_BYTES: &[u8] = b"ID3\x04\x00fake-mp3-payload";

#[derive(Debug, Clone)]
pub enum ReplyBody {
    Json(Value),
    Raw(Vec<u8>),
    Empty,
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: ReplyBody,
    pub delay: Duration,
}

impl Reply {
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            body: ReplyBody::Json(body),
            delay: Duration::ZERO,
        }
    }

    pub fn raw(status: u16, body: &[u8]) -> Self {
        Self {
            status,
            body: ReplyBody::Raw(body.to_vec()),
            delay: Duration::ZERO,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: ReplyBody::Empty,
            delay: Duration::ZERO,
        }
    }

    /// Error reply with a `{ "detail": ... }` body
    pub fn detail(status: u16, detail: &str) -> Self {
        Self {
            status,
            body: ReplyBody::Json(json!({ "detail": detail })),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One request as the mock saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub route: &'static str,
    pub body: Option<Value>,
    pub query: HashMap<String, String>,
}

#[derive(Default)]
pub struct MockState {
    defaults: Mutex<HashMap<&'static str, Reply>>,
    queued: Mutex<HashMap<&'static str, VecDeque<Reply>>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockState {
    fn next_reply(&self, route: &'static str) -> Reply {
        if let Some(reply) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(route)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        self.defaults
            .lock()
            .unwrap()
            .get(route)
            .cloned()
            .unwrap_or_else(|| Reply::detail(404, "Not Found"))
    }
}

pub struct MockService {
    pub base_url: String,
    state: Arc<MockState>,
    handle: Option<JoinHandle<()>>,
}

impl MockService {
    /// Start with replies for a licensed, healthy service
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        {
            let mut defaults = state.defaults.lock().unwrap();
            defaults.insert(HEALTH, Reply::json(json!({ "status": "ok", "license_active": true })));
            defaults.insert(ANALYZE, Reply::json(analysis_json(140.0, "C# Minor")));
            defaults.insert(DOWNLOAD, Reply::raw(200, TRACK_BYTES));
            defaults.insert(STATUS, Reply::json(active_status()));
            defaults.insert(
                ACTIVATE,
                Reply::json(json!({
                    "message": "License activated successfully.",
                    "status": active_status(),
                })),
            );
            defaults.insert(REFRESH, Reply::json(active_status()));
            defaults.insert(
                DEACTIVATE,
                Reply::json(json!({ "message": "License deactivated successfully." })),
            );
        }

        let app = Router::new()
            .route("/health", get(health))
            .route("/analyze", post(analyze))
            .route("/download", get(download))
            .route("/license/status", get(status))
            .route("/license/activate", post(activate))
            .route("/license/refresh", post(refresh))
            .route("/license/deactivate", post(deactivate))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            handle: Some(handle),
        }
    }

    /// Replace the default reply for `route`
    pub fn set(&self, route: &'static str, reply: Reply) {
        self.state.defaults.lock().unwrap().insert(route, reply);
    }

    /// Queue a one-shot reply for `route`
    pub fn push(&self, route: &'static str, reply: Reply) {
        self.state
            .queued
            .lock()
            .unwrap()
            .entry(route)
            .or_default()
            .push_back(reply);
    }

    pub fn hits(&self, route: &str) -> usize {
        self.requests(route).len()
    }

    pub fn requests(&self, route: &str) -> Vec<Recorded> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.route == route)
            .cloned()
            .collect()
    }

    /// Stop listening; later connections are refused
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

pub fn analysis_json(bpm: f64, key: &str) -> Value {
    json!({
        "url": "https://www.youtube.com/watch?v=abc123",
        "bpm": bpm,
        "key": key,
        "file_path": "/srv/beatchecker/downloads/Cold Nights.mp3",
        "filename": "Cold Nights.mp3",
    })
}

pub fn active_status() -> Value {
    json!({
        "product_id": 31405,
        "active": true,
        "license_key": "***MNOP",
        "expires_at": "2099-01-01T00:00:00",
        "customer_name": "Jordan",
        "max_machines": 2,
        "activated_machines": 1,
        "blocked": false,
        "message": null,
    })
}

pub fn no_license_status() -> Value {
    json!({ "active": false, "license_key": null, "message": "BeatChecker is not activated." })
}

pub fn blocked_status() -> Value {
    json!({
        "active": false,
        "license_key": "***MNOP",
        "blocked": true,
        "message": "This license has been blocked.",
    })
}

pub fn expired_status() -> Value {
    json!({
        "active": false,
        "license_key": "***MNOP",
        "blocked": false,
        "expires_at": "2020-06-30T00:00:00",
        "message": "License expired.",
    })
}

// ========================================
// Handlers
// ========================================

async fn respond(
    state: &MockState,
    route: &'static str,
    body: Option<Value>,
    query: HashMap<String, String>,
) -> Response {
    state.requests.lock().unwrap().push(Recorded { route, body, query });

    let reply = state.next_reply(route);
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let status = StatusCode::from_u16(reply.status).unwrap();
    match reply.body {
        ReplyBody::Json(value) => (status, Json(value)).into_response(),
        ReplyBody::Raw(bytes) => (status, bytes).into_response(),
        ReplyBody::Empty => status.into_response(),
    }
}

fn parse_body(bytes: &Bytes) -> Option<Value> {
    serde_json::from_slice(bytes).ok()
}

async fn health(State(state): State<Arc<MockState>>) -> Response {
    respond(&state, HEALTH, None, HashMap::new()).await
}

async fn analyze(State(state): State<Arc<MockState>>, body: Bytes) -> Response {
    respond(&state, ANALYZE, parse_body(&body), HashMap::new()).await
}

async fn download(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    respond(&state, DOWNLOAD, None, query).await
}

async fn status(State(state): State<Arc<MockState>>) -> Response {
    respond(&state, STATUS, None, HashMap::new()).await
}

async fn activate(State(state): State<Arc<MockState>>, body: Bytes) -> Response {
    respond(&state, ACTIVATE, parse_body(&body), HashMap::new()).await
}

async fn refresh(State(state): State<Arc<MockState>>) -> Response {
    respond(&state, REFRESH, None, HashMap::new()).await
}

async fn deactivate(State(state): State<Arc<MockState>>) -> Response {
    respond(&state, DEACTIVATE, None, HashMap::new()).await
}
