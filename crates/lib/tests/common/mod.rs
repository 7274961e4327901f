//! Mock Direct Line service, channel connector and notifier endpoint for integration tests.
//! Each mock runs on its own free port; server tasks are left running when a test ends.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BOT_NAME: &str = "Contoso Agent";

pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Serve `router` on a free loopback port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

/// Poll `check` every 20ms for up to 3s.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    for _ in 0..150 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Activity log of a fake Direct Line service. The watermark is the number of activities read.
#[derive(Default)]
pub struct DirectLineLog {
    pub conversations: HashMap<String, Vec<Value>>,
    pub opened: usize,
    /// Authorization header of every open request.
    pub open_auth: Vec<String>,
    /// `watermark` query parameter of every read, None when absent.
    pub reads: Vec<Option<String>>,
}

pub type SharedLog = Arc<Mutex<DirectLineLog>>;

fn reply_for(text: &str) -> String {
    if text == "hello" {
        "hi there".to_string()
    } else {
        format!("you said: {}", text)
    }
}

async fn dl_open(State(log): State<SharedLog>, headers: HeaderMap) -> Json<Value> {
    let mut log = log.lock().unwrap();
    log.opened += 1;
    let n = log.opened;
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    log.open_auth.push(auth);
    let id = format!("agent-{}", n);
    log.conversations.insert(id.clone(), Vec::new());
    Json(json!({ "conversationId": id, "token": format!("session-{}", n), "expires_in": 1800 }))
}

async fn dl_post(
    State(log): State<SharedLog>,
    Path(id): Path<String>,
    Json(activity): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let mut log = log.lock().unwrap();
    let entries = log.conversations.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    let text = activity
        .get("text")
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_string();
    entries.push(activity);
    let activity_id = format!("{}|{:07}", id, entries.len() - 1);
    entries.push(json!({
        "type": "message",
        "from": { "id": "agent-bot", "name": BOT_NAME },
        "text": reply_for(&text),
    }));
    Ok(Json(json!({ "id": activity_id })))
}

async fn dl_get(
    State(log): State<SharedLog>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    let mut log = log.lock().unwrap();
    log.reads.push(query.get("watermark").cloned());
    let entries = log.conversations.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let from: usize = query
        .get("watermark")
        .and_then(|w| w.parse().ok())
        .unwrap_or(0);
    let activities: Vec<Value> = entries.iter().skip(from).cloned().collect();
    Ok(Json(json!({
        "activities": activities,
        "watermark": entries.len().to_string(),
    })))
}

async fn dl_token() -> Json<Value> {
    Json(json!({ "token": "dl-token", "expires_in": 3600 }))
}

/// Start a fake Direct Line service. Returns its `/v3/directline` base URL and the shared log.
pub async fn spawn_direct_line() -> (String, SharedLog) {
    let log: SharedLog = Arc::default();
    let router = Router::new()
        .route("/token", get(dl_token))
        .route("/v3/directline/conversations", post(dl_open))
        .route(
            "/v3/directline/conversations/:id/activities",
            post(dl_post).get(dl_get),
        )
        .with_state(log.clone());
    let base = serve(router).await;
    (format!("{}/v3/directline", base), log)
}

/// Requests received by the fake channel connector / notifier: (path, body).
pub type Received = Arc<Mutex<Vec<(String, Value)>>>;

async fn record(
    State(received): State<Received>,
    uri: axum::http::Uri,
    Json(body): Json<Value>,
) -> Json<Value> {
    received.lock().unwrap().push((uri.path().to_string(), body));
    Json(json!({ "id": "reply-1" }))
}

/// Fake channel connector accepting `/v3/conversations/...` activity posts.
pub async fn spawn_connector() -> (String, Received) {
    let received: Received = Arc::default();
    let router = Router::new()
        .route("/v3/conversations/:conv/activities", post(record))
        .route("/v3/conversations/:conv/activities/:reply_to", post(record))
        .with_state(received.clone());
    (serve(router).await, received)
}

/// Requests received by a fake notifier endpoint: (Authorization header, body).
pub type NotifyLog = Arc<Mutex<Vec<(Option<String>, Value)>>>;

async fn record_notify(
    State((log, status)): State<(NotifyLog, StatusCode)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    log.lock().unwrap().push((auth, body));
    status
}

/// Fake notifier endpoint at `/flow` that records headers and answers with `status`.
pub async fn spawn_notify_endpoint_with_status(status: StatusCode) -> (String, NotifyLog) {
    let log: NotifyLog = Arc::default();
    let router = Router::new()
        .route("/flow", post(record_notify))
        .with_state((log.clone(), status));
    (format!("{}/flow", serve(router).await), log)
}

/// Fake bootstrap notification endpoint at `/flow`.
pub async fn spawn_notify_endpoint() -> (String, Received) {
    let received: Received = Arc::default();
    let router = Router::new()
        .route("/flow", post(record))
        .with_state(received.clone());
    (format!("{}/flow", serve(router).await), received)
}
