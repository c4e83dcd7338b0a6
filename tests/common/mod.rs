//! Test utilities and common setup.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use roost::api::{create_router, AppState};
use roost::bus::EventBus;
use roost::db::Database;
use roost::hub::Hub;
use roost::sharedfs::SharedFs;
use roost::store::Store;
use roost::ws::PushRegistry;

/// A fully assembled hub over an in-memory database and a temp shared dir.
pub struct TestHub {
    pub app: Router,
    pub hub: Arc<Hub>,
    pub db: Database,
    /// Keeps the sandbox root alive for the test's duration.
    pub shared: Arc<TempDir>,
}

/// Create a fresh test hub.
pub async fn test_hub() -> TestHub {
    let db = Database::in_memory().await.unwrap();
    let shared = Arc::new(TempDir::new().unwrap());
    build_hub(db, shared).await
}

/// Assemble a hub over an existing database, hydrating from it. Building a
/// second hub on the same database simulates a process restart.
pub async fn build_hub(db: Database, shared: Arc<TempDir>) -> TestHub {
    let store = Store::new(db.pool().clone());
    let bus = EventBus::new();
    let registry = Arc::new(PushRegistry::new());
    let hub = Arc::new(Hub::new(
        store,
        bus,
        registry,
        shared.path().to_path_buf(),
    ));
    hub.hydrate().await.unwrap();

    let files = SharedFs::new(shared.path()).unwrap();
    let app = create_router(AppState::new(hub.clone(), files));

    TestHub {
        app,
        hub,
        db,
        shared,
    }
}

impl TestHub {
    /// Restart: rebuild state and router from the same database.
    pub async fn restart(self) -> TestHub {
        build_hub(self.db, self.shared).await
    }
}

/// POST a JSON body, returning status and parsed response body.
pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method(Method::POST)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    read_json(response).await
}

/// GET, returning status and parsed response body.
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    read_json(response).await
}

/// Send a request with an arbitrary method and raw body, returning status
/// and raw bytes.
pub async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    body: Vec<u8>,
) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method(method)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Join an agent to a room, asserting success.
pub async fn join(app: &Router, room: &str, agent_id: &str, agent_name: &str) {
    let (status, body) = post_json(
        app,
        &format!("/api/join/{room}"),
        serde_json::json!({ "agentId": agent_id, "agentName": agent_name }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "join failed: {body}");
    assert_eq!(body["success"], true);
}

/// Send a message from an agent, asserting success; returns the response.
pub async fn send(app: &Router, agent_id: &str, content: &str) -> Value {
    let (status, body) = post_json(
        app,
        "/api/send",
        serde_json::json!({ "agentId": agent_id, "content": content }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "send failed: {body}");
    body
}
