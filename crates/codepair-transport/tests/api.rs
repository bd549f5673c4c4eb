use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use codepair_session::{SessionHub, storage::MemoryStore};
use codepair_transport::{TransportConfig, router};
use serde_json::Value;
use tower::ServiceExt;

fn app() -> (Router, Arc<SessionHub<MemoryStore>>) {
    let hub = Arc::new(SessionHub::new(MemoryStore::new()));
    (router(Arc::clone(&hub), TransportConfig::default()), hub)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn create_session_returns_defaults() {
    let (app, hub) = app();

    let (status, body) = call(&app, post("/sessions")).await;
    assert_eq!(status, StatusCode::OK);

    let id = body["session_id"].as_str().unwrap();
    assert_eq!(id.len(), 8);
    assert_eq!(body["session"]["id"], id);
    assert_eq!(body["session"]["code"], "# Write your code here\n");
    assert_eq!(body["session"]["language"], "python");
    assert_eq!(body["session"]["participants"], 0);
    assert!(body["session"]["created_at"].as_i64().unwrap() > 0);
    assert_eq!(hub.store().len(), 1);
}

#[tokio::test]
async fn get_existing_session() {
    let (app, hub) = app();
    let sid = hub.create_session().unwrap();

    let (status, body) = call(&app, get(&format!("/sessions/{sid}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], sid.as_str());
    assert_eq!(body["language"], "python");
    assert_eq!(body["participants"], 0);
}

#[tokio::test]
async fn get_missing_session_is_404() {
    let (app, _hub) = app();

    let (status, body) = call(&app, get("/sessions/nonexistent")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Session not found");
}

#[tokio::test]
async fn created_ids_are_unique() {
    let (app, _hub) = app();
    let mut ids = std::collections::HashSet::new();

    for _ in 0..5 {
        let (_, body) = call(&app, post("/sessions")).await;
        ids.insert(body["session_id"].as_str().unwrap().to_owned());
    }
    assert_eq!(ids.len(), 5);
}
