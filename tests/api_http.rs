// tests/api_http.rs
//
// HTTP-level tests for the debug/metrics Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use serde_json::Value as Json;
use tokio::sync::watch;
use tower::ServiceExt as _; // for `oneshot`

use weather_gateway::api::{create_router, AppState};
use weather_gateway::engine::EngineSnapshot;
use weather_gateway::sensors::FieldValue;

const BODY_LIMIT: usize = 1024 * 1024;

fn snapshot() -> EngineSnapshot {
    let mut s = EngineSnapshot {
        at: 1_715_681_100,
        ..Default::default()
    };
    s.values.insert("tempf".into(), FieldValue::Number(68.0));
    s.values.insert("lightning_time".into(), FieldValue::Text("0".into()));
    s.rain.daily = 0.039;
    s
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, String::from_utf8(bytes).expect("utf8"))
}

#[tokio::test]
async fn health_returns_ok() {
    let (_tx, rx) = watch::channel(Arc::new(EngineSnapshot::default()));
    let (status, body) = get(create_router(AppState::new(rx)), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.trim(), "OK");
}

#[tokio::test]
async fn values_reflect_latest_published_snapshot() {
    let (tx, rx) = watch::channel(Arc::new(EngineSnapshot::default()));
    let app = create_router(AppState::new(rx));

    let (_, body) = get(app.clone(), "/debug/values").await;
    assert_eq!(body, "{}");

    tx.send_replace(Arc::new(snapshot()));
    let (status, body) = get(app, "/debug/values").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_str(&body).unwrap();
    assert_eq!(v["tempf"], 68.0);
    assert_eq!(v["lightning_time"], "0");
}

#[tokio::test]
async fn snapshot_exposes_accumulator_views() {
    let (_tx, rx) = watch::channel(Arc::new(snapshot()));
    let (status, body) = get(create_router(AppState::new(rx)), "/debug/snapshot").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_str(&body).unwrap();
    assert_eq!(v["at"], 1_715_681_100i64);
    assert_eq!(v["rain"]["daily"], 0.039);
    assert_eq!(v["lightning"]["all_years"], 0.0);
}

#[tokio::test]
async fn metrics_is_404_without_recorder() {
    let (_tx, rx) = watch::channel(Arc::new(EngineSnapshot::default()));
    let (status, _) = get(create_router(AppState::new(rx)), "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
