use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use crate::engine::EngineSnapshot;
use crate::sensors::FieldValue;

/// Read-only view onto the engine: the API never touches engine state
/// directly, it only reads the latest snapshot the scheduler published.
#[derive(Clone)]
pub struct AppState {
    pub snapshots: watch::Receiver<Arc<EngineSnapshot>>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(snapshots: watch::Receiver<Arc<EngineSnapshot>>) -> Self {
        Self {
            snapshots,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    fn latest(&self) -> Arc<EngineSnapshot> {
        self.snapshots.borrow().clone()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(metrics))
        .route("/debug/snapshot", get(debug_snapshot))
        .route("/debug/values", get(debug_values))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(h) => h.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

async fn debug_snapshot(State(state): State<AppState>) -> Json<EngineSnapshot> {
    Json(state.latest().as_ref().clone())
}

async fn debug_values(State(state): State<AppState>) -> Json<BTreeMap<String, FieldValue>> {
    Json(state.latest().values.clone())
}
