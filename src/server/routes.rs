//! Axum route handlers for the accumulator's ambient HTTP surface.
//!
//! # Routes
//!
//! - `GET /health`  — Returns `{"status": "ok", "version": "..."}`
//! - `GET /metrics` — Returns per-kind pool stats and the registry's
//!   in-flight count, as a plain JSON snapshot (no Prometheus exposition
//!   format — this crate leaves that translation to its embedder).

use std::sync::Arc;

use axum::{response::IntoResponse, routing::get, Json, Router};
use tower_http::cors::CorsLayer;

use crate::accumulator::StreamDispatcher;

/// Shared application state for the HTTP server: a handle to the
/// dispatcher whose pools and registry back the `/metrics` snapshot.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<StreamDispatcher>,
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

/// GET /metrics — pool and registry snapshot for operational visibility.
async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    let pools = state
        .dispatcher
        .pools()
        .stats()
        .into_iter()
        .map(|(kind, stats)| {
            serde_json::json!({
                "kind": kind,
                "available": stats.available,
                "acquired_total": stats.acquired_total,
                "released_total": stats.released_total,
            })
        })
        .collect::<Vec<_>>();

    let registry = state.dispatcher.registry().stats();

    Json(serde_json::json!({
        "pools": pools,
        "registry": { "in_flight": registry.in_flight },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::AccumulatorConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            dispatcher: Arc::new(StreamDispatcher::new(&AccumulatorConfig::default(), None)),
        }
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let app = app_router(test_state());
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn metrics_endpoint_reports_five_pools() {
        let app = app_router(test_state());
        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["pools"].as_array().unwrap().len(), 5);
        assert_eq!(json["registry"]["in_flight"], 0);
    }
}
