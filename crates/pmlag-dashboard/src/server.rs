//! HTTP endpoints using axum.
//!
//! `GET /api/snapshot` returns the presenter snapshot as JSON,
//! `GET /metrics` the Prometheus exposition, `GET /health` a liveness probe.

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{DashboardError, DashboardResult};
use crate::state::DashboardState;
use crate::types::DashboardSnapshot;

/// Create the axum router.
pub fn create_router(state: DashboardState) -> Router {
    Router::new()
        .route("/api/snapshot", get(get_snapshot))
        .route("/metrics", get(get_metrics))
        .route("/health", get(health))
        .with_state(state)
}

async fn get_snapshot(State(state): State<DashboardState>) -> Json<DashboardSnapshot> {
    Json(state.collect_snapshot())
}

async fn get_metrics() -> Response {
    match pmlag_telemetry::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Bind `port` and serve until `shutdown` fires.
pub async fn run_server(
    state: DashboardState,
    port: u16,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| DashboardError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!(port, "Presenter HTTP server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
