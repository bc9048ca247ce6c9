//! HTTP surface
//!
//! Two entry points: `GET /ping` wraps the health cache and never touches
//! the pipeline; every other method/path falls through to the Auth Gateway.

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use bucketgate_health::{HealthCache, ProbeOutcome};

use crate::pipeline::Gateway;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub health: Arc<HealthCache>,
}

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .fallback(proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness endpoint backed by the single-slot probe cache
async fn ping(State(state): State<AppState>) -> Response {
    let (status, body) = match state.health.status(Instant::now()).await {
        Some(ProbeOutcome::Ok) => (StatusCode::OK, "pong".to_string()),
        Some(ProbeOutcome::Failed(reason)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("storage not available - {reason}"),
        ),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read status cache".to_string(),
        ),
    };

    Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(Body::from(body))
        .expect("valid response")
}

/// Every non-liveness request runs the pipeline
async fn proxy(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    state.gateway.handle(request, client_addr).await
}
