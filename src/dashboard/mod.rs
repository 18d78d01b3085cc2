use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

use crate::janitor::JanitorStats;

#[derive(Clone)]
pub struct DashboardState {
    pub stats: Arc<RwLock<JanitorStats>>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Routes served by the status endpoint.
pub fn router(state: DashboardState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/status", get(status_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn run_dashboard(addr: SocketAddr, state: DashboardState) {
    tracing::info!(addr = %addr, "Starting status server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind status server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, router(state)).await {
        tracing::error!(error = %e, "Status server failed");
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn status_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let stats = state.stats.read().await.clone();
    Json(stats)
}
