//! HTTP/JSON API Layer
//!
//! Provides REST-like endpoints following gRPC path conventions.
//!
//! ## Architecture
//! ```text
//! Game backend / admin tooling
//!       ↓ HTTP POST, JSON body
//! Axum Router (port 50051)
//!       ↓
//! Service Handlers (leaderboard, tournament)
//!       ↓
//! RankingEngine (ladder-core) ──► LmdbStore | MemoryRecordStore
//! ```
//!
//! ## Endpoint Convention
//! All endpoints follow gRPC path pattern: `POST /ladder.<Service>/<Method>`
//! Example: `POST /ladder.LeaderboardService/WriteRecord`

pub mod error;
pub mod leaderboard;
pub mod tournament;

use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use ladder_core::RankingEngine;

use crate::metrics::ServerMetrics;

/// Shared state available to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<RankingEngine>,
    /// Server-wide metrics (lock-free atomics)
    pub metrics: Arc<ServerMetrics>,
}

impl ApiState {
    /// State with fresh metrics registered as the engine's rollover listener.
    pub fn new(engine: Arc<RankingEngine>) -> Self {
        let metrics = ServerMetrics::new();
        engine.add_rollover_listener(metrics.clone());
        Self { engine, metrics }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the full API router with all service endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(crate::metrics::prometheus_handler))
        .route("/metrics/json", get(crate::metrics::json_metrics_handler))
        .merge(leaderboard::routes())
        .merge(tournament::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on `port` until `shutdown` resolves.
pub async fn start_api_server<F>(
    state: ApiState,
    port: u16,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
