//! Server Metrics: request and ranking metrics with Prometheus + JSON export
//!
//! Request counters are lock-free atomics updated by an axum middleware;
//! ranking counters come from `RankingEngine::stats()` at scrape time, and
//! epoch rollovers are counted through a `RolloverListener`.
//!
//! ## Endpoints
//! - `GET /metrics`: Prometheus text format
//! - `GET /metrics/json`: JSON format (for the load test client)

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use ladder_core::{RolloverEvent, RolloverListener};

use crate::api::ApiState;

#[derive(Debug)]
pub struct ServerMetrics {
    /// Total HTTP requests served
    pub total_requests: AtomicU64,
    /// Total request errors (4xx + 5xx)
    pub total_errors: AtomicU64,
    /// Cumulative request duration in microseconds (for computing average)
    pub total_duration_us: AtomicU64,
    /// Epoch swaps observed across all leaderboards
    pub rollovers: AtomicU64,
    /// Of which tournament epochs
    pub tournament_rollovers: AtomicU64,
    pub start_time: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            total_duration_us: AtomicU64::new(0),
            rollovers: AtomicU64::new(0),
            tournament_rollovers: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl ServerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, duration_us: u64, is_error: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_duration_us.fetch_add(duration_us, Ordering::Relaxed);
        if is_error {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn requests_per_second(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed) as f64;
        let uptime = self.uptime_secs();
        if uptime > 0.0 { total / uptime } else { 0.0 }
    }

    pub fn avg_duration_ms(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        let dur_us = self.total_duration_us.load(Ordering::Relaxed);
        if total > 0 {
            (dur_us as f64 / total as f64) / 1000.0
        } else {
            0.0
        }
    }
}

impl RolloverListener for ServerMetrics {
    fn on_rollover(&self, event: &RolloverEvent) {
        self.rollovers.fetch_add(1, Ordering::Relaxed);
        if event.tournament {
            self.tournament_rollovers.fetch_add(1, Ordering::Relaxed);
        }
        info!(
            leaderboard = %event.leaderboard_id,
            previous_expiry = event.previous.expiry,
            expiry = event.current.expiry,
            tournament = event.tournament,
            "leaderboard reset"
        );
    }
}

// ============================================================================
// Axum Middleware: Automatic request tracking
// ============================================================================

/// Records request count and duration for every HTTP request.
pub async fn metrics_middleware(
    State(state): State<ApiState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let resp = next.run(req).await;
    let duration_us = start.elapsed().as_micros() as u64;
    let is_error = resp.status().is_client_error() || resp.status().is_server_error();

    state.metrics.record_request(duration_us, is_error);
    resp
}

// ============================================================================
// GET /metrics: Prometheus text exposition format
// ============================================================================

pub async fn prometheus_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let m = &state.metrics;
    let total_requests = m.total_requests.load(Ordering::Relaxed);
    let total_errors = m.total_errors.load(Ordering::Relaxed);
    let total_dur_us = m.total_duration_us.load(Ordering::Relaxed);
    let rollovers = m.rollovers.load(Ordering::Relaxed);
    let tournament_rollovers = m.tournament_rollovers.load(Ordering::Relaxed);
    let uptime = m.uptime_secs();
    let rps = m.requests_per_second();
    let stats = state.engine.stats();

    let avg_req_duration_s = if total_requests > 0 {
        (total_dur_us as f64 / total_requests as f64) / 1_000_000.0
    } else {
        0.0
    };

    let body = format!(
        "# HELP ladder_requests_total Total HTTP requests served\n\
         # TYPE ladder_requests_total counter\n\
         ladder_requests_total {total_requests}\n\
         \n\
         # HELP ladder_request_errors_total Total HTTP request errors (4xx/5xx)\n\
         # TYPE ladder_request_errors_total counter\n\
         ladder_request_errors_total {total_errors}\n\
         \n\
         # HELP ladder_request_duration_seconds Average request duration\n\
         # TYPE ladder_request_duration_seconds gauge\n\
         ladder_request_duration_seconds {avg_req_duration_s:.6}\n\
         \n\
         # HELP ladder_requests_per_second Current request throughput\n\
         # TYPE ladder_requests_per_second gauge\n\
         ladder_requests_per_second {rps:.2}\n\
         \n\
         # HELP ladder_leaderboards Configured leaderboards (tournaments included)\n\
         # TYPE ladder_leaderboards gauge\n\
         ladder_leaderboards {leaderboards}\n\
         \n\
         # HELP ladder_tournaments Configured tournaments\n\
         # TYPE ladder_tournaments gauge\n\
         ladder_tournaments {tournaments}\n\
         \n\
         # HELP ladder_rank_buckets Rank cache buckets held in memory\n\
         # TYPE ladder_rank_buckets gauge\n\
         ladder_rank_buckets {rank_buckets}\n\
         \n\
         # HELP ladder_record_writes_total Records written\n\
         # TYPE ladder_record_writes_total counter\n\
         ladder_record_writes_total {record_writes}\n\
         \n\
         # HELP ladder_cache_rebuilds_total Rank buckets rebuilt from the record store\n\
         # TYPE ladder_cache_rebuilds_total counter\n\
         ladder_cache_rebuilds_total {cache_rebuilds}\n\
         \n\
         # HELP ladder_cache_write_failures_total Rank cache updates that failed after a store write\n\
         # TYPE ladder_cache_write_failures_total counter\n\
         ladder_cache_write_failures_total {cache_write_failures}\n\
         \n\
         # HELP ladder_rollovers_total Epoch resets observed\n\
         # TYPE ladder_rollovers_total counter\n\
         ladder_rollovers_total {rollovers}\n\
         \n\
         # HELP ladder_tournament_rollovers_total Tournament epoch resets observed\n\
         # TYPE ladder_tournament_rollovers_total counter\n\
         ladder_tournament_rollovers_total {tournament_rollovers}\n\
         \n\
         # HELP ladder_uptime_seconds Server uptime\n\
         # TYPE ladder_uptime_seconds gauge\n\
         ladder_uptime_seconds {uptime:.2}\n",
        leaderboards = stats.leaderboards,
        tournaments = stats.tournaments,
        rank_buckets = stats.rank_buckets,
        record_writes = stats.record_writes,
        cache_rebuilds = stats.cache_rebuilds,
        cache_write_failures = stats.cache_write_failures,
    );

    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

// ============================================================================
// GET /metrics/json: JSON format for load test clients
// ============================================================================

#[derive(Serialize)]
pub struct JsonMetrics {
    pub uptime_secs: f64,
    pub total_requests: u64,
    pub total_errors: u64,
    pub rps: f64,
    pub avg_request_duration_ms: f64,
    pub leaderboards: usize,
    pub tournaments: usize,
    pub rank_buckets: usize,
    pub record_writes: u64,
    pub cache_rebuilds: u64,
    pub cache_write_failures: u64,
    pub rollovers: u64,
}

pub async fn json_metrics_handler(State(state): State<ApiState>) -> Json<JsonMetrics> {
    let m = &state.metrics;
    let stats = state.engine.stats();

    Json(JsonMetrics {
        uptime_secs: m.uptime_secs(),
        total_requests: m.total_requests.load(Ordering::Relaxed),
        total_errors: m.total_errors.load(Ordering::Relaxed),
        rps: m.requests_per_second(),
        avg_request_duration_ms: m.avg_duration_ms(),
        leaderboards: stats.leaderboards,
        tournaments: stats.tournaments,
        rank_buckets: stats.rank_buckets,
        record_writes: stats.record_writes,
        cache_rebuilds: stats.cache_rebuilds,
        cache_write_failures: stats.cache_write_failures,
        rollovers: m.rollovers.load(Ordering::Relaxed),
    })
}

// ============================================================================
// Tests
// ============================================================================
