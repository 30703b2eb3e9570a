//! Health check handlers
//!
//! - /health - broker status with registry sizes
//! - /health/live - simple liveness (is the process running?)
//! - /health/ready - readiness (can it serve traffic?)

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::state::AppState;

/// Simple health response for liveness/readiness probes
#[derive(Serialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub tenants: usize,
    pub upstream_registrations: usize,
    pub pending_logouts: usize,
}

/// Start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

fn get_uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(Instant::now);
    start.elapsed().as_secs()
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: get_uptime_seconds(),
        tenants: state.tenants.tenant_ids().len(),
        upstream_registrations: state.upstreams.len(),
        pending_logouts: state.logout_states.len(),
    })
}

/// Kubernetes liveness probe; never checks dependencies.
pub async fn liveness() -> (StatusCode, Json<SimpleHealthResponse>) {
    (
        StatusCode::OK,
        Json(SimpleHealthResponse {
            status: "alive".to_string(),
        }),
    )
}

/// Kubernetes readiness probe; pings the database when one is configured.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<SimpleHealthResponse>) {
    let db_ok = match &state.db_pool {
        Some(pool) => matches!(
            tokio::time::timeout(Duration::from_secs(2), federa_db::ping(pool)).await,
            Ok(Ok(()))
        ),
        None => true,
    };

    if db_ok {
        (
            StatusCode::OK,
            Json(SimpleHealthResponse {
                status: "ready".to_string(),
            }),
        )
    } else {
        warn!("Readiness check failed: database unavailable");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SimpleHealthResponse {
                status: "not ready: database unavailable".to_string(),
            }),
        )
    }
}
