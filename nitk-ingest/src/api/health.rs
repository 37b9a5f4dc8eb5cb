//! Health and status endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::orchestrator::MonitorState;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("nitk-ingest")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Whether a watch session is live
    pub monitoring: bool,
    /// Connected WebSocket clients
    pub live_clients: usize,
    /// Connected SSE clients
    pub event_listeners: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// "running" while monitoring, otherwise "stopped"
    pub status: String,
    pub watch_directory: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let status = state.controller.status().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "nitk-ingest".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        monitoring: status.state == MonitorState::Monitoring,
        live_clients: state.broadcaster.subscriber_count().await,
        event_listeners: state.event_bus.subscriber_count(),
    })
}

/// GET /status
pub async fn watch_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.controller.status().await;
    let label = match status.state {
        MonitorState::Monitoring => "running",
        MonitorState::Idle => "stopped",
    };

    Json(StatusResponse {
        status: label.to_string(),
        watch_directory: status.watch_directory.display().to_string(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(watch_status))
}
