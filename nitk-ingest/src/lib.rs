//! nitk-ingest library interface
//!
//! Watches a directory for recordings, normalizes TDMS containers to WAV,
//! computes acoustic metrics, persists them to SQLite and pushes each
//! result to live subscribers. Exposed as a library for integration tests.

pub mod api;
pub mod broadcaster;
pub mod controller;
pub mod db;
pub mod decoder;
pub mod dsp;
pub mod error;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod retention;
pub mod tdms;
pub mod watcher;
pub mod waveform;

pub use crate::broadcaster::Broadcaster;
pub use crate::controller::WatchController;
pub use crate::db::ResultStore;
pub use crate::error::{ApiError, ApiResult, IngestError};
pub use crate::metrics::{AcousticMetrics, MetricsEngine};
pub use crate::normalizer::FormatNormalizer;
pub use crate::orchestrator::{MonitorState, OrchestratorOptions, Pipeline, TaskOrchestrator};

use std::sync::Arc;

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use nitk_common::events::EventBus;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Owner of the active watch session
    pub controller: Arc<WatchController>,
    pub store: ResultStore,
    /// Live result fan-out for WebSocket clients
    pub broadcaster: Broadcaster,
    /// Lifecycle events for SSE clients
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(controller: Arc<WatchController>) -> Self {
        let pipeline = controller.pipeline();
        Self {
            store: pipeline.store().clone(),
            broadcaster: pipeline.broadcaster().clone(),
            event_bus: pipeline.event_bus().clone(),
            controller,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::metrics_routes())
        .merge(api::control_routes())
        .route("/ws", get(api::live_socket))
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
