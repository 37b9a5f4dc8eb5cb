//! HTTP API handlers for nitk-ingest
//!
//! Query and control endpoints answer with the `{code, data, message}`
//! envelope; failures use the `ApiError` body instead.

pub mod control;
pub mod health;
pub mod metrics;
pub mod sse;
pub mod ws;

pub use control::control_routes;
pub use health::health_routes;
pub use metrics::metrics_routes;
pub use sse::event_stream;
pub use ws::live_socket;

use axum::Json;
use serde::Serialize;

/// Success envelope shared by the query and control endpoints
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub data: T,
    pub message: String,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            code: 200,
            data,
            message: message.into(),
        })
    }
}
