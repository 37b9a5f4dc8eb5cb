//! Monitoring control endpoints

use std::path::PathBuf;

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::info;

use super::Envelope;
use crate::controller::WatchStatus;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangeDirectoryRequest {
    pub watch_directory: PathBuf,
}

/// POST /change_watch_directory
pub async fn change_watch_directory(
    State(state): State<AppState>,
    Json(request): Json<ChangeDirectoryRequest>,
) -> ApiResult<Json<Envelope<WatchStatus>>> {
    if request.watch_directory.as_os_str().is_empty() {
        return Err(ApiError::BadRequest("watch_directory is empty".to_string()));
    }
    info!("Watch directory change requested: {}", request.watch_directory.display());

    state.controller.change_directory(&request.watch_directory).await?;
    Ok(Envelope::ok(
        state.controller.status().await,
        "watch directory changed",
    ))
}

/// POST /monitoring/start
pub async fn start_monitoring(State(state): State<AppState>) -> ApiResult<Json<Envelope<WatchStatus>>> {
    state.controller.start().await?;
    Ok(Envelope::ok(state.controller.status().await, "monitoring started"))
}

/// POST /monitoring/stop
pub async fn stop_monitoring(State(state): State<AppState>) -> Json<Envelope<WatchStatus>> {
    state.controller.stop().await;
    Envelope::ok(state.controller.status().await, "monitoring stopped")
}

pub fn control_routes() -> Router<AppState> {
    Router::new()
        .route("/change_watch_directory", post(change_watch_directory))
        .route("/monitoring/start", post(start_monitoring))
        .route("/monitoring/stop", post(stop_monitoring))
}
