//! Result query endpoints
//!
//! POST /latest_metrics, POST /all_metrics, GET /history, POST /cleanup,
//! POST /power_spectrum

use std::path::{Path, PathBuf};

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use nitk_common::time::from_db_string;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Envelope;
use crate::db::HistoryOrder;
use crate::decoder::decode_file;
use crate::error::{ApiError, ApiResult, IngestError};
use crate::metrics::PowerSpectrum;
use crate::models::StoredResult;
use crate::AppState;

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 1000;
const DEFAULT_SPECTRUM_NFFT: usize = 4096;
const MAX_SPECTRUM_NFFT: usize = 1 << 20;

#[derive(Debug, Deserialize)]
pub struct LatestMetricsRequest {
    pub microphone_channel: String,
}

#[derive(Debug, Deserialize)]
pub struct AllMetricsRequest {
    pub microphone_channel: String,
    /// RFC 3339; only results at or after this instant
    pub start_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    #[serde(default)]
    pub order: HistoryOrder,
}

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    pub days: u32,
}

#[derive(Debug, Deserialize)]
pub struct PowerSpectrumRequest {
    /// WAV file, absolute or relative to the watched directory
    pub file_path: String,
    pub nfft: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: u64,
    pub days: u32,
}

/// POST /latest_metrics
///
/// Latest result for a channel, restricted to the directory being watched.
pub async fn latest_metrics(
    State(state): State<AppState>,
    Json(request): Json<LatestMetricsRequest>,
) -> ApiResult<Json<Envelope<Option<StoredResult>>>> {
    let watch_directory = state.controller.watch_directory().await;
    let file_dir = watch_directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!(file_dir, channel = %request.microphone_channel, "Latest metrics query");

    let result = state
        .store
        .latest_for_channel(&file_dir, &request.microphone_channel)
        .await?;
    let message = if result.is_some() { "ok" } else { "no results" };
    Ok(Envelope::ok(result, message))
}

/// POST /all_metrics
pub async fn all_metrics(
    State(state): State<AppState>,
    Json(request): Json<AllMetricsRequest>,
) -> ApiResult<Json<Envelope<Vec<StoredResult>>>> {
    let since = match request.start_time.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(from_db_string(raw).ok_or_else(|| {
            ApiError::BadRequest(format!("start_time is not an RFC 3339 timestamp: {}", raw))
        })?),
    };

    let results = state
        .store
        .all_for_channel(&request.microphone_channel, since)
        .await?;
    let message = format!("{} result(s)", results.len());
    Ok(Envelope::ok(results, message))
}

/// GET /history
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Envelope<Vec<StoredResult>>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_HISTORY_LIMIT
        )));
    }

    let results = state
        .store
        .get_history(limit, query.offset.unwrap_or(0), query.order)
        .await?;
    let message = format!("{} result(s)", results.len());
    Ok(Envelope::ok(results, message))
}

/// POST /cleanup
pub async fn cleanup(
    State(state): State<AppState>,
    Json(request): Json<CleanupRequest>,
) -> ApiResult<Json<Envelope<CleanupResponse>>> {
    let removed = state.store.cleanup(request.days).await?;
    info!(removed, days = request.days, "Manual cleanup");
    Ok(Envelope::ok(
        CleanupResponse {
            removed,
            days: request.days,
        },
        "cleanup complete",
    ))
}

/// POST /power_spectrum
///
/// Narrowband spectrum of a WAV file inside the watched directory.
pub async fn power_spectrum(
    State(state): State<AppState>,
    Json(request): Json<PowerSpectrumRequest>,
) -> ApiResult<Json<Envelope<PowerSpectrum>>> {
    let nfft = request.nfft.unwrap_or(DEFAULT_SPECTRUM_NFFT);
    if !(2..=MAX_SPECTRUM_NFFT).contains(&nfft) {
        return Err(ApiError::BadRequest(format!(
            "nfft must be between 2 and {}",
            MAX_SPECTRUM_NFFT
        )));
    }

    let watch_directory = state.controller.watch_directory().await;
    let path = resolve_in_watch_directory(&watch_directory, &request.file_path)?;
    debug!(path = %path.display(), nfft, "Power spectrum query");

    let engine = state.controller.pipeline().engine();
    let spectrum = tokio::task::spawn_blocking(move || {
        let waveform = decode_file(&path)?;
        Ok::<_, IngestError>(engine.power_spectrum(&waveform, nfft))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("spectrum task failed: {}", e)))??;

    let message = format!("{} bin(s)", spectrum.frequencies.len());
    Ok(Envelope::ok(spectrum, message))
}

/// Canonical path of a WAV file under `watch_directory`
fn resolve_in_watch_directory(watch_directory: &Path, requested: &str) -> ApiResult<PathBuf> {
    let root = watch_directory.canonicalize().map_err(|_| {
        ApiError::BadRequest(format!(
            "watch directory {} is unavailable",
            watch_directory.display()
        ))
    })?;
    let path = watch_directory
        .join(requested)
        .canonicalize()
        .map_err(|_| ApiError::BadRequest(format!("file not found: {}", requested)))?;

    if !path.starts_with(&root) || !path.is_file() {
        return Err(ApiError::BadRequest(format!(
            "{} is not a file in the watched directory",
            requested
        )));
    }
    let is_wav = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if !is_wav {
        return Err(ApiError::BadRequest(format!("{} is not a WAV file", requested)));
    }
    Ok(path)
}

pub fn metrics_routes() -> Router<AppState> {
    Router::new()
        .route("/latest_metrics", post(latest_metrics))
        .route("/all_metrics", post(all_metrics))
        .route("/history", get(history))
        .route("/cleanup", post(cleanup))
        .route("/power_spectrum", post(power_spectrum))
}
