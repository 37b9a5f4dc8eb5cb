//! Task orchestrator
//!
//! Wires one directory watcher to a single worker task through a bounded
//! channel. The worker runs the per-file pipeline one arrival at a time:
//! normalize, decode and compute, persist, broadcast. Any failure is logged
//! and contained to the file that caused it.
//!
//! # Lifecycle
//! `Idle` → `start()` → `Monitoring` → `stop()` → `Idle`. `stop` lets an
//! in-flight file finish and discards whatever is still queued.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use nitk_common::config::TomlConfig;
use nitk_common::events::{EventBus, IngestEvent};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broadcaster::Broadcaster;
use crate::db::ResultStore;
use crate::error::IngestError;
use crate::metrics::{AcousticMetrics, MetricsEngine};
use crate::normalizer::{artifact_path_for, has_extension, is_intermediate_artifact, FormatNormalizer};
use crate::watcher::{DirectoryWatcher, WatchEvent, WatchOptions};

/// Suffixes the watcher reports
pub const TRACKED_SUFFIXES: [&str; 2] = [".tdms", ".wav"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Idle,
    Monitoring,
}

/// Result of one pass through the per-file pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// Persisted as `result_id` and pushed to `delivered` subscribers
    Processed {
        result_id: i64,
        delivered: usize,
        metrics: Box<AcousticMetrics>,
    },
    /// Intermediate artifact, never processed
    Skipped,
}

/// Dependencies of the per-file pipeline, shared by every orchestrator
#[derive(Clone)]
pub struct Pipeline {
    store: ResultStore,
    broadcaster: Broadcaster,
    event_bus: EventBus,
    normalizer: FormatNormalizer,
    engine: MetricsEngine,
}

impl Pipeline {
    pub fn new(
        store: ResultStore,
        broadcaster: Broadcaster,
        event_bus: EventBus,
        normalizer: FormatNormalizer,
        engine: MetricsEngine,
    ) -> Self {
        Self {
            store,
            broadcaster,
            event_bus,
            normalizer,
            engine,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn engine(&self) -> MetricsEngine {
        self.engine
    }

    /// Run the per-file algorithm for `path`
    ///
    /// Emits lifecycle events and logs failures itself; the returned error
    /// is informational for direct callers.
    pub async fn process_file(&self, path: &Path) -> Result<FileOutcome, IngestError> {
        let file_path = path.display().to_string();

        if is_intermediate_artifact(path) {
            debug!("Skipping intermediate artifact {}", file_path);
            self.event_bus.emit_lossy(IngestEvent::FileSkipped {
                file_path,
                reason: "intermediate artifact".to_string(),
                timestamp: Utc::now(),
            });
            return Ok(FileOutcome::Skipped);
        }

        self.event_bus.emit_lossy(IngestEvent::ProcessingStarted {
            file_path: file_path.clone(),
            timestamp: Utc::now(),
        });

        let artifact = has_extension(path, "tdms").then(|| artifact_path_for(path));
        let result = self.run(path, artifact.as_deref()).await;

        if let Some(artifact) = &artifact {
            remove_artifact(artifact).await;
        }

        match &result {
            Ok(FileOutcome::Processed { result_id, .. }) => {
                self.event_bus.emit_lossy(IngestEvent::ProcessingCompleted {
                    file_path,
                    result_id: *result_id,
                    timestamp: Utc::now(),
                });
            }
            Ok(FileOutcome::Skipped) => {}
            Err(e) => {
                error!("Error processing file {}: {}", file_path, e);
                self.event_bus.emit_lossy(IngestEvent::FileFailed {
                    file_path,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
        result
    }

    async fn run(&self, path: &Path, artifact: Option<&Path>) -> Result<FileOutcome, IngestError> {
        let normalizer = self.normalizer.clone();
        let engine = self.engine;
        let source = path.to_path_buf();
        let artifact = artifact.map(Path::to_path_buf);

        let metrics = tokio::task::spawn_blocking(move || {
            let waveform_path = match &artifact {
                Some(out) => normalizer.convert(&source, Some(out))?,
                None => source,
            };
            engine.compute_file(&waveform_path)
        })
        .await
        .map_err(|e| IngestError::Compute(format!("processing task failed: {}", e)))??;

        let file_path = path.display().to_string();
        let file_dir = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let result_id = self
            .store
            .save(&file_path, &file_dir, &metrics.to_metrics())
            .await?;

        let delivered = match serde_json::to_string(&metrics.live_payload(&file_path)) {
            Ok(message) => self.broadcaster.broadcast(&message).await,
            Err(e) => {
                warn!("Could not serialize live payload for {}: {}", file_path, e);
                0
            }
        };

        info!(
            result_id,
            delivered,
            "Processed {} (leq {:.1} dB)",
            file_path,
            metrics.leq
        );

        Ok(FileOutcome::Processed {
            result_id,
            delivered,
            metrics: Box::new(metrics),
        })
    }
}

async fn remove_artifact(artifact: &Path) {
    match tokio::fs::remove_file(artifact).await {
        Ok(()) => debug!("Removed intermediate artifact {}", artifact.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to remove intermediate artifact {}: {}",
            artifact.display(),
            e
        ),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    pub watch: WatchOptions,
    /// Bound on arrivals queued behind the worker
    pub queue_capacity: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            watch: WatchOptions::default(),
            queue_capacity: 64,
        }
    }
}

impl From<&TomlConfig> for OrchestratorOptions {
    fn from(config: &TomlConfig) -> Self {
        Self {
            watch: WatchOptions::from(config),
            queue_capacity: config.event_channel_capacity.max(1),
        }
    }
}

/// One watch session over one directory
pub struct TaskOrchestrator {
    watch_directory: PathBuf,
    pipeline: Arc<Pipeline>,
    options: OrchestratorOptions,
    cancel: Option<CancellationToken>,
    watcher_task: Option<JoinHandle<()>>,
    worker_task: Option<JoinHandle<()>>,
}

impl TaskOrchestrator {
    pub fn new(watch_directory: impl Into<PathBuf>, pipeline: Pipeline, options: OrchestratorOptions) -> Self {
        Self {
            watch_directory: watch_directory.into(),
            pipeline: Arc::new(pipeline),
            options,
            cancel: None,
            watcher_task: None,
            worker_task: None,
        }
    }

    pub fn watch_directory(&self) -> &Path {
        &self.watch_directory
    }

    /// `Monitoring` while the session is live; a lost directory ends it
    pub fn state(&self) -> MonitorState {
        match &self.cancel {
            Some(token) if !token.is_cancelled() => MonitorState::Monitoring,
            _ => MonitorState::Idle,
        }
    }

    /// Idle → Monitoring; no-op when already monitoring
    pub fn start(&mut self) -> Result<(), IngestError> {
        if self.state() == MonitorState::Monitoring {
            debug!("Already monitoring {}", self.watch_directory.display());
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.options.queue_capacity);
        let watcher = DirectoryWatcher::new(&self.watch_directory, &TRACKED_SUFFIXES, self.options.watch);
        let watcher_task = watcher.spawn(tx, cancel.clone())?;
        let worker_task = tokio::spawn(run_worker(
            Arc::clone(&self.pipeline),
            rx,
            cancel.clone(),
            self.watch_directory.clone(),
        ));

        self.cancel = Some(cancel);
        self.watcher_task = Some(watcher_task);
        self.worker_task = Some(worker_task);

        info!("Started monitoring {}", self.watch_directory.display());
        self.pipeline.event_bus.emit_lossy(IngestEvent::MonitoringStarted {
            watch_directory: self.watch_directory.display().to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Stop watching, let the in-flight file finish, drop queued arrivals
    pub async fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };
        cancel.cancel();

        for task in [self.watcher_task.take(), self.worker_task.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = task.await {
                warn!("Monitoring task ended abnormally: {}", e);
            }
        }

        info!("Stopped monitoring {}", self.watch_directory.display());
        self.pipeline.event_bus.emit_lossy(IngestEvent::MonitoringStopped {
            watch_directory: self.watch_directory.display().to_string(),
            timestamp: Utc::now(),
        });
    }
}

impl Drop for TaskOrchestrator {
    fn drop(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }
}

async fn run_worker(
    pipeline: Arc<Pipeline>,
    mut rx: mpsc::Receiver<WatchEvent>,
    cancel: CancellationToken,
    watch_directory: PathBuf,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rx.recv() => event,
        };

        match event {
            Some(WatchEvent::Created(path)) => {
                pipeline.event_bus.emit_lossy(IngestEvent::FileDetected {
                    file_path: path.display().to_string(),
                    timestamp: Utc::now(),
                });
                // Outcome already logged and published as events
                let _ = pipeline.process_file(&path).await;
            }
            Some(WatchEvent::DirectoryLost(dir)) => {
                error!(
                    "Watch directory {} lost; monitoring ended",
                    dir.display()
                );
                // Idle before WatchLost is observable
                cancel.cancel();
                pipeline.event_bus.emit_lossy(IngestEvent::WatchLost {
                    watch_directory: dir.display().to_string(),
                    timestamp: Utc::now(),
                });
                break;
            }
            None => break,
        }
    }
    debug!("Worker for {} stopped", watch_directory.display());
}
