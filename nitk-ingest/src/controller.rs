//! Watch controller
//!
//! Owns the active orchestrator and the directory it is bound to. Handlers
//! reach it through `AppState`. The mutex guards only the bookkeeping: a
//! session being torn down is taken out first and joined with the lock
//! released, so status queries never wait on an in-flight file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::orchestrator::{MonitorState, OrchestratorOptions, Pipeline, TaskOrchestrator};

/// Snapshot returned by [`WatchController::status`]
#[derive(Debug, Clone, Serialize)]
pub struct WatchStatus {
    pub watch_directory: PathBuf,
    pub state: MonitorState,
}

struct Inner {
    watch_directory: PathBuf,
    orchestrator: Option<TaskOrchestrator>,
}

pub struct WatchController {
    pipeline: Pipeline,
    options: OrchestratorOptions,
    inner: Mutex<Inner>,
}

impl WatchController {
    pub fn new(pipeline: Pipeline, options: OrchestratorOptions, watch_directory: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            options,
            inner: Mutex::new(Inner {
                watch_directory: watch_directory.into(),
                orchestrator: None,
            }),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Start monitoring the current directory
    pub async fn start(&self) -> Result<(), IngestError> {
        let finished = {
            let mut inner = self.inner.lock().await;
            let state = inner.orchestrator.as_ref().map(TaskOrchestrator::state);
            if state == Some(MonitorState::Monitoring) {
                return Ok(());
            }
            inner.orchestrator.take()
        };
        // Session ended on its own (directory lost); join before replacing
        if let Some(mut finished) = finished {
            finished.stop().await;
        }

        let mut inner = self.inner.lock().await;
        if inner.orchestrator.is_some() {
            return Ok(());
        }
        let mut orchestrator =
            TaskOrchestrator::new(&inner.watch_directory, self.pipeline.clone(), self.options);
        let started = orchestrator.start();
        inner.orchestrator = started.is_ok().then_some(orchestrator);
        started
    }

    /// Stop monitoring; waits for the in-flight file without holding the lock
    pub async fn stop(&self) {
        let active = self.inner.lock().await.orchestrator.take();
        if let Some(mut orchestrator) = active {
            orchestrator.stop().await;
        }
    }

    /// Tear down the current session and start a fresh one on `new_dir`
    ///
    /// On failure no orchestrator is active, but `new_dir` is kept as the
    /// current directory so a later `start` retries it.
    pub async fn change_directory(&self, new_dir: &Path) -> Result<(), IngestError> {
        let old = {
            let mut inner = self.inner.lock().await;
            info!(
                "Changing watch directory from {} to {}",
                inner.watch_directory.display(),
                new_dir.display()
            );
            inner.watch_directory = new_dir.to_path_buf();
            inner.orchestrator.take()
        };
        if let Some(mut old) = old {
            old.stop().await;
        }

        if !new_dir.is_dir() {
            warn!("New watch directory {} does not exist", new_dir.display());
            return Err(IngestError::Configuration(format!(
                "watch directory {} does not exist",
                new_dir.display()
            )));
        }

        let mut inner = self.inner.lock().await;
        if inner.watch_directory.as_path() != new_dir {
            debug!(
                "Change to {} superseded by {}",
                new_dir.display(),
                inner.watch_directory.display()
            );
            return Ok(());
        }
        if inner.orchestrator.is_some() {
            // A concurrent start already bound a session to new_dir
            return Ok(());
        }
        let mut orchestrator = TaskOrchestrator::new(new_dir, self.pipeline.clone(), self.options);
        orchestrator.start()?;
        inner.orchestrator = Some(orchestrator);
        Ok(())
    }

    pub async fn watch_directory(&self) -> PathBuf {
        self.inner.lock().await.watch_directory.clone()
    }

    pub async fn status(&self) -> WatchStatus {
        let inner = self.inner.lock().await;
        WatchStatus {
            watch_directory: inner.watch_directory.clone(),
            state: inner
                .orchestrator
                .as_ref()
                .map(TaskOrchestrator::state)
                .unwrap_or(MonitorState::Idle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::{Broadcaster, Subscriber};
    use crate::db::{init_database_pool, ResultStore};
    use crate::watcher::WatchOptions;
    use std::sync::{mpsc as std_mpsc, Arc, Mutex as StdMutex};
    use std::time::Duration;
    use crate::metrics::MetricsEngine;
    use crate::normalizer::FormatNormalizer;
    use nitk_common::events::EventBus;

    async fn controller(root: &Path, dir: &Path) -> WatchController {
        let pool = init_database_pool(&root.join("c.db")).await.unwrap();
        let pipeline = Pipeline::new(
            ResultStore::new(pool),
            Broadcaster::new(),
            EventBus::new(32),
            FormatNormalizer::new(44_100),
            MetricsEngine::new(),
        );
        WatchController::new(pipeline, OrchestratorOptions::default(), dir)
    }

    #[tokio::test]
    async fn test_change_directory_switches_session() {
        let root = tempfile::tempdir().unwrap();
        let first = root.path().join("a");
        let second = root.path().join("b");
        std::fs::create_dir(&first).unwrap();
        std::fs::create_dir(&second).unwrap();

        let controller = controller(root.path(), &first).await;
        controller.start().await.unwrap();
        assert_eq!(controller.status().await.state, MonitorState::Monitoring);

        controller.change_directory(&second).await.unwrap();
        let status = controller.status().await;
        assert_eq!(status.watch_directory, second);
        assert_eq!(status.state, MonitorState::Monitoring);

        controller.stop().await;
        assert_eq!(controller.status().await.state, MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_change_to_missing_directory_leaves_no_session() {
        let root = tempfile::tempdir().unwrap();
        let watched = root.path().join("a");
        std::fs::create_dir(&watched).unwrap();

        let controller = controller(root.path(), &watched).await;
        controller.start().await.unwrap();

        let missing = root.path().join("gone");
        let err = controller.change_directory(&missing).await.unwrap_err();
        assert!(matches!(err, IngestError::Configuration(_)));

        let status = controller.status().await;
        assert_eq!(status.state, MonitorState::Idle);
        assert_eq!(status.watch_directory, missing);
    }

    #[tokio::test]
    async fn test_start_on_missing_directory_reports_configuration() {
        let root = tempfile::tempdir().unwrap();
        let controller = controller(root.path(), &root.path().join("nope")).await;
        assert!(matches!(
            controller.start().await,
            Err(IngestError::Configuration(_))
        ));
        assert_eq!(controller.status().await.state, MonitorState::Idle);
    }

    /// Holds the worker inside broadcast until released
    struct Gate {
        entered: StdMutex<std_mpsc::Sender<()>>,
        release: StdMutex<std_mpsc::Receiver<()>>,
    }

    impl Subscriber for Gate {
        fn send(&self, _message: &str) -> Result<(), IngestError> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self
                .release
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(20));
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_status_answers_while_stop_drains_in_flight_file() {
        let root = tempfile::tempdir().unwrap();
        let watched = root.path().join("site1");
        std::fs::create_dir(&watched).unwrap();

        let pool = init_database_pool(&root.path().join("c.db")).await.unwrap();
        let pipeline = Pipeline::new(
            ResultStore::new(pool),
            Broadcaster::new(),
            EventBus::new(32),
            FormatNormalizer::new(8_000),
            MetricsEngine::new(),
        );
        let options = OrchestratorOptions {
            watch: WatchOptions {
                poll_interval: Duration::from_millis(20),
                settle_delay: Duration::from_millis(20),
                settle_max_checks: 3,
            },
            queue_capacity: 4,
        };
        let controller = Arc::new(WatchController::new(pipeline, options, &watched));

        let (entered_tx, entered_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        controller
            .pipeline()
            .broadcaster()
            .connect(Arc::new(Gate {
                entered: StdMutex::new(entered_tx),
                release: StdMutex::new(release_rx),
            }))
            .await;
        controller.start().await.unwrap();

        let staged = root.path().join("ch1_0001.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&staged, spec).unwrap();
        for i in 0..4_000 {
            let v = (i as f64 * 0.3).sin() * 8_000.0;
            writer.write_sample(v as i16).unwrap();
        }
        writer.finalize().unwrap();
        std::fs::rename(&staged, watched.join("ch1_0001.wav")).unwrap();

        // Worker is now parked inside the broadcast of the first result
        tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(20)))
            .await
            .unwrap()
            .unwrap();

        let stopping = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.stop().await }
        });

        let status = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let status = controller.status().await;
                if status.state == MonitorState::Idle {
                    break status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("status blocked behind stop");
        assert_eq!(status.watch_directory, watched);
        // Drain is still pending on the parked file
        assert!(!stopping.is_finished());

        release_tx.send(()).unwrap();
        stopping.await.unwrap();
        assert_eq!(controller.status().await.state, MonitorState::Idle);
        assert_eq!(controller.pipeline().store().count().await.unwrap(), 1);
    }
}
