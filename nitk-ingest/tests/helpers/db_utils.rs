//! Database and pipeline fixtures

use std::path::{Path, PathBuf};

use nitk_common::events::EventBus;
use nitk_ingest::db::init_database_pool;
use nitk_ingest::{Broadcaster, FormatNormalizer, MetricsEngine, Pipeline, ResultStore};
use tempfile::TempDir;

/// Pipeline backed by a fresh database file in `root`
pub async fn create_test_pipeline(root: &Path) -> Pipeline {
    let pool = init_database_pool(&root.join("test.db"))
        .await
        .expect("Failed to create test database");
    Pipeline::new(
        ResultStore::new(pool),
        Broadcaster::new(),
        EventBus::new(256),
        FormatNormalizer::new(44_100),
        MetricsEngine::new(),
    )
}

/// Temporary root with a watched sub-directory and a staging area
///
/// Fixtures are written into `staging` and renamed into `watched` so the
/// watcher only ever sees complete files.
pub struct TestEnv {
    pub root: TempDir,
    pub watched: PathBuf,
    pub staging: PathBuf,
}

impl TestEnv {
    pub fn new(site: &str) -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let watched = root.path().join(site);
        let staging = root.path().join("staging");
        std::fs::create_dir(&watched).expect("Failed to create watched dir");
        std::fs::create_dir(&staging).expect("Failed to create staging dir");
        Self {
            root,
            watched,
            staging,
        }
    }

    /// Move a staged file into the watched directory
    pub fn publish(&self, name: &str) -> PathBuf {
        let target = self.watched.join(name);
        std::fs::rename(self.staging.join(name), &target).expect("Failed to publish fixture");
        target
    }
}
