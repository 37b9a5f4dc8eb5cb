//! Directory watcher
//!
//! Polls one directory (non-recursive) and reports files that appear after
//! the watch starts. Each new file is held back until its writer has had
//! time to finish: a fixed settle delay, then until its size stops changing
//! (bounded by a check limit). Files present at start, modifications and
//! non-matching suffixes are ignored.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nitk_common::config::TomlConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::IngestError;

/// Messages from the watcher to its consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A settled new file with a tracked suffix
    Created(PathBuf),
    /// The watched directory disappeared; no further events follow
    DirectoryLost(PathBuf),
}

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub settle_max_checks: u32,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            settle_delay: Duration::from_millis(100),
            settle_max_checks: 10,
        }
    }
}

impl From<&TomlConfig> for WatchOptions {
    fn from(config: &TomlConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            settle_delay: config.settle_delay(),
            settle_max_checks: config.settle_max_checks,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryWatcher {
    dir: PathBuf,
    suffixes: Vec<String>,
    options: WatchOptions,
}

impl DirectoryWatcher {
    /// `suffixes` are matched case-insensitively against the end of the file name
    pub fn new(dir: impl Into<PathBuf>, suffixes: &[&str], options: WatchOptions) -> Self {
        Self {
            dir: dir.into(),
            suffixes: suffixes.iter().map(|s| s.to_ascii_lowercase()).collect(),
            options,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn matches_suffix(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_ascii_lowercase();
        self.suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }

    /// Start watching; fails immediately if the directory does not exist
    ///
    /// The baseline listing is taken before this returns, so any file
    /// created afterwards is reported.
    pub fn spawn(
        self,
        tx: mpsc::Sender<WatchEvent>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>, IngestError> {
        if !self.dir.is_dir() {
            return Err(IngestError::Configuration(format!(
                "watch directory {} does not exist",
                self.dir.display()
            )));
        }
        let known = self.list_files()?;
        info!(
            "Watching {} ({} existing file(s) ignored)",
            self.dir.display(),
            known.len()
        );
        Ok(tokio::spawn(self.run(known, tx, cancel)))
    }

    fn list_files(&self) -> Result<HashSet<PathBuf>, IngestError> {
        let mut files = HashSet::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                IngestError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed")),
                )
            })?;
            if entry.file_type().is_file() {
                files.insert(entry.into_path());
            }
        }
        Ok(files)
    }

    async fn run(
        self,
        mut known: HashSet<PathBuf>,
        tx: mpsc::Sender<WatchEvent>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.options.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !self.dir.is_dir() {
                error!("Watch directory {} disappeared", self.dir.display());
                let _ = tx.send(WatchEvent::DirectoryLost(self.dir.clone())).await;
                break;
            }

            let current = match self.list_files() {
                Ok(files) => files,
                Err(e) => {
                    warn!("Failed to list {}: {}", self.dir.display(), e);
                    continue;
                }
            };

            let mut arrivals: Vec<PathBuf> = current.difference(&known).cloned().collect();
            arrivals.sort();
            // Forget deleted files so a re-created name counts as new
            known = current;

            for path in arrivals {
                if !self.matches_suffix(&path) {
                    continue;
                }
                debug!("New file {}", path.display());

                let settled = tokio::select! {
                    _ = cancel.cancelled() => return,
                    settled = self.wait_until_settled(&path) => settled,
                };
                if !settled {
                    debug!("{} vanished before settling", path.display());
                    continue;
                }
                if tx.send(WatchEvent::Created(path)).await.is_err() {
                    debug!("Watch consumer gone, stopping watcher");
                    return;
                }
            }
        }
        debug!("Watcher for {} stopped", self.dir.display());
    }

    /// Wait the settle delay, then until the size is stable; false if the file vanished
    async fn wait_until_settled(&self, path: &Path) -> bool {
        let check_interval = self.options.settle_delay.max(Duration::from_millis(10));
        tokio::time::sleep(self.options.settle_delay).await;

        let Ok(mut last) = tokio::fs::metadata(path).await.map(|m| m.len()) else {
            return false;
        };
        for _ in 0..self.options.settle_max_checks {
            tokio::time::sleep(check_interval).await;
            let Ok(size) = tokio::fs::metadata(path).await.map(|m| m.len()) else {
                return false;
            };
            if size == last {
                return true;
            }
            last = size;
        }
        debug!(
            "{} still growing after {} checks, releasing anyway",
            path.display(),
            self.options.settle_max_checks
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> WatchOptions {
        WatchOptions {
            poll_interval: Duration::from_millis(20),
            settle_delay: Duration::from_millis(20),
            settle_max_checks: 3,
        }
    }

    async fn next(rx: &mut mpsc::Receiver<WatchEvent>) -> Option<WatchEvent> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[test]
    fn test_suffix_match_is_case_insensitive() {
        let watcher = DirectoryWatcher::new("/tmp", &[".tdms", ".wav"], fast());
        assert!(watcher.matches_suffix(Path::new("/tmp/a.WAV")));
        assert!(watcher.matches_suffix(Path::new("/tmp/b.Tdms")));
        assert!(!watcher.matches_suffix(Path::new("/tmp/c.tdms_index")));
        assert!(!watcher.matches_suffix(Path::new("/tmp/wav")));
    }

    #[tokio::test]
    async fn test_missing_directory_is_configuration_error() {
        let (tx, _rx) = mpsc::channel(4);
        let watcher = DirectoryWatcher::new("/nonexistent/nitk/watch", &[".wav"], fast());
        let err = watcher.spawn(tx, CancellationToken::new()).unwrap_err();
        assert!(matches!(err, IngestError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_reports_only_new_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("existing.wav"), b"old").unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let handle = DirectoryWatcher::new(dir.path(), &[".wav", ".tdms"], fast())
            .spawn(tx, cancel.clone())
            .unwrap();

        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();
        std::fs::write(dir.path().join("ch1_0001.WAV"), b"new").unwrap();

        assert_eq!(
            next(&mut rx).await,
            Some(WatchEvent::Created(dir.path().join("ch1_0001.WAV")))
        );

        // Modifying an already-seen file produces nothing
        std::fs::write(dir.path().join("existing.wav"), b"rewritten").unwrap();
        std::fs::write(dir.path().join("ch2_0001.tdms"), b"x").unwrap();
        assert_eq!(
            next(&mut rx).await,
            Some(WatchEvent::Created(dir.path().join("ch2_0001.tdms")))
        );

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_directory_loss_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let watched = root.path().join("watched");
        std::fs::create_dir(&watched).unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let handle = DirectoryWatcher::new(&watched, &[".wav"], fast())
            .spawn(tx, CancellationToken::new())
            .unwrap();

        std::fs::remove_dir(&watched).unwrap();
        assert_eq!(next(&mut rx).await, Some(WatchEvent::DirectoryLost(watched)));
        handle.await.unwrap();
    }
}
