//! Periodic retention sweep
//!
//! Deletes results older than the configured age on a fixed interval.
//! Failures are logged and the sweeper keeps running.

use std::time::Duration;

use chrono::Utc;
use nitk_common::events::{EventBus, IngestEvent};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::ResultStore;

/// Spawn the sweeper; the first sweep runs immediately
pub fn spawn_retention_sweeper(
    store: ResultStore,
    event_bus: EventBus,
    retention_days: u32,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            retention_days,
            interval_secs = interval.as_secs(),
            "Retention sweeper started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match store.cleanup(retention_days).await {
                Ok(removed) => {
                    if removed > 0 {
                        info!(removed, "Retention sweep removed old results");
                    } else {
                        debug!("Retention sweep found nothing to remove");
                    }
                    event_bus.emit_lossy(IngestEvent::RetentionSweep {
                        removed,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => warn!("Retention sweep failed: {}", e),
            }
        }
        debug!("Retention sweeper stopped");
    })
}
