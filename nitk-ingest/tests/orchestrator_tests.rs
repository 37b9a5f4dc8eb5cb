//! Watch session tests: arrivals are processed one at a time, lifecycle
//! transitions are published on the event bus.

mod helpers;

use std::time::Duration;

use helpers::{create_test_pipeline, sine_with_noise, write_wav_i16, TestEnv};
use nitk_common::events::IngestEvent;
use nitk_ingest::orchestrator::{MonitorState, OrchestratorOptions, TaskOrchestrator};
use nitk_ingest::watcher::WatchOptions;
use tokio::sync::broadcast;

fn fast_options() -> OrchestratorOptions {
    OrchestratorOptions {
        watch: WatchOptions {
            poll_interval: Duration::from_millis(25),
            settle_delay: Duration::from_millis(25),
            settle_max_checks: 5,
        },
        queue_capacity: 16,
    }
}

/// Collect events until `done` returns true or the timeout elapses
async fn collect_until(
    rx: &mut broadcast::Receiver<IngestEvent>,
    mut done: impl FnMut(&[IngestEvent]) -> bool,
) -> Vec<IngestEvent> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    while !done(&events) {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(event)) => events.push(event),
            Ok(Err(e)) => panic!("event bus error: {}", e),
            Err(_) => panic!("timed out; events so far: {:?}", events),
        }
    }
    events
}

fn count(events: &[IngestEvent], event_type: &str) -> usize {
    events.iter().filter(|e| e.event_type() == event_type).count()
}

#[tokio::test]
async fn test_arrivals_are_processed_serially() {
    let env = TestEnv::new("site1");
    let pipeline = create_test_pipeline(env.root.path()).await;
    let store = pipeline.store().clone();
    let mut rx = pipeline.event_bus().subscribe();

    let mut orchestrator = TaskOrchestrator::new(&env.watched, pipeline, fast_options());
    orchestrator.start().unwrap();

    let names = ["ch1_0001.wav", "ch1_0002.wav", "ch2_0001.wav"];
    for (seed, name) in names.iter().enumerate() {
        let samples = sine_with_noise(800.0, 0.4, 0.05, 16_000, 1.0, seed as u64);
        write_wav_i16(&env.staging.join(name), &samples, 16_000).unwrap();
    }
    for name in names {
        env.publish(name);
    }

    let events = collect_until(&mut rx, |e| count(e, "ProcessingCompleted") == names.len()).await;
    orchestrator.stop().await;

    // Every start is closed by its completion before the next start
    let mut open: Option<&str> = None;
    let mut last_ts = None;
    for event in &events {
        match event {
            IngestEvent::ProcessingStarted { file_path, timestamp } => {
                assert!(open.is_none(), "{} started while {:?} in flight", file_path, open);
                open = Some(file_path.as_str());
                last_ts = Some(*timestamp);
            }
            IngestEvent::ProcessingCompleted { file_path, timestamp, .. } => {
                assert_eq!(open, Some(file_path.as_str()));
                assert!(Some(*timestamp) >= last_ts);
                open = None;
            }
            IngestEvent::FileFailed { file_path, error, .. } => {
                panic!("{} failed: {}", file_path, error)
            }
            _ => {}
        }
    }
    assert_eq!(count(&events, "FileDetected"), names.len());
    assert_eq!(store.count().await.unwrap(), names.len() as i64);
    assert_eq!(store.all_for_channel("ch1", None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_existing_and_intermediate_files_are_not_processed() {
    let env = TestEnv::new("site1");
    let samples = sine_with_noise(1000.0, 0.5, 0.0, 8_000, 0.5, 9);
    write_wav_i16(&env.watched.join("ch1_old.wav"), &samples, 8_000).unwrap();

    let pipeline = create_test_pipeline(env.root.path()).await;
    let store = pipeline.store().clone();
    let mut rx = pipeline.event_bus().subscribe();
    let mut orchestrator = TaskOrchestrator::new(&env.watched, pipeline, fast_options());
    orchestrator.start().unwrap();

    write_wav_i16(&env.staging.join("temp_ch1_0001.wav"), &samples, 8_000).unwrap();
    env.publish("temp_ch1_0001.wav");

    let events = collect_until(&mut rx, |e| count(e, "FileSkipped") == 1).await;
    orchestrator.stop().await;

    assert_eq!(count(&events, "ProcessingStarted"), 0);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_file_does_not_stop_the_session() {
    let env = TestEnv::new("site1");
    let pipeline = create_test_pipeline(env.root.path()).await;
    let mut rx = pipeline.event_bus().subscribe();
    let mut orchestrator = TaskOrchestrator::new(&env.watched, pipeline, fast_options());
    orchestrator.start().unwrap();

    std::fs::write(env.staging.join("ch1_bad.wav"), b"not audio at all").unwrap();
    env.publish("ch1_bad.wav");
    collect_until(&mut rx, |e| count(e, "FileFailed") == 1).await;

    let samples = sine_with_noise(1000.0, 0.5, 0.01, 8_000, 0.5, 2);
    write_wav_i16(&env.staging.join("ch1_good.wav"), &samples, 8_000).unwrap();
    env.publish("ch1_good.wav");
    collect_until(&mut rx, |e| count(e, "ProcessingCompleted") == 1).await;

    assert_eq!(orchestrator.state(), MonitorState::Monitoring);
    orchestrator.stop().await;
    assert_eq!(orchestrator.state(), MonitorState::Idle);
}

#[tokio::test]
async fn test_lost_directory_ends_session() {
    let env = TestEnv::new("site1");
    let pipeline = create_test_pipeline(env.root.path()).await;
    let mut rx = pipeline.event_bus().subscribe();
    let mut orchestrator = TaskOrchestrator::new(&env.watched, pipeline, fast_options());
    orchestrator.start().unwrap();

    std::fs::remove_dir_all(&env.watched).unwrap();
    let events = collect_until(&mut rx, |e| count(e, "WatchLost") == 1).await;
    assert!(matches!(
        events.last(),
        Some(IngestEvent::WatchLost { watch_directory, .. }) if *watch_directory == env.watched.display().to_string()
    ));
    assert_eq!(orchestrator.state(), MonitorState::Idle);

    orchestrator.stop().await;
    collect_until(&mut rx, |e| count(e, "MonitoringStopped") == 1).await;
}
