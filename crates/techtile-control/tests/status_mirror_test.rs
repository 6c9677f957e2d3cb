//! Status mirror and background job tests.

use std::sync::Arc;
use std::time::Duration;

use techtile_control::{
    ControlPlane, ExperimentStatus, FileStatusStore, MemoryBus, MemoryStatusStore, StatusSnapshot,
    StatusStore, StatusUpdate, TimingConfig, Topics,
};

#[tokio::test(start_paused = true)]
async fn test_status_is_rebroadcast_every_interval() {
    let bus = Arc::new(MemoryBus::new());
    let store = Arc::new(MemoryStatusStore::new());
    let plane = ControlPlane::new(
        bus.clone(),
        store.clone(),
        Topics::default(),
        &TimingConfig::default(),
    );
    plane.start().await.unwrap();

    // Nothing stored yet: ticks are skipped
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(bus.published_on("experiment").await.is_empty());

    let update: StatusUpdate =
        serde_json::from_str(r#"{"status":"active","message":"sweep 3"}"#).unwrap();
    store.update(update.normalize()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(20)).await;
    let sent = bus.published_on("experiment").await;
    assert_eq!(sent.len(), 2);

    let snapshot: StatusSnapshot = serde_json::from_slice(&sent[1].payload).unwrap();
    assert_eq!(snapshot.status, ExperimentStatus::Active);
    assert_eq!(snapshot.message, "sweep 3");

    plane.shutdown().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(bus.published_on("experiment").await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_custom_status_topic_and_interval() {
    let bus = Arc::new(MemoryBus::new());
    let store = Arc::new(MemoryStatusStore::with_snapshot(StatusSnapshot::default()));
    let timing = TimingConfig {
        status_interval_secs: 2,
        ..TimingConfig::default()
    };
    let plane = ControlPlane::new(
        bus.clone(),
        store,
        Topics::default().with_status_topic("lab/status"),
        &timing,
    );
    plane.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(bus.published_on("lab/status").await.len(), 3);
    plane.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_zero_intervals_keep_jobs_alive() {
    let bus = Arc::new(MemoryBus::new());
    let store = Arc::new(MemoryStatusStore::with_snapshot(StatusSnapshot::default()));
    let timing = TimingConfig {
        sweep_interval_secs: 0,
        status_interval_secs: 0,
        ..TimingConfig::default()
    };
    let plane = ControlPlane::new(bus.clone(), store, Topics::default(), &timing);
    plane.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(plane.scheduler().active_jobs().await, 2);
    assert_eq!(bus.published_on("experiment").await.len(), 2);
    plane.shutdown().await;
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.json");

    let first = FileStatusStore::new(&path);
    first
        .update(StatusSnapshot::new(ExperimentStatus::Active, "overnight run"))
        .await
        .unwrap();

    let second = FileStatusStore::new(&path);
    let snapshot = second.snapshot().await.unwrap().expect("persisted snapshot");
    assert_eq!(snapshot.status, ExperimentStatus::Active);
    assert_eq!(snapshot.message, "overnight run");
}
