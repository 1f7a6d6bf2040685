//! End-to-end tick tests: probe → windows → history → alerts → snapshot

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use sysmon::{
    ConfigError, EngineConfig, EngineError, EngineEvent, Metric, SamplerState, Status,
    storage::MemoryStore,
};
use tempfile::tempdir;

use crate::helpers::*;

#[tokio::test]
async fn test_cpu_alerts_follow_threshold() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let probe = ScriptedProbe::cpu(&[70.0, 85.0, 90.0, 79.0]);
    let (engine, mut events) = spawn_engine(&settings, probe, Arc::new(MemoryStore::new())).await;

    engine.start().await.unwrap();

    let mut alerting = Vec::new();
    for _ in 0..4 {
        let snapshot = engine.sample_now().await.unwrap();
        alerting.push(snapshot.has_alert(Metric::Cpu));
        assert!(!snapshot.has_alert(Metric::Ram));
        assert!(!snapshot.has_alert(Metric::Disk));
    }

    assert_eq!(alerting, vec![false, true, true, false]);

    let alerts: Vec<f64> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::Alert(alert) => Some(alert.value),
            _ => None,
        })
        .collect();
    assert_eq!(alerts, vec![85.0, 90.0]);

    let snapshot = engine.snapshot();
    assert_eq!(
        snapshot.window(Metric::Cpu).values(),
        vec![70.0, 85.0, 90.0, 79.0]
    );
    assert_eq!(snapshot.history_len, 4);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_window_keeps_last_sixty_points() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let values: Vec<f64> = (0..65).map(|i| i as f64).collect();
    let (engine, _events) = spawn_engine(
        &settings,
        ScriptedProbe::cpu(&values),
        Arc::new(MemoryStore::new()),
    )
    .await;

    engine.start().await.unwrap();
    for _ in 0..65 {
        engine.sample_now().await.unwrap();
    }

    let snapshot = engine.snapshot();
    let window = snapshot.window(Metric::Cpu).values();
    assert_eq!(window.len(), 60);
    assert_eq!(window, (5..65).map(|i| i as f64).collect::<Vec<_>>());
    assert_eq!(engine.history().len(), 65);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_interval_keeps_previous_config() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let (engine, _events) = spawn_engine(
        &settings,
        ScriptedProbe::default(),
        Arc::new(MemoryStore::new()),
    )
    .await;
    engine.start().await.unwrap();

    let result = engine.reconfigure_raw("50", "80").await;

    assert_matches!(
        result,
        Err(EngineError::Config(ConfigError::IntervalTooShort(50)))
    );
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.config.sample_interval_ms, 3_600_000);
    assert_eq!(snapshot.state, SamplerState::Running);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_new_threshold_applies_from_next_tick() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let probe = ScriptedProbe::cpu(&[60.0, 60.0]);
    let (engine, mut events) = spawn_engine(&settings, probe, Arc::new(MemoryStore::new())).await;
    engine.start().await.unwrap();

    let before = engine.sample_now().await.unwrap();
    assert!(before.alerts.is_empty());

    let lowered = EngineConfig::new(3_600_000, 50.0).unwrap();
    engine.reconfigure(lowered).await.unwrap();

    let after = engine.sample_now().await.unwrap();
    assert!(after.has_alert(Metric::Cpu));
    assert_eq!(after.config, lowered);
    assert_eq!(after.window(Metric::Cpu).len(), 2);

    assert!(
        drain(&mut events).contains(&EngineEvent::Reconfigured { config: lowered }),
        "reconfiguration should be announced"
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_status_names_last_exceeding_metric() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let probe = ScriptedProbe::new(vec![Ok(sample(95.0, 50.0, 99.0))]);
    let (engine, _events) = spawn_engine(&settings, probe, Arc::new(MemoryStore::new())).await;
    engine.start().await.unwrap();

    let snapshot = engine.sample_now().await.unwrap();

    assert_eq!(snapshot.alerts.len(), 2);
    assert_matches!(
        snapshot.status,
        Status::Warning {
            metric: Metric::Disk,
            ..
        }
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_and_start_keep_windows_and_history() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let probe = ScriptedProbe::cpu(&[1.0, 2.0, 3.0]);
    let (engine, _events) = spawn_engine(&settings, probe, Arc::new(MemoryStore::new())).await;

    engine.start().await.unwrap();
    engine.sample_now().await.unwrap();
    engine.sample_now().await.unwrap();

    engine.stop().await.unwrap();
    engine.stop().await.unwrap();
    assert_matches!(engine.sample_now().await, Err(EngineError::NotRunning));
    assert_eq!(engine.snapshot().state, SamplerState::Stopped);

    engine.start().await.unwrap();
    let snapshot = engine.sample_now().await.unwrap();
    assert_eq!(snapshot.window(Metric::Cpu).values(), vec![1.0, 2.0, 3.0]);
    assert_eq!(engine.history().len(), 3);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_timer_drives_ticks() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let probe = ScriptedProbe::cpu(&[5.0, 6.0, 7.0]);
    let (engine, _events) = spawn_engine(&settings, probe, Arc::new(MemoryStore::new())).await;

    let mut snapshots = engine.subscribe_snapshots();
    engine
        .start_with(EngineConfig::new(100, 80.0).unwrap())
        .await
        .unwrap();

    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            snapshots.changed().await.unwrap();
            if snapshots.borrow_and_update().sequence >= 2 {
                break;
            }
        }
    })
    .await;

    assert!(reached.is_ok(), "timer should produce ticks on its own");
    assert!(engine.history().len() >= 2);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconfigured_interval_drives_next_ticks() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let probe = ScriptedProbe::cpu(&[5.0, 6.0, 7.0, 8.0]);
    let (engine, _events) = spawn_engine(&settings, probe, Arc::new(MemoryStore::new())).await;

    engine.start().await.unwrap();
    engine.sample_now().await.unwrap();
    let mut snapshots = engine.subscribe_snapshots();

    engine
        .reconfigure(EngineConfig::new(100, 80.0).unwrap())
        .await
        .unwrap();

    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            snapshots.changed().await.unwrap();
            if snapshots.borrow_and_update().sequence >= 3 {
                break;
            }
        }
    })
    .await;

    assert!(reached.is_ok(), "the new interval should take over the timer");
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.config.sample_interval_ms, 100);
    assert_eq!(&snapshot.window(Metric::Cpu).values()[..3], &[5.0, 6.0, 7.0]);

    engine.shutdown().await.unwrap();
}
