//! Failure tests for the sampling engine
//!
//! These tests verify that the engine handles failures gracefully:
//! - Probe errors and timeouts
//! - History writes that fail
//! - Exports to unusable locations

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use sysmon::{
    EngineError, EngineEvent, EngineHandle, Metric, ProbeError, Sample, SamplerState,
    monitors::Probe, storage::MemoryStore,
};
use tempfile::tempdir;
use tokio::sync::broadcast;

use crate::helpers::*;

#[tokio::test]
async fn test_probe_failure_keeps_previous_data() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let probe = ScriptedProbe::new(vec![
        Ok(sample(30.0, 40.0, 50.0)),
        Err(ProbeError::Unavailable("counters unreadable".to_string())),
        Ok(sample(31.0, 41.0, 51.0)),
    ]);
    let (engine, mut events) = spawn_engine(&settings, probe, Arc::new(MemoryStore::new())).await;
    engine.start().await.unwrap();

    let first = engine.sample_now().await.unwrap();
    let failed = engine.sample_now().await.unwrap();

    assert_eq!(failed.sequence, 2);
    assert_matches!(failed.probe_error, Some(ProbeError::Unavailable(_)));
    assert_eq!(failed.sample, first.sample);
    assert_eq!(failed.windows, first.windows);
    assert_eq!(failed.history_len, 1);
    assert!(failed.alerts.is_empty());
    assert_eq!(failed.state, SamplerState::Running);

    let recovered = engine.sample_now().await.unwrap();
    assert!(recovered.probe_error.is_none());
    assert_eq!(recovered.window(Metric::Cpu).values(), vec![30.0, 31.0]);
    assert_eq!(recovered.history_len, 2);

    assert!(
        drain(&mut events)
            .iter()
            .any(|event| matches!(event, EngineEvent::ProbeFailed(_)))
    );

    engine.shutdown().await.unwrap();
}

struct StuckProbe;

#[async_trait]
impl Probe for StuckProbe {
    async fn sample(&mut self) -> Result<Sample, ProbeError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Sample::default())
    }
}

#[tokio::test]
async fn test_stuck_probe_times_out() {
    let dir = tempdir().unwrap();
    let mut settings = manual_settings(&dir.path().join("history.json"));
    settings.cpu_window_ms = 10;
    settings.probe_timeout_ms = 50;

    let (event_tx, _events) = broadcast::channel(16);
    let engine = EngineHandle::spawn(
        &settings,
        Box::new(StuckProbe),
        Arc::new(MemoryStore::new()),
        event_tx,
    )
    .await
    .unwrap();
    engine.start().await.unwrap();

    let snapshot = engine.sample_now().await.unwrap();

    assert_eq!(snapshot.probe_error, Some(ProbeError::Timeout(50)));
    assert!(snapshot.sample.is_none());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_persistence_failure_is_not_fatal() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let (engine, mut events) =
        spawn_engine(&settings, ScriptedProbe::cpu(&[90.0, 20.0]), Arc::new(FailingStore)).await;
    engine.start().await.unwrap();

    let snapshot = engine.sample_now().await.unwrap();

    assert!(snapshot.persistence_error.is_some());
    assert!(snapshot.has_alert(Metric::Cpu));
    assert_eq!(snapshot.history_len, 1);
    assert_eq!(engine.history().len(), 1);

    let next = engine.sample_now().await.unwrap();
    assert_eq!(next.history_len, 2);

    let failures = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, EngineEvent::PersistenceFailed(_)))
        .count();
    assert_eq!(failures, 2);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_clear_with_failing_store_still_empties_memory() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let (engine, _events) =
        spawn_engine(&settings, ScriptedProbe::cpu(&[10.0]), Arc::new(FailingStore)).await;
    engine.start().await.unwrap();
    engine.sample_now().await.unwrap();

    let result = engine.clear_history().await;

    assert_matches!(result, Err(EngineError::Persistence(_)));
    assert!(engine.history().is_empty());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_export_to_unusable_path_fails() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let (engine, _events) = spawn_engine(
        &settings,
        ScriptedProbe::cpu(&[10.0]),
        Arc::new(MemoryStore::new()),
    )
    .await;
    engine.start().await.unwrap();
    engine.sample_now().await.unwrap();

    // a regular file cannot act as a parent directory
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let target = blocker.join("export.json");

    let result = engine.export_history(&target).await;

    assert_matches!(result, Err(EngineError::Export(e)) if e.path == target);
    assert_eq!(engine.history().len(), 1);
    assert!(engine.snapshot().persistence_error.is_none());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_export_into_missing_directory_creates_nothing() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let (engine, _events) = spawn_engine(
        &settings,
        ScriptedProbe::cpu(&[10.0]),
        Arc::new(MemoryStore::new()),
    )
    .await;
    engine.start().await.unwrap();
    engine.sample_now().await.unwrap();

    let missing = dir.path().join("exports");
    let result = engine.export_history(missing.join("history-copy.json")).await;

    assert_matches!(result, Err(EngineError::Export(_)));
    assert!(!missing.exists());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_export_writes_history_elsewhere() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let (engine, _events) = spawn_engine(
        &settings,
        ScriptedProbe::cpu(&[10.0, 11.0]),
        Arc::new(MemoryStore::new()),
    )
    .await;
    engine.start().await.unwrap();
    engine.sample_now().await.unwrap();
    engine.sample_now().await.unwrap();

    let target = dir.path().join("history-copy.json");
    engine.export_history(&target).await.unwrap();

    let exported = sysmon::storage::json::decode(&std::fs::read(&target).unwrap()).unwrap();
    assert_eq!(exported, *engine.history());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_commands_after_shutdown_report_closed() {
    let dir = tempdir().unwrap();
    let settings = manual_settings(&dir.path().join("history.json"));
    let (engine, _events) = spawn_engine(
        &settings,
        ScriptedProbe::default(),
        Arc::new(MemoryStore::new()),
    )
    .await;

    engine.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_matches!(engine.stop().await, Err(EngineError::Closed(_)));
    // reads keep working on the last published state
    assert_eq!(engine.snapshot().state, SamplerState::Stopped);
}
