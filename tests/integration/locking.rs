use crate::support::{memory_engine, GatedStore};
use serde_json::json;
use statesync::config::EngineConfig;
use statesync::{MemoryStateStore, NullSink, StateStore, StateSyncEngine, SyncError};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn second_acquire_waits_for_delayed_release() {
    let (engine, _store, _sink) = memory_engine().await;
    engine.acquire_lock("resource").await.unwrap();

    let waiter = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            engine.acquire_lock("resource").await.unwrap();
            let waited = start.elapsed();
            engine.release_lock("resource").unwrap();
            waited
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.release_lock("resource").unwrap();

    let waited = waiter.await.unwrap();
    assert!(waited > Duration::from_millis(50), "waited only {:?}", waited);
    assert!(!engine.is_locked("resource"));
}

#[tokio::test]
async fn other_ids_proceed_while_one_is_locked() {
    let (engine, _store, _sink) = memory_engine().await;
    engine.acquire_lock("busy").await.unwrap();

    let version = tokio::time::timeout(
        Duration::from_millis(200),
        engine.set_state("free", json!(1), "a"),
    )
    .await
    .expect("write to an unrelated id must not block")
    .unwrap();
    assert_eq!(version, 1);
    engine.release_lock("busy").unwrap();
}

#[tokio::test]
async fn set_state_waits_for_bracketing_caller() {
    let (engine, _store, _sink) = memory_engine().await;
    engine.set_state("counter", json!(0), "a").await.unwrap();

    // Read-modify-write bracketed by the lock
    engine.acquire_lock("counter").await.unwrap();
    let current = engine.get_state("counter").unwrap().unwrap();

    let competing = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.set_state("counter", json!(100), "b").await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!competing.is_finished());
    assert_eq!(engine.get_version("counter").unwrap(), Some(1));

    engine.release_lock("counter").unwrap();
    let next = json!(current.as_i64().unwrap() + 1);
    assert_eq!(competing.await.unwrap().unwrap(), 2);
    assert_eq!(engine.set_state("counter", next, "a").await.unwrap(), 3);
}

#[tokio::test]
async fn configured_timeout_bounds_set_state() {
    let config = EngineConfig {
        lock_timeout_ms: Some(30),
        ..EngineConfig::default()
    };
    let engine = StateSyncEngine::with_config(
        Arc::new(MemoryStateStore::new()),
        Arc::new(NullSink),
        config,
    );
    engine.initialize().await.unwrap();
    engine.acquire_lock("stuck").await.unwrap();

    let err = engine.set_state("stuck", json!(1), "a").await.unwrap_err();
    assert!(matches!(err, SyncError::LockTimeout { ref id, timeout_ms: 30 } if id == "stuck"));
    assert_eq!(engine.get_state("stuck").unwrap(), None);

    let err = engine
        .acquire_lock_timeout("stuck", Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::LockTimeout { .. }));
}

#[tokio::test]
async fn shutdown_wakes_lock_waiters() {
    let (engine, _store, _sink) = memory_engine().await;
    engine.acquire_lock("held").await.unwrap();

    let blocked = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.set_state("held", json!(1), "a").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    engine.shutdown();

    let result = blocked.await.unwrap();
    assert!(matches!(result, Err(SyncError::LockClosed(_))));
    assert!(!engine.is_locked("held"));
}

#[tokio::test]
async fn write_straddling_shutdown_stays_out_of_the_new_session() {
    let store = Arc::new(GatedStore::default());
    let engine = Arc::new(StateSyncEngine::new(store.clone(), Arc::new(NullSink)));
    engine.initialize().await.unwrap();

    let writer = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.set_state("k", json!("A"), "a").await })
    };
    store.entered.notified().await;

    engine.shutdown();
    engine.initialize().await.unwrap();
    engine.acquire_lock("k").await.unwrap();

    store.open(1);
    let result = writer.await.unwrap();
    assert!(matches!(result, Err(SyncError::NotInitialized)));
    assert_eq!(engine.get_state("k").unwrap(), None);
    assert_eq!(store.read_record("k").await.unwrap().unwrap().version, 1);

    // The stale writer's guard must not have freed the new holder's lock
    assert!(engine.is_locked("k"));
    let intruder =
        tokio::time::timeout(Duration::from_millis(30), engine.acquire_lock("k")).await;
    assert!(intruder.is_err());
    engine.release_lock("k").unwrap();
    assert!(!engine.is_locked("k"));
}
