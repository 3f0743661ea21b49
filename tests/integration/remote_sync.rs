use crate::support::{file_engine, memory_engine, FlakyStore};
use serde_json::json;
use statesync::{
    FileStateStore, NullSink, StateRecord, StateStore, StateSyncEngine, StorageError, SyncError,
};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn load_adopts_version_from_storage() {
    let (engine, store, _sink) = memory_engine().await;
    engine.set_state("cfg", json!({"mode": "local"}), "a").await.unwrap();

    // A peer wrote straight to storage
    let peer = StateRecord::new("cfg", json!({"mode": "peer"}), 42, "peer-agent");
    store.write_record(&peer).await.unwrap();
    assert_eq!(engine.get_version("cfg").unwrap(), Some(1));

    let loaded = engine.load_remote_state("cfg").await.unwrap();
    assert_eq!(loaded, peer);
    assert_eq!(engine.get_version("cfg").unwrap(), Some(42));
    assert_eq!(engine.get_state("cfg").unwrap(), Some(json!({"mode": "peer"})));

    // Next local write continues from the loaded baseline
    assert_eq!(engine.set_state("cfg", json!({}), "a").await.unwrap(), 43);
}

#[tokio::test]
async fn load_may_lower_the_version() {
    let (engine, store, _sink) = memory_engine().await;
    for _ in 0..3 {
        engine.set_state("x", json!(1), "a").await.unwrap();
    }
    store
        .write_record(&StateRecord::new("x", json!(0), 1, "peer"))
        .await
        .unwrap();
    engine.load_remote_state("x").await.unwrap();
    assert_eq!(engine.get_version("x").unwrap(), Some(1));
}

#[tokio::test]
async fn load_of_missing_record_is_not_found() {
    let (engine, _store, _sink) = memory_engine().await;
    let err = engine.load_remote_state("absent").await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(id) if id == "absent"));
    assert_eq!(engine.get_state("absent").unwrap(), None);
}

#[tokio::test]
async fn failed_read_surfaces_and_keeps_cache() {
    let store = Arc::new(FlakyStore::default());
    let engine = StateSyncEngine::new(store.clone(), Arc::new(NullSink));
    engine.initialize().await.unwrap();
    engine.set_state("k", json!(1), "a").await.unwrap();

    store.set_failing(true);
    let err = engine.load_remote_state("k").await.unwrap_err();
    assert!(matches!(err, SyncError::Persistence(_)));
    assert_eq!(engine.get_state("k").unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn sync_all_repopulates_after_shutdown() {
    let (engine, store, _sink) = memory_engine().await;
    engine.set_state("a", json!(1), "x").await.unwrap();
    engine.set_state("b", json!(2), "x").await.unwrap();
    engine.set_state("b", json!(3), "x").await.unwrap();
    store
        .write_record(&StateRecord::new("c", json!("peer"), 7, "peer"))
        .await
        .unwrap();

    engine.shutdown();
    engine.initialize().await.unwrap();
    assert!(engine.get_state_list().unwrap().is_empty());

    assert_eq!(engine.sync_all_states().await.unwrap(), 3);
    assert_eq!(engine.get_state("b").unwrap(), Some(json!(3)));
    assert_eq!(engine.get_version("b").unwrap(), Some(2));
    assert_eq!(engine.get_version("c").unwrap(), Some(7));
}

#[tokio::test]
async fn sync_all_keeps_local_only_entries() {
    let (engine, store, _sink) = memory_engine().await;
    engine.set_state("local-only", json!(true), "x").await.unwrap();
    store.delete_record("local-only").await.unwrap();
    store
        .write_record(&StateRecord::new("remote", json!(1), 1, "peer"))
        .await
        .unwrap();

    engine.sync_all_states().await.unwrap();
    assert_eq!(engine.get_state("local-only").unwrap(), Some(json!(true)));
    assert_eq!(engine.get_state("remote").unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn peers_share_state_through_the_directory() {
    let dir = TempDir::new().unwrap();
    let alice = file_engine(&dir).await;
    let bob = file_engine(&dir).await;

    alice
        .set_state("handoff", json!({"owner": "alice"}), "alice")
        .await
        .unwrap();
    assert_eq!(bob.get_state("handoff").unwrap(), None);

    let seen = bob.load_remote_state("handoff").await.unwrap();
    assert_eq!(seen.agent_id, "alice");
    assert_eq!(
        bob.set_state("handoff", json!({"owner": "bob"}), "bob")
            .await
            .unwrap(),
        2
    );

    let back = alice.load_remote_state("handoff").await.unwrap();
    assert_eq!(back.version, 2);
    assert_eq!(back.state["owner"], "bob");
}

#[tokio::test]
async fn state_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let engine = file_engine(&dir).await;
        engine.set_state("journal", json!(["a"]), "w").await.unwrap();
        engine.set_state("journal", json!(["a", "b"]), "w").await.unwrap();
        engine.shutdown();
    }

    let store = Arc::new(FileStateStore::under(dir.path()));
    let engine = StateSyncEngine::new(store, Arc::new(NullSink));
    engine.initialize().await.unwrap();
    assert_eq!(engine.sync_all_states().await.unwrap(), 1);
    assert_eq!(engine.get_state("journal").unwrap(), Some(json!(["a", "b"])));
    assert_eq!(engine.set_state("journal", json!([]), "w").await.unwrap(), 3);
}

#[tokio::test]
async fn sync_all_loads_past_a_corrupt_record() {
    let dir = TempDir::new().unwrap();
    let engine = file_engine(&dir).await;
    let peer = FileStateStore::under(dir.path());
    peer.write_record(&StateRecord::new("ok", json!(1), 3, "peer"))
        .await
        .unwrap();
    // Sorts before "ok"
    std::fs::write(peer.path_for("broken").unwrap(), b"{oops").unwrap();

    let err = engine.sync_all_states().await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Persistence(StorageError::Corrupt { ref id, .. }) if id == "broken"
    ));
    assert_eq!(engine.get_version("ok").unwrap(), Some(3));
    assert_eq!(engine.get_state("broken").unwrap(), None);
}
