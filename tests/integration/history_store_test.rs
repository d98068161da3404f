//! Store behavior through the public API: persistence, ordering, display
//! handle hygiene and crash leftovers.

use super::{open_temp_store, sample_record};
use product_studio::history::{HistoryError, HistoryStore};
use product_studio::object_url::ObjectUrlRegistry;
use product_studio::session::StudioSession;
use product_studio::{CapacityProbe, StudioConfig};
use tempfile::TempDir;

#[tokio::test]
async fn test_get_all_newest_first() {
    let (store, _temp_dir) = open_temp_store().await;
    store.put(&sample_record("A", 100, 1)).await.unwrap();
    store.put(&sample_record("B", 200, 1)).await.unwrap();

    let mut registry = ObjectUrlRegistry::new();
    let records = store.get_all(&mut registry).await.unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["B", "A"]);
}

#[tokio::test]
async fn test_sort_order_non_increasing() {
    let (store, _temp_dir) = open_temp_store().await;
    for (i, ts) in [50, 10, 90, 10, 70, 30].iter().enumerate() {
        store
            .put(&sample_record(&format!("r{}", i), *ts, 0))
            .await
            .unwrap();
    }

    let records = store.get_all_raw().await.unwrap();
    assert_eq!(records.len(), 6);
    assert!(records.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[tokio::test]
async fn test_strip_on_write_rehydrate_on_read() {
    let (store, _temp_dir) = open_temp_store().await;
    let mut registry = ObjectUrlRegistry::new();
    let mut record = sample_record("r1", 100, 3);
    record.variants[1].blob = None;
    record.attach_object_urls(&mut registry);

    store.put(&record).await.unwrap();

    // At rest, no variant carries a handle
    for raw in store.get_all_raw().await.unwrap() {
        assert!(raw.variants.iter().all(|v| v.url.is_empty()));
    }

    let mut read_registry = ObjectUrlRegistry::new();
    let loaded = store.get_all(&mut read_registry).await.unwrap();
    let variants = &loaded[0].variants;
    assert!(!variants[0].url.is_empty());
    assert_eq!(variants[1].url, "");
    assert!(!variants[2].url.is_empty());

    // Fresh handles, not the ones attached before the write
    assert!(!registry.is_tracked(&variants[0].url));
    assert_eq!(
        read_registry.resolve(&variants[0].url),
        variants[0].blob.as_ref()
    );
}

#[tokio::test]
async fn test_idempotent_delete() {
    let (store, _temp_dir) = open_temp_store().await;
    store.put(&sample_record("keep", 1, 2)).await.unwrap();
    let before = store.get_all_raw().await.unwrap();

    store.delete("never-stored").await.unwrap();
    store.delete("never-stored").await.unwrap();

    assert_eq!(store.get_all_raw().await.unwrap(), before);
}

#[tokio::test]
async fn test_replace_semantics() {
    let (store, _temp_dir) = open_temp_store().await;
    store.put(&sample_record("same", 1, 3)).await.unwrap();

    let mut second = sample_record("same", 2, 1);
    second.metadata.fruit_flavor = "Mango".to_string();
    store.put(&second).await.unwrap();

    let records = store.get_all_raw().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metadata.fruit_flavor, "Mango");
    assert_eq!(records[0].variants.len(), 1);
}

#[tokio::test]
async fn test_clear_three_records() {
    let (store, _temp_dir) = open_temp_store().await;
    for (id, ts) in [("a", 1), ("b", 2), ("c", 3)] {
        store.put(&sample_record(id, ts, 1)).await.unwrap();
    }

    store.clear().await.unwrap();

    let mut registry = ObjectUrlRegistry::new();
    assert!(store.get_all(&mut registry).await.unwrap().is_empty());
    assert_eq!(registry.live_count(), 0);
}

#[tokio::test]
async fn test_handle_hygiene_across_refreshes() {
    let (store, _temp_dir) = open_temp_store().await;
    store.put(&sample_record("a", 1, 2)).await.unwrap();
    store.put(&sample_record("b", 2, 3)).await.unwrap();

    let mut registry = ObjectUrlRegistry::new();
    let mut minted = 0;
    for _ in 0..4 {
        let records = store.get_all(&mut registry).await.unwrap();
        minted += records.iter().map(|r| r.object_urls().count()).sum::<usize>();
    }
    assert_eq!(registry.live_count(), minted);

    let released = registry.revoke_all();
    assert_eq!(released, minted);
    assert_eq!(registry.live_count(), 0);
    assert_eq!(registry.revoked_count(), minted);

    // Nothing is released twice
    assert_eq!(registry.revoke_all(), 0);
    assert_eq!(registry.revoked_count(), minted);
}

#[tokio::test]
async fn test_session_round() {
    let temp_dir = TempDir::new().unwrap();
    let config = StudioConfig {
        data_dir: temp_dir.path().to_path_buf(),
        object_url_origin: "studio-test".to_string(),
        ..Default::default()
    };

    let mut session = StudioSession::open(&config).await.unwrap();
    session.store().put(&sample_record("a", 1, 2)).await.unwrap();

    session.refresh_history().await.unwrap();
    session.show_record("a").await.unwrap();
    assert_eq!(session.live_handle_count(), 4);

    let handle = session.current().unwrap().variants[0].url.clone();
    assert!(handle.starts_with("blob:studio-test/"));

    assert_eq!(session.close(), 4);
}

#[tokio::test]
async fn test_reopen_after_downgrade_fails() {
    let temp_dir = TempDir::new().unwrap();
    HistoryStore::open(temp_dir.path(), "Versioned", 2)
        .await
        .unwrap();

    let result = HistoryStore::open(temp_dir.path(), "Versioned", 1).await;
    assert!(matches!(result, Err(HistoryError::SchemaUpgradeFailed(_))));

    // The newer version still opens
    let store = HistoryStore::open(temp_dir.path(), "Versioned", 2)
        .await
        .unwrap();
    assert_eq!(store.version(), 2);
}

#[tokio::test]
async fn test_capacity_probe_on_store() {
    let temp_dir = TempDir::new().unwrap();
    let config = StudioConfig {
        data_dir: temp_dir.path().to_path_buf(),
        storage_quota_mb: Some(1),
        ..Default::default()
    };
    let store = HistoryStore::open_with_config(&config).await.unwrap();
    store.put(&sample_record("a", 1, 2)).await.unwrap();

    let probe = CapacityProbe::from_config(&config);
    let estimate = probe.estimate().await.unwrap();
    assert!(estimate.usage > 0);
    assert_eq!(estimate.quota, 1024 * 1024);
    assert!(estimate.percent_used > 0.0 && estimate.percent_used < 100.0);

    assert!(probe.request_durability().await);
    assert!(probe.is_durable().await);

    // The marker is not mistaken for history data
    assert_eq!(store.count().await.unwrap(), 1);
}
