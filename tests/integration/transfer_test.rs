//! Export/import through the public API.

use super::{open_temp_store, sample_record};
use product_studio::history::{
    export_history, import_history, parse_export_document, HistoryError, ImportPolicy,
    SourceImage, EXPORT_FORMAT_VERSION,
};
use serde_json::{json, Value};

#[tokio::test]
async fn test_round_trip_byte_identical() {
    let (source, _dir_a) = open_temp_store().await;
    let (target, _dir_b) = open_temp_store().await;

    let mut legacy = sample_record("legacy", 50, 1);
    legacy.source_image = SourceImage::Reference("uploads/2023/photo.jpg".to_string());
    let originals = vec![
        sample_record("one", 300, 4),
        sample_record("two", 200, 1),
        legacy,
    ];
    for record in &originals {
        source.put(record).await.unwrap();
    }

    let document = export_history(&source, EXPORT_FORMAT_VERSION).await.unwrap();
    let summary = import_history(&target, &document, ImportPolicy::AbortOnFirstFailure)
        .await
        .unwrap();
    assert_eq!(summary.imported, 3);

    let restored = target.get_all_raw().await.unwrap();
    assert_eq!(restored.len(), originals.len());
    for original in &originals {
        let copy = restored.iter().find(|r| r.id == original.id).unwrap();
        assert_eq!(copy.timestamp, original.timestamp);
        assert_eq!(copy.metadata, original.metadata);
        assert_eq!(copy.settings, original.settings);
        assert_eq!(copy.source_image, original.source_image);
        assert_eq!(copy.variants.len(), original.variants.len());
        for (a, b) in copy.variants.iter().zip(&original.variants) {
            assert_eq!(a.id, b.id);
            assert_eq!(
                a.blob.as_ref().map(|blob| blob.as_bytes()),
                b.blob.as_ref().map(|blob| blob.as_bytes())
            );
        }
    }
}

#[tokio::test]
async fn test_export_is_stable_text() {
    let (store, _temp_dir) = open_temp_store().await;
    store.put(&sample_record("r1", 100, 2)).await.unwrap();

    let document = export_history(&store, EXPORT_FORMAT_VERSION).await.unwrap();
    let value: Value = serde_json::from_str(&document).unwrap();

    // Field order in the output follows the document layout
    let version_at = document.find("\"version\"").unwrap();
    let exported_at = document.find("\"exportedAt\"").unwrap();
    let items_at = document.find("\"items\"").unwrap();
    assert!(version_at < exported_at && exported_at < items_at);

    assert_eq!(value["items"][0]["metadata"]["thcPercent"], json!(21.5));
    assert_eq!(value["items"][0]["settings"]["nyMode"], json!(true));
    assert!(document.contains('\n'));
}

#[tokio::test]
async fn test_items_not_array_zero_writes() {
    let (store, _temp_dir) = open_temp_store().await;
    store.put(&sample_record("existing", 1, 1)).await.unwrap();
    let before = store.get_all_raw().await.unwrap();

    for items in [json!("oops"), json!(42), json!({"id": "x"}), Value::Null] {
        let document = json!({"version": 1, "exportedAt": 0, "items": items}).to_string();
        let result = import_history(&store, &document, ImportPolicy::BestEffort).await;
        assert!(matches!(result, Err(HistoryError::InvalidFormat(_))));
    }

    assert_eq!(store.get_all_raw().await.unwrap(), before);
}

#[tokio::test]
async fn test_missing_required_settings_rejected() {
    let (store, _temp_dir) = open_temp_store().await;
    let document = json!({
        "version": 1,
        "exportedAt": 0,
        "items": [{
            "id": "a",
            "timestamp": 1,
            "metadata": {
                "strainName": "X",
                "fruitFlavor": "Y",
                "primaryColor": "Z",
                "secondaryColors": [],
                "notes": ""
            },
            "sourceImage": "",
            "variants": [],
            "settings": {"aspectRatio": "1:1"}
        }]
    })
    .to_string();

    let result = import_history(&store, &document, ImportPolicy::default()).await;
    assert!(matches!(result, Err(HistoryError::InvalidFormat(_))));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[test]
fn test_parse_tolerates_minimal_document() {
    let document = json!({
        "items": [{
            "id": "a",
            "timestamp": 1,
            "metadata": {
                "strainName": "X",
                "fruitFlavor": "Y",
                "primaryColor": "Z",
                "secondaryColors": ["W"],
                "notes": ""
            },
            "sourceImage": "data:image/png;base64,iVBORw0KGgo=",
            "variants": [{"id": "v", "blob": "", "timestamp": 1}],
            "settings": {"aspectRatio": "16:9", "imageSize": "2K", "numberOfVariants": 1}
        }]
    })
    .to_string();

    let records = parse_export_document(&document).unwrap();
    assert_eq!(records.len(), 1);
    let blob = records[0].source_image.as_blob().unwrap();
    assert_eq!(blob.mime_type, "image/png");
    assert_eq!(blob.len(), 8);
    assert!(records[0].variants[0].blob.is_none());
}

#[tokio::test]
async fn test_write_failures_follow_policy() {
    let (source, _dir_a) = open_temp_store().await;
    source.put(&sample_record("a", 1, 1)).await.unwrap();
    source.put(&sample_record("b", 2, 1)).await.unwrap();
    let document = export_history(&source, EXPORT_FORMAT_VERSION).await.unwrap();

    let (target, _dir_b) = open_temp_store().await;
    // Blob writes fail once the blob directory is replaced by a plain file
    let blobs = target.path().join("blobs");
    std::fs::remove_dir_all(&blobs).unwrap();
    std::fs::write(&blobs, b"in the way").unwrap();

    let summary = import_history(&target, &document, ImportPolicy::BestEffort)
        .await
        .unwrap();
    assert_eq!(summary.imported, 0);
    assert!(!summary.is_complete());
    let mut failed: Vec<&str> = summary.failed.iter().map(|f| f.id.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["a", "b"]);

    let result = import_history(&target, &document, ImportPolicy::AbortOnFirstFailure).await;
    assert!(matches!(result, Err(HistoryError::WriteFailed(_))));
    assert_eq!(target.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reference_sources_survive_round_trip() {
    let (source, _dir_a) = open_temp_store().await;
    let (target, _dir_b) = open_temp_store().await;

    let references = [
        "data:image/svg+xml,%3Csvg%3E",
        "data:text/plain;charset=utf-8,label",
        "https://cdn.example.com/products/42.jpg",
    ];
    for (i, reference) in references.iter().enumerate() {
        let mut record = sample_record(&format!("ref-{}", i), i as i64, 1);
        record.source_image = SourceImage::Reference(reference.to_string());
        source.put(&record).await.unwrap();
    }

    let document = export_history(&source, EXPORT_FORMAT_VERSION).await.unwrap();
    let summary = import_history(&target, &document, ImportPolicy::default())
        .await
        .unwrap();
    assert_eq!(summary.imported, references.len());

    assert_eq!(
        target.get_all_raw().await.unwrap(),
        source.get_all_raw().await.unwrap()
    );
}

#[tokio::test]
async fn test_long_ids_survive_round_trip() {
    let (source, _dir_a) = open_temp_store().await;
    let (target, _dir_b) = open_temp_store().await;
    let id = format!("imported-from-another-store/{}", "x".repeat(240));
    source.put(&sample_record(&id, 1, 2)).await.unwrap();

    let document = export_history(&source, EXPORT_FORMAT_VERSION).await.unwrap();
    import_history(&target, &document, ImportPolicy::default())
        .await
        .unwrap();

    let restored = target.get_all_raw().await.unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].id, id);
}
