//! Generation runs end to end against a scripted model.

use super::{open_temp_store, sample_record, ScriptedModel};
use product_studio::generation::{Generator, ModelError, StudioError};
use product_studio::history::{export_history, import_history, ImportPolicy};
use product_studio::models::{AspectRatio, GenerationSettings, ImageBlob};
use product_studio::session::StudioSession;
use product_studio::StudioConfig;
use std::sync::Arc;

fn photo() -> ImageBlob {
    ImageBlob::new(vec![0xFF, 0xD8, 0xFF, 0xDB, 1, 2, 3], "image/jpeg")
}

fn settings(variants: u32) -> GenerationSettings {
    GenerationSettings {
        aspect_ratio: AspectRatio::Portrait4x5,
        number_of_variants: variants,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_session_generate_and_refresh() {
    let (store, _temp_dir) = open_temp_store().await;
    let mut session = StudioSession::new(store, "product-studio");
    let model = Arc::new(ScriptedModel::new());
    let generator = Generator::from_config(Arc::clone(&model), &StudioConfig::default());

    let record = session
        .generate(&generator, photo(), settings(3))
        .await
        .unwrap();
    assert_eq!(record.variants.len(), 3);
    assert_eq!(record.metadata.strain_name, "Gelato");
    let handle = record.variants[0].url.clone();
    assert_eq!(model.generate_calls(), 3);

    let blob = session.resolve(&handle).unwrap();
    assert_eq!(blob.mime_type, "image/png");

    let history = session.refresh_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].variants.len(), 3);
    assert_eq!(session.live_handle_count(), 6);

    let added = session.regenerate(&generator, settings(2)).await.unwrap();
    assert_eq!(added, 2);
    assert_eq!(session.current().unwrap().variants.len(), 5);
    assert_eq!(session.store().count().await.unwrap(), 1);

    assert_eq!(session.close(), 8);
}

#[tokio::test]
async fn test_failed_generation_keeps_history() {
    let (store, _temp_dir) = open_temp_store().await;
    store.put(&sample_record("kept", 10, 2)).await.unwrap();
    let before = store.get_all_raw().await.unwrap();

    let mut session = StudioSession::new(store, "product-studio");
    let generator = Generator::from_config(
        Arc::new(ScriptedModel::failing(ModelError::ContentFiltered(
            "blocked".to_string(),
        ))),
        &StudioConfig::default(),
    );

    let result = session.generate(&generator, photo(), settings(2)).await;

    assert!(matches!(
        result,
        Err(StudioError::Model(ModelError::ContentFiltered(_)))
    ));
    assert!(session.current().is_none());
    assert_eq!(session.live_handle_count(), 0);
    assert_eq!(session.store().get_all_raw().await.unwrap(), before);
}

#[tokio::test]
async fn test_analysis_failure_surfaces() {
    let (store, _temp_dir) = open_temp_store().await;
    let mut session = StudioSession::new(store, "product-studio");
    let generator = Generator::from_config(Arc::new(ScriptedModel::new()), &StudioConfig::default());

    let result = session
        .generate(&generator, ImageBlob::new(Vec::new(), "image/jpeg"), settings(1))
        .await;

    assert!(matches!(
        result,
        Err(StudioError::Model(ModelError::NoImageData))
    ));
    assert_eq!(session.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_generated_history_survives_transfer() {
    let (source_store, _dir_a) = open_temp_store().await;
    let (target_store, _dir_b) = open_temp_store().await;
    let mut session = StudioSession::new(source_store, "product-studio");
    let generator = Generator::from_config(Arc::new(ScriptedModel::new()), &StudioConfig::default());

    let generated = session
        .generate(&generator, photo(), settings(2))
        .await
        .unwrap()
        .clone();

    let document = export_history(session.store(), 1).await.unwrap();
    import_history(&target_store, &document, ImportPolicy::default())
        .await
        .unwrap();

    let restored = target_store.get_all_raw().await.unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].id, generated.id);
    assert_eq!(restored[0].source_image, generated.source_image);
    for (a, b) in restored[0].variants.iter().zip(&generated.variants) {
        assert_eq!(a.blob, b.blob);
        assert!(a.url.is_empty());
    }
}
