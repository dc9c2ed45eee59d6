//! `import:content` tasks from dispatch through persistence and re-enqueue.

use catalog_core::import::{ImportProcessor, ImporterRegistry};
use catalog_core::tasks::{
    DispatchStatus, ImportContentPayload, InMemoryBroker, RetryPolicy, TaskDispatcher,
    TaskKind, TaskMessage, TaskPayload, TaskQueue,
};
use catalog_model::{AssetType, SeriesID};
use std::sync::Arc;
use std::time::Duration;

#[path = "support/mod.rs"]
mod support;

use support::{DownBroker, MemoryStore};

struct Harness {
    store: Arc<MemoryStore>,
    broker: Arc<InMemoryBroker>,
    dispatcher: TaskDispatcher,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let broker = Arc::new(InMemoryBroker::new());
    let processor = Arc::new(ImportProcessor::new(
        ImporterRegistry::with_defaults(),
        store.clone(),
        TaskQueue::new(broker.clone()),
    ));
    Harness {
        store,
        broker,
        dispatcher: TaskDispatcher::new(
            processor.routes(),
            RetryPolicy::fixed(3, Duration::from_secs(1)),
        ),
    }
}

fn import_message(source_type: &str, series_id: &str) -> TaskMessage {
    TaskMessage::new(&TaskPayload::ImportContent(ImportContentPayload {
        source_type: source_type.into(),
        source_url: "https://youtube.com/watch?v=abc123".into(),
        series_id: series_id.into(),
    }))
    .expect("payload encodes")
}

#[tokio::test]
async fn youtube_import_persists_episode_asset_and_queues_indexing() {
    let h = harness();
    let series = h.store.seed_series("Field Notes").await;

    let status = h
        .dispatcher
        .dispatch(&import_message("youtube", &series.id.to_string()))
        .await;
    assert_eq!(status, DispatchStatus::Success);

    let episodes = h.store.episodes().await;
    assert_eq!(episodes.len(), 1);
    let episode = &episodes[0];
    assert_eq!(episode.series_id, series.id);
    assert_eq!(episode.title, "YouTube Import");

    let assets = h.store.assets().await;
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].episode_id, episode.id);
    assert_eq!(assets[0].asset_type, AssetType::Video);
    assert_eq!(
        assets[0].url.as_deref(),
        Some("https://youtube.com/watch?v=abc123")
    );

    let pending = h.broker.pending(TaskKind::IndexEpisode).await;
    assert_eq!(pending.len(), 1);
    let TaskPayload::IndexEpisode(payload) = pending[0].decode().unwrap() else {
        panic!("expected an index-episode payload");
    };
    assert_eq!(payload.episode.id, episode.id);
    assert_eq!(payload.assets, assets);
}

#[tokio::test]
async fn unsupported_source_is_dead_lettered_without_touching_the_store() {
    let h = harness();

    for source in ["unsupported", "YouTube", "vimeo"] {
        let status = h
            .dispatcher
            .dispatch(&import_message(source, &SeriesID::new().to_string()))
            .await;
        let DispatchStatus::DeadLetter { error } = status else {
            panic!("expected dead letter for {source}, got {status:?}");
        };
        assert!(error.contains("not found"), "{error}");
    }

    assert!(h.store.calls().await.is_empty());
}

#[tokio::test]
async fn malformed_series_id_is_permanent() {
    let h = harness();
    let status = h
        .dispatcher
        .dispatch(&import_message("youtube", "not-a-uuid"))
        .await;
    assert!(matches!(status, DispatchStatus::DeadLetter { .. }));
    assert!(h.store.calls().await.is_empty());
}

#[tokio::test]
async fn store_outage_is_retried() {
    let h = harness();
    h.store.fail_writes(true);

    let status = h
        .dispatcher
        .dispatch(&import_message("youtube", &SeriesID::new().to_string()))
        .await;
    let DispatchStatus::Retry { error, .. } = status else {
        panic!("expected retry, got {status:?}");
    };
    assert!(error.contains("failed to create episode"), "{error}");
    assert_eq!(h.store.calls().await, vec!["create_episode"]);
}

#[tokio::test]
async fn index_enqueue_failure_does_not_fail_the_import() {
    let store = Arc::new(MemoryStore::new());
    let processor = Arc::new(ImportProcessor::new(
        ImporterRegistry::with_defaults(),
        store.clone(),
        TaskQueue::new(Arc::new(DownBroker)),
    ));
    let series = store.seed_series("Field Notes").await;

    let episode = processor
        .import(ImportContentPayload {
            source_type: "youtube".into(),
            source_url: "https://youtube.com/watch?v=abc123".into(),
            series_id: series.id.to_string(),
        })
        .await
        .unwrap();

    assert_eq!(store.episodes().await, vec![episode]);
}
