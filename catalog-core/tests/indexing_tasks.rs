//! Index task handlers driven through the dispatcher, as a worker would.

use catalog_core::indexing::{IndexProvisioner, SearchIndexer};
use catalog_core::search::{IndexNames, SearchEngine, SearchRequest};
use catalog_core::tasks::{
    DeleteEpisodePayload, DeleteSeriesPayload, DispatchStatus, IndexEpisodePayload,
    IndexSeriesPayload, RetryPolicy, TaskDispatcher, TaskMessage, TaskPayload,
};
use catalog_model::{Episode, EpisodeID, SeriesID};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

#[path = "support/mod.rs"]
mod support;

use support::{MemoryStore, RecordingSearch};

fn names() -> IndexNames {
    IndexNames::new("test")
}

fn dispatcher(search: Arc<RecordingSearch>) -> TaskDispatcher {
    let indexer = Arc::new(SearchIndexer::new(search, names()));
    TaskDispatcher::new(
        indexer.routes(),
        RetryPolicy::fixed(3, Duration::from_millis(10)),
    )
}

fn episode(series_id: SeriesID) -> Episode {
    let now = Utc::now();
    Episode {
        id: EpisodeID::new(),
        series_id,
        title: "Night Shift".into(),
        description: Some("Harbor workers after dark".into()),
        duration_seconds: Some(1800),
        publish_date: None,
        created_at: now,
        updated_at: now,
    }
}

fn message(payload: TaskPayload) -> TaskMessage {
    TaskMessage::new(&payload).expect("payload encodes")
}

#[tokio::test]
async fn index_episode_task_writes_one_document_under_the_episode_id() {
    let search = Arc::new(RecordingSearch::new());
    let dispatcher = dispatcher(search.clone());
    let episode = episode(SeriesID::new());

    let status = dispatcher
        .dispatch(&message(TaskPayload::IndexEpisode(IndexEpisodePayload {
            episode: episode.clone(),
            assets: vec![],
        })))
        .await;

    assert_eq!(status, DispatchStatus::Success);
    assert_eq!(
        search.indexed().await,
        vec![(names().episodes(), episode.id.to_string())]
    );
}

#[tokio::test]
async fn reindexing_keeps_one_document_per_id_and_filter_finds_it() {
    let search = Arc::new(RecordingSearch::new());
    let dispatcher = dispatcher(search.clone());
    let store = MemoryStore::new();
    let series = store.seed_series("Harbor Lights").await;

    let payload = TaskPayload::IndexSeries(IndexSeriesPayload {
        series: series.clone(),
    });
    for _ in 0..2 {
        assert_eq!(
            dispatcher.dispatch(&message(payload.clone())).await,
            DispatchStatus::Success
        );
    }
    assert_eq!(search.inner.document_count(&names().series()).await, 1);

    let hits = search
        .search(
            &names().series(),
            &SearchRequest::new("", 1, 20).filter("id", series.id.to_string()),
        )
        .await
        .unwrap();
    assert_eq!(hits.total, 1);
    assert_eq!(hits.hits[0]["title"], "Harbor Lights");
}

#[tokio::test]
async fn deleting_a_document_that_was_never_indexed_succeeds() {
    let search = Arc::new(RecordingSearch::new());
    let dispatcher = dispatcher(search.clone());
    IndexProvisioner::new(search.clone(), names())
        .ensure_indices()
        .await
        .unwrap();

    let status = dispatcher
        .dispatch(&message(TaskPayload::DeleteEpisode(DeleteEpisodePayload {
            episode_id: EpisodeID::new().to_string(),
        })))
        .await;
    assert_eq!(status, DispatchStatus::Success);
}

#[tokio::test]
async fn not_found_from_the_engine_counts_as_deleted() {
    let search = Arc::new(RecordingSearch::new());
    search.set_missing_on_delete(true);
    let dispatcher = dispatcher(search.clone());

    let episode = dispatcher
        .dispatch(&message(TaskPayload::DeleteEpisode(DeleteEpisodePayload {
            episode_id: EpisodeID::new().to_string(),
        })))
        .await;
    assert_eq!(episode, DispatchStatus::Success);

    let series = dispatcher
        .dispatch(&message(TaskPayload::DeleteSeries(DeleteSeriesPayload {
            series_id: SeriesID::new().to_string(),
        })))
        .await;
    assert_eq!(series, DispatchStatus::Success);
}

#[tokio::test]
async fn search_outage_is_retried_with_context() {
    let search = Arc::new(RecordingSearch::new());
    search.set_unavailable(true);
    let dispatcher = dispatcher(search.clone());
    let episode = episode(SeriesID::new());

    let status = dispatcher
        .dispatch(&message(TaskPayload::IndexEpisode(IndexEpisodePayload {
            episode: episode.clone(),
            assets: vec![],
        })))
        .await;

    let DispatchStatus::Retry { error, delay } = status else {
        panic!("expected retry, got {status:?}");
    };
    assert_eq!(delay, Duration::from_millis(10));
    assert!(error.starts_with(&format!("search:index_episode {}", episode.id)));
    assert!(error.ends_with("engine unavailable"));
}

#[tokio::test]
async fn provisioning_creates_both_indices_once() {
    let search = Arc::new(RecordingSearch::new());
    let provisioner = IndexProvisioner::new(search.clone(), names());

    let created = provisioner.ensure_indices().await.unwrap();
    assert_eq!(created, vec![names().series(), names().episodes()]);
    assert!(provisioner.ensure_indices().await.unwrap().is_empty());
    assert!(search.index_exists(&names().episodes()).await.unwrap());
}
