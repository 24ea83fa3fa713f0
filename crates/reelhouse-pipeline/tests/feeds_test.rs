//! Feed runs: full-replace flags, pagination and abort behaviour.

mod common;

use common::{detail, enricher, id, lists, FakeMetadata, CURRENT_YEAR};
use reelhouse_core::{CatalogRecord, FeedConfig};
use reelhouse_db::{CatalogStore, MemoryCatalogStore};
use reelhouse_pipeline::{FeedOrchestrator, PipelineError, SourceGate};
use reelhouse_sources::FeedKind;
use std::sync::Arc;

fn existing(raw: i64, title: &str, now_playing: bool, popular: bool) -> CatalogRecord {
    let mut record = CatalogRecord::new(id(raw), title);
    record.release_year = Some(CURRENT_YEAR);
    record.now_playing = now_playing;
    record.is_popular = popular;
    record
}

fn orchestrator(
    store: Arc<MemoryCatalogStore>,
    metadata: Arc<FakeMetadata>,
    indexed: &[(i64, &str)],
) -> FeedOrchestrator {
    let enricher = Arc::new(enricher(store, metadata.clone(), lists(indexed, &[])));
    let config = FeedConfig {
        workers: 4,
        ..FeedConfig::default()
    };
    FeedOrchestrator::new(enricher, metadata, SourceGate::unlimited(), config)
}

async fn flagged(store: &MemoryCatalogStore, pick: fn(&CatalogRecord) -> bool) -> Vec<i64> {
    let mut ids: Vec<i64> = store
        .list_all(100)
        .await
        .expect("list records")
        .iter()
        .filter(|r| pick(r))
        .map(|r| r.external_id.get())
        .collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn test_now_playing_feed_replaces_flag_set() {
    let store = Arc::new(MemoryCatalogStore::with_records([
        existing(1, "Old One", true, false),
        existing(2, "Old Two", true, false),
        existing(3, "Old Three", true, false),
    ]));
    let metadata = Arc::new(FakeMetadata::default());
    metadata.add(detail(10, "New Ten", CURRENT_YEAR));
    metadata.add(detail(11, "New Eleven", CURRENT_YEAR));
    metadata.page(FeedKind::NowPlaying, 1, &[10, 11]);
    metadata.total_pages(FeedKind::NowPlaying, 1);

    let orchestrator = orchestrator(
        store.clone(),
        metadata,
        &[(1, "Old One"), (2, "Old Two"), (3, "Old Three"), (10, "New Ten"), (11, "New Eleven")],
    );

    let report = orchestrator
        .run_pages(FeedKind::NowPlaying, 3)
        .await
        .expect("run now playing feed");

    assert_eq!(report.flags_reset, 3);
    assert_eq!(report.pages_completed, 1);
    assert_eq!(report.outcomes.created, 2);
    assert_eq!(flagged(&store, |r| r.now_playing).await, vec![10, 11]);
}

#[tokio::test]
async fn test_popular_feed_flags_existing_records() {
    let store = Arc::new(MemoryCatalogStore::with_records([
        existing(1, "Was Popular", false, true),
        existing(2, "Now Popular", false, false),
    ]));
    let metadata = Arc::new(FakeMetadata::default());
    metadata.page(FeedKind::Popular, 1, &[2]);
    metadata.total_pages(FeedKind::Popular, 1);

    let orchestrator = orchestrator(
        store.clone(),
        metadata.clone(),
        &[(1, "Was Popular"), (2, "Now Popular")],
    );

    let report = orchestrator
        .run_pages(FeedKind::Popular, 1)
        .await
        .expect("run popular feed");

    assert_eq!(report.outcomes.existing, 1);
    assert_eq!(metadata.detail_calls(), 0);
    assert_eq!(flagged(&store, |r| r.is_popular).await, vec![2]);
}

#[tokio::test]
async fn test_failed_page_aborts_feed() {
    let store = Arc::new(MemoryCatalogStore::new());
    let metadata = Arc::new(FakeMetadata::default());
    metadata.add(detail(10, "Ten", CURRENT_YEAR));
    metadata.page(FeedKind::Discover, 1, &[10]);
    metadata.total_pages(FeedKind::Discover, 5);

    let orchestrator = orchestrator(store.clone(), metadata, &[(10, "Ten")]);

    let err = orchestrator
        .run_pages(FeedKind::Discover, 5)
        .await
        .expect_err("second page fails");

    match err {
        PipelineError::FeedAborted {
            feed,
            pages_completed,
            ..
        } => {
            assert_eq!(feed, FeedKind::Discover);
            assert_eq!(pages_completed, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.count().await.expect("count"), 1);
}

#[tokio::test]
async fn test_item_failures_do_not_stop_page() {
    let store = Arc::new(MemoryCatalogStore::new());
    let metadata = Arc::new(FakeMetadata::default());
    for raw in 20..25 {
        metadata.add(detail(raw, &format!("Item {raw}"), CURRENT_YEAR));
    }
    metadata.fail(22);
    metadata.page(FeedKind::Discover, 1, &[20, 21, 22, 23, 24, 99]);
    metadata.total_pages(FeedKind::Discover, 1);

    let indexed: Vec<(i64, String)> = (20..25).map(|raw| (raw, format!("Item {raw}"))).collect();
    let indexed: Vec<(i64, &str)> = indexed.iter().map(|(r, t)| (*r, t.as_str())).collect();
    let orchestrator = orchestrator(store.clone(), metadata, &indexed);

    let report = orchestrator
        .run_pages(FeedKind::Discover, 2)
        .await
        .expect("run discover feed");

    assert_eq!(report.flags_reset, 0);
    assert_eq!(report.outcomes.created, 4);
    assert_eq!(report.outcomes.failed, 1);
    assert_eq!(report.outcomes.unresolved, 1);
    assert_eq!(store.count().await.expect("count"), 4);
}
