//! Catalog sweeps over in-memory stores.

mod common;

use common::{
    availability_machine, availability_page, detail, enricher, id, lists, rating_machine,
    rating_page, with_providers, with_recommendations, FakeMetadata, FakePages, FakeRating,
};
use reelhouse_core::{CachedUrl, CatalogRecord, ScraperKind, SweepConfig};
use reelhouse_db::{CatalogStore, MemoryCatalogStore};
use reelhouse_pipeline::{Enricher, PipelineError, RunningSweeps, SweepKind, SweepRunner};
use std::sync::Arc;
use std::time::Duration;

fn record(raw: i64, title: &str, year: i32) -> CatalogRecord {
    let mut record = CatalogRecord::new(id(raw), title);
    record.release_year = Some(year);
    record
}

fn runner(enricher: Enricher) -> SweepRunner {
    let config = SweepConfig {
        workers: 3,
        progress_interval: 2,
        ..SweepConfig::default()
    };
    SweepRunner::new(Arc::new(enricher), config)
}

async fn stored(store: &MemoryCatalogStore, raw: i64) -> CatalogRecord {
    store
        .get_by_external_id(id(raw))
        .await
        .expect("read record")
        .expect("record exists")
}

#[tokio::test]
async fn test_availability_sweep_isolates_failures() {
    let store = Arc::new(MemoryCatalogStore::with_records(
        (1..=5).map(|raw| record(raw, &format!("Item {raw}"), 2020)),
    ));
    let metadata = Arc::new(FakeMetadata::default());
    for raw in 1..=5 {
        metadata.add(with_providers(
            detail(raw, &format!("Item {raw}"), 2020),
            &["Freevee", "Netflix"],
        ));
    }
    metadata.fail(3);

    let runner = runner(enricher(store.clone(), metadata, lists(&[], &[])));
    let summary = runner
        .run(SweepKind::Availability, None)
        .await
        .expect("run availability sweep");

    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(stored(&store, 1).await.top_provider.as_deref(), Some("Freevee"));
    assert!(stored(&store, 3).await.providers.is_empty());
}

#[tokio::test]
async fn test_availability_sweep_merges_scraped_providers() {
    let store = Arc::new(MemoryCatalogStore::with_records([
        record(1, "Arrival", 2016),
        record(2, "Sicario", 2015),
    ]));
    let metadata = Arc::new(FakeMetadata::default());
    metadata.add(with_providers(detail(1, "Arrival", 2016), &["Pluto TV"]));
    metadata.add(with_providers(detail(2, "Sicario", 2015), &["Freevee"]));

    let pages = Arc::new(FakePages::default());
    pages.add(
        "https://www.justwatch.com/us/movie/arrival",
        availability_page(2016, &["Tubi", "Netflix", "Pluto TV"]),
    );

    let enricher = enricher(store.clone(), metadata, lists(&[], &[]));
    let lists = enricher.lists().clone();
    let runner = runner(enricher).with_availability_scraper(availability_machine(pages.clone()));
    let summary = runner
        .run(SweepKind::Availability, None)
        .await
        .expect("run availability sweep");
    assert_eq!(summary.succeeded, 2);

    let arrival = stored(&store, 1).await;
    let names: Vec<&str> = arrival.providers.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Tubi TV", "Pluto TV"]);
    assert_eq!(arrival.top_provider.as_deref(), Some("Tubi TV"));
    assert_eq!(
        arrival.availability_url,
        Some(CachedUrl::Found(
            "https://www.justwatch.com/us/movie/arrival".to_string()
        ))
    );
    assert_eq!(
        lists.url_cache(ScraperKind::Availability).get(id(1)),
        arrival.availability_url
    );

    // no page anywhere: primary providers kept, miss cached
    let sicario = stored(&store, 2).await;
    assert_eq!(sicario.top_provider.as_deref(), Some("Freevee"));
    assert_eq!(sicario.availability_url, Some(CachedUrl::NotFound));
}

#[tokio::test]
async fn test_sweep_limit_and_ban_list() {
    let store = Arc::new(MemoryCatalogStore::with_records(
        (1..=6).map(|raw| record(raw, &format!("Item {raw}"), 2020)),
    ));
    let metadata = Arc::new(FakeMetadata::default());
    for raw in 1..=6 {
        metadata.add(with_recommendations(
            detail(raw, &format!("Item {raw}"), 2020),
            &[(100, "Popular Pick", 42.0)],
        ));
    }

    let runner = runner(enricher(store.clone(), metadata.clone(), lists(&[], &[2])));
    let summary = runner
        .run(SweepKind::Recommendations, Some(4))
        .await
        .expect("run recommendations sweep");

    assert_eq!(summary.attempted, 4);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(metadata.detail_calls(), 3);
    assert_eq!(stored(&store, 1).await.recommendations.len(), 1);
    assert!(stored(&store, 2).await.recommendations.is_empty());
}

#[tokio::test]
async fn test_secondary_sweep_skips_records_without_cross_reference() {
    let mut linked = record(1, "Linked", 2020);
    linked.cross_reference_id = Some("tt0000001".to_string());
    let store = Arc::new(MemoryCatalogStore::with_records([
        linked,
        record(2, "Unlinked", 2020),
    ]));
    let rating = Arc::new(FakeRating::ok());
    let enricher = enricher(
        store.clone(),
        Arc::new(FakeMetadata::default()),
        lists(&[], &[]),
    )
    .with_rating_source(rating);

    let summary = runner(enricher)
        .run(SweepKind::SecondaryRating, None)
        .await
        .expect("run secondary sweep");

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.success_rate(), Some(100.0));
    assert_eq!(stored(&store, 1).await.secondary_ratings.len(), 1);
    assert!(stored(&store, 2).await.secondary_ratings.is_empty());
}

#[tokio::test]
async fn test_rating_sweep_stores_rating_and_url() {
    let store = Arc::new(MemoryCatalogStore::with_records([
        record(1, "Dune", 2021),
        record(2, "Nowhere", 2021),
    ]));
    let pages = Arc::new(FakePages::default());
    pages.add("https://letterboxd.com/film/dune/", rating_page(2021, 3.9));

    let enricher = enricher(
        store.clone(),
        Arc::new(FakeMetadata::default()),
        lists(&[], &[]),
    )
    .with_rating_scraper(rating_machine(pages));

    let summary = runner(enricher)
        .run(SweepKind::Rating, None)
        .await
        .expect("run rating sweep");

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 1);

    let found = stored(&store, 1).await;
    assert!(found.scraped_rating.is_some());
    assert_eq!(
        found.rating_url,
        Some(CachedUrl::Found("https://letterboxd.com/film/dune/".to_string()))
    );

    let missing = stored(&store, 2).await;
    assert!(missing.scraped_rating.is_none());
    assert_eq!(missing.rating_url, Some(CachedUrl::NotFound));
}

#[tokio::test]
async fn test_unconfigured_sweeps_refuse_to_run() {
    let store = Arc::new(MemoryCatalogStore::with_records([record(1, "Dune", 2021)]));
    let runner = runner(enricher(
        store,
        Arc::new(FakeMetadata::default()),
        lists(&[], &[]),
    ));

    let err = runner
        .run(SweepKind::Rating, None)
        .await
        .expect_err("no rating scraper");
    assert!(matches!(
        err,
        PipelineError::NotConfigured {
            kind: SweepKind::Rating,
            ..
        }
    ));

    let err = runner
        .run(SweepKind::SecondaryRating, None)
        .await
        .expect_err("no rating source");
    assert!(matches!(err, PipelineError::NotConfigured { .. }));
}

#[tokio::test]
async fn test_runners_sharing_locks_refuse_overlap() {
    let store = Arc::new(MemoryCatalogStore::with_records([record(1, "Arrival", 2016)]));
    let metadata = Arc::new(FakeMetadata::with_delay(Duration::from_millis(20)));
    metadata.add(detail(1, "Arrival", 2016));
    let enricher = Arc::new(enricher(store, metadata, lists(&[], &[])));

    let running = RunningSweeps::default();
    let first = SweepRunner::new(Arc::clone(&enricher), SweepConfig::default())
        .with_running(Arc::clone(&running));
    let second = SweepRunner::new(Arc::clone(&enricher), SweepConfig::default())
        .with_running(Arc::clone(&running));

    let (a, b) = tokio::join!(
        first.run(SweepKind::Recommendations, None),
        second.run(SweepKind::Recommendations, None),
    );
    assert_eq!(a.expect("first sweep").succeeded, 1);
    assert!(matches!(
        b,
        Err(PipelineError::SweepAlreadyRunning(SweepKind::Recommendations))
    ));

    // released once the first run finished
    assert!(running.lock().expect("acquire sweep lock").is_empty());
    second
        .run(SweepKind::Recommendations, None)
        .await
        .expect("run after release");
}
