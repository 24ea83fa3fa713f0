//! Fakes shared by the pipeline integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use reelhouse_core::{
    BackoffConfig, ExternalId, PipelineConfig, ScraperKind, SiteConfig, Source,
};
use reelhouse_db::{CatalogStore, MemoryCatalogStore};
use reelhouse_lists::{BanList, IndexEntry, MasterIndex, ProviderAllowList, ReferenceLists};
use reelhouse_pipeline::{Enricher, SourceGate};
use reelhouse_scraper::{ScrapeMachine, SiteDefinition};
use reelhouse_sources::metadata::{
    NamedEntry, ProviderEntry, RegionAvailability, ResultList, WatchProviders,
};
use reelhouse_sources::{
    FeedItem, FeedKind, FeedPage, ItemDetail, MetadataSource, Page, PageFetcher, RateLimiter,
    RatingSource, SecondaryRating, SourceError,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CURRENT_YEAR: i32 = 2024;

pub fn id(raw: i64) -> ExternalId {
    ExternalId::new(raw).expect("valid id")
}

/// A detail that passes validation.
pub fn detail(raw: i64, title: &str, year: i32) -> ItemDetail {
    ItemDetail {
        id: raw,
        title: Some(title.to_string()),
        overview: Some(format!("{title} overview")),
        poster_path: Some(format!("/{raw}.jpg")),
        release_date: Some(format!("{year}-06-01")),
        vote_average: Some(7.4),
        imdb_id: Some(format!("tt{raw:07}")),
        genres: vec![NamedEntry {
            name: "Sci-Fi".to_string(),
        }],
        ..ItemDetail::default()
    }
}

pub fn with_providers(mut detail: ItemDetail, names: &[&str]) -> ItemDetail {
    let entries = names
        .iter()
        .map(|name| ProviderEntry {
            provider_name: (*name).to_string(),
            display_priority: None,
        })
        .collect();
    detail.watch_providers = WatchProviders {
        results: HashMap::from([(
            "US".to_string(),
            RegionAvailability {
                free: entries,
                ..RegionAvailability::default()
            },
        )]),
    };
    detail
}

pub fn with_recommendations(mut detail: ItemDetail, items: &[(i64, &str, f64)]) -> ItemDetail {
    detail.recommendations = ResultList {
        results: items
            .iter()
            .map(|(raw, title, popularity)| FeedItem {
                id: *raw,
                title: Some((*title).to_string()),
                popularity: Some(*popularity),
                ..FeedItem::default()
            })
            .collect(),
    };
    detail
}

/// Metadata source backed by maps.
#[derive(Default)]
pub struct FakeMetadata {
    details: Mutex<HashMap<i64, ItemDetail>>,
    failing: Mutex<HashSet<i64>>,
    pages: Mutex<HashMap<(FeedKind, u32), Vec<i64>>>,
    total_pages: Mutex<HashMap<FeedKind, u32>>,
    delay: Option<Duration>,
    detail_calls: AtomicUsize,
}

impl FakeMetadata {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn add(&self, detail: ItemDetail) {
        self.details
            .lock()
            .expect("acquire details lock")
            .insert(detail.id, detail);
    }

    pub fn fail(&self, raw: i64) {
        self.failing.lock().expect("acquire failing lock").insert(raw);
    }

    pub fn page(&self, feed: FeedKind, page: u32, ids: &[i64]) {
        self.pages
            .lock()
            .expect("acquire pages lock")
            .insert((feed, page), ids.to_vec());
    }

    pub fn total_pages(&self, feed: FeedKind, total: u32) {
        self.total_pages
            .lock()
            .expect("acquire total pages lock")
            .insert(feed, total);
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for FakeMetadata {
    async fn detail(&self, id: ExternalId) -> reelhouse_sources::Result<ItemDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self
            .failing
            .lock()
            .expect("acquire failing lock")
            .contains(&id.get())
        {
            return Err(SourceError::Upstream {
                origin: Source::Metadata,
                status: 500,
                message: "internal error".to_string(),
            });
        }
        self.details
            .lock()
            .expect("acquire details lock")
            .get(&id.get())
            .cloned()
            .ok_or(SourceError::NotFound {
                origin: Source::Metadata,
                key: id.to_string(),
            })
    }

    async fn feed_page(&self, feed: FeedKind, page: u32) -> reelhouse_sources::Result<FeedPage> {
        let ids = self
            .pages
            .lock()
            .expect("acquire pages lock")
            .get(&(feed, page))
            .cloned()
            .ok_or(SourceError::Upstream {
                origin: Source::Metadata,
                status: 503,
                message: "unavailable".to_string(),
            })?;
        let total_pages = self
            .total_pages
            .lock()
            .expect("acquire total pages lock")
            .get(&feed)
            .copied()
            .unwrap_or(0);

        Ok(FeedPage {
            page,
            total_pages,
            results: ids
                .into_iter()
                .map(|raw| FeedItem {
                    id: raw,
                    ..FeedItem::default()
                })
                .collect(),
        })
    }
}

/// Rating source that answers every lookup the same way.
pub struct FakeRating {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeRating {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RatingSource for FakeRating {
    async fn lookup(&self, cross_reference_id: &str) -> reelhouse_sources::Result<SecondaryRating> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SourceError::Upstream {
                origin: Source::Rating,
                status: 401,
                message: "invalid key".to_string(),
            });
        }
        Ok(SecondaryRating {
            ratings: BTreeMap::from([(
                "Internet Movie Database".to_string(),
                format!("8.0/10 ({cross_reference_id})"),
            )]),
            director: Some("Denis Villeneuve".to_string()),
            certification: Some("PG-13".to_string()),
            ..SecondaryRating::default()
        })
    }
}

/// Page fetcher serving fixed pages; everything else is a 404.
#[derive(Default)]
pub struct FakePages {
    pages: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl FakePages {
    pub fn add(&self, url: &str, body: String) {
        self.pages
            .lock()
            .expect("acquire pages lock")
            .insert(url.to_string(), body);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FakePages {
    async fn fetch(&self, url: &str) -> reelhouse_sources::Result<Page> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self.pages.lock().expect("acquire pages lock").get(url).cloned();
        Ok(match body {
            Some(body) => Page { status: 200, body },
            None => Page {
                status: 404,
                body: String::new(),
            },
        })
    }
}

pub fn rating_page(year: i32, average: f64) -> String {
    format!(
        r#"<html><body>
             <small class="number"><a>{year}</a></small>
             <a class="display-rating" title="Weighted average of {average} based on 99 ratings">x</a>
             <li class="rating-histogram-bar"><a title="99 ratings (100%)"></a></li>
           </body></html>"#
    )
}

pub fn rating_machine(pages: Arc<FakePages>) -> Arc<ScrapeMachine> {
    let site = SiteDefinition::compile(ScraperKind::Rating, &SiteConfig::rating_default())
        .expect("compile rating site");
    Arc::new(ScrapeMachine::new(
        Arc::new(site),
        pages,
        RateLimiter::unlimited(),
        BackoffConfig::default(),
    ))
}

pub fn availability_page(year: i32, offers: &[&str]) -> String {
    let offers: String = offers
        .iter()
        .map(|name| format!(r#"<a class="offer"><img alt="{name}"></a>"#))
        .collect();
    format!(
        r#"<html><body>
             <div class="title-block"><h1>Title</h1><span class="text-muted">({year})</span></div>
             <div class="buybox-row stream">{offers}</div>
           </body></html>"#
    )
}

pub fn availability_machine(pages: Arc<FakePages>) -> Arc<ScrapeMachine> {
    let site =
        SiteDefinition::compile(ScraperKind::Availability, &SiteConfig::availability_default())
            .expect("compile availability site");
    Arc::new(ScrapeMachine::new(
        Arc::new(site),
        pages,
        RateLimiter::unlimited(),
        BackoffConfig::default(),
    ))
}

pub fn lists(indexed: &[(i64, &str)], banned: &[i64]) -> ReferenceLists {
    let master = MasterIndex::from_entries(indexed.iter().map(|(raw, title)| IndexEntry {
        id: *raw,
        title: (*title).to_string(),
    }));
    let ban_list: BanList = banned.iter().map(|raw| id(*raw)).collect();
    let providers = ProviderAllowList::new(
        ["Tubi TV", "Pluto TV", "Freevee"],
        PipelineConfig::default().provider_aliases,
    );
    ReferenceLists::new(ban_list, providers, master)
}

pub fn enricher(
    store: Arc<MemoryCatalogStore>,
    metadata: Arc<FakeMetadata>,
    lists: ReferenceLists,
) -> Enricher {
    let store: Arc<dyn CatalogStore> = store;
    Enricher::new(
        store,
        metadata,
        lists,
        SourceGate::unlimited(),
        PipelineConfig::default(),
    )
    .with_current_year(CURRENT_YEAR)
}
