//! Single-item enrichment: external id in, catalog record out.
//!
//! Steps run in a fixed order. Resolution, ban-list and existence checks
//! terminate early without touching any source. Once the record is created,
//! every later step is best-effort: its failure is logged and the record
//! keeps whatever earlier steps produced.

use crate::error::{PipelineError, Result};
use crate::gate::SourceGate;
use chrono::Datelike;
use reelhouse_core::{
    CachedUrl, CatalogRecord, ExternalId, PipelineConfig, RecommendedItem, ScraperKind, Source,
    StreamingProvider,
};
use reelhouse_db::{
    CatalogStore, DatabaseError, Flag, RecordPatch, ReferenceKind, SecondaryRatingPatch,
};
use reelhouse_lists::ReferenceLists;
use reelhouse_scraper::{PageData, ScrapeMachine, ScrapeOutcome, ScrapeRequest};
use reelhouse_sources::{ItemDetail, MetadataSource, RatingSource, SecondaryRating, SourceError};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Why a fetched item was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Adult content flag set
    AdultContent,
    /// No usable title
    MissingTitle,
    /// No overview text
    MissingOverview,
    /// No poster reference
    MissingPoster,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdultContent => f.write_str("adult content"),
            Self::MissingTitle => f.write_str("missing title"),
            Self::MissingOverview => f.write_str("missing overview"),
            Self::MissingPoster => f.write_str("missing poster"),
        }
    }
}

/// Terminal state of one enrichment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// A new record was created
    Created,
    /// The id (or title) is not in the master index
    Unresolved,
    /// The id is ban-listed
    BanListed,
    /// A record already exists or is being created by a concurrent run
    AlreadyExists,
    /// Validation rejected the fetched item
    Rejected(Rejection),
}

impl EnrichOutcome {
    /// Whether a record for the id exists after this run.
    #[must_use]
    pub fn record_exists(&self) -> bool {
        matches!(self, Self::Created | Self::AlreadyExists)
    }
}

impl fmt::Display for EnrichOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Unresolved => f.write_str("unresolved"),
            Self::BanListed => f.write_str("ban-listed"),
            Self::AlreadyExists => f.write_str("already exists"),
            Self::Rejected(reason) => write!(f, "rejected ({reason})"),
        }
    }
}

/// Flags left behind by runs that found their id already claimed.
type ClaimTable = Mutex<HashMap<ExternalId, Vec<Flag>>>;

/// Marks an id as being processed. Colliding runs queue their flag for the
/// holder, which collects them on [`Claim::release`]. Dropping an unreleased
/// claim discards the queue.
struct Claim<'a> {
    claims: &'a ClaimTable,
    id: ExternalId,
    released: bool,
}

impl<'a> Claim<'a> {
    /// Claim `id`, or queue `flag` for the run that holds it.
    fn take_or_defer(claims: &'a ClaimTable, id: ExternalId, flag: Option<Flag>) -> Option<Self> {
        let mut held = claims.lock().expect("acquire claims lock");
        match held.entry(id) {
            Entry::Occupied(mut pending) => {
                pending.get_mut().extend(flag);
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(Vec::new());
                Some(Self {
                    claims,
                    id,
                    released: false,
                })
            }
        }
    }

    /// Give the id up and return the flags queued while it was held.
    fn release(mut self) -> Vec<Flag> {
        self.released = true;
        let mut held = self.claims.lock().expect("acquire claims lock");
        held.remove(&self.id).unwrap_or_default()
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Ok(mut held) = self.claims.lock() {
            held.remove(&self.id);
        }
    }
}

/// Turns external ids into catalog records.
pub struct Enricher {
    store: Arc<dyn CatalogStore>,
    metadata: Arc<dyn MetadataSource>,
    rating: Option<Arc<dyn RatingSource>>,
    rating_scraper: Option<Arc<ScrapeMachine>>,
    lists: ReferenceLists,
    gate: SourceGate,
    config: PipelineConfig,
    watch_region: String,
    current_year: i32,
    claims: ClaimTable,
}

impl Enricher {
    /// Create an enricher with only the metadata source wired in.
    pub fn new(
        store: Arc<dyn CatalogStore>,
        metadata: Arc<dyn MetadataSource>,
        lists: ReferenceLists,
        gate: SourceGate,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            metadata,
            rating: None,
            rating_scraper: None,
            lists,
            gate,
            config,
            watch_region: "US".to_string(),
            current_year: chrono::Utc::now().year(),
            claims: Mutex::new(HashMap::new()),
        }
    }

    /// Enable the secondary rating step.
    #[must_use]
    pub fn with_rating_source(mut self, rating: Arc<dyn RatingSource>) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Enable the rating scraper step.
    #[must_use]
    pub fn with_rating_scraper(mut self, machine: Arc<ScrapeMachine>) -> Self {
        self.rating_scraper = Some(machine);
        self
    }

    /// Region whose availability list is used.
    #[must_use]
    pub fn with_watch_region(mut self, region: impl Into<String>) -> Self {
        self.watch_region = region.into();
        self
    }

    /// Year the now-playing window ends at.
    #[must_use]
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    /// The catalog store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Reference lists in use.
    #[must_use]
    pub fn lists(&self) -> &ReferenceLists {
        &self.lists
    }

    /// The rating scraper, if configured.
    #[must_use]
    pub fn rating_scraper(&self) -> Option<&Arc<ScrapeMachine>> {
        self.rating_scraper.as_ref()
    }

    /// Whether a secondary rating source is configured.
    #[must_use]
    pub fn has_rating_source(&self) -> bool {
        self.rating.is_some()
    }

    /// Resolve a title through the master index and enrich it.
    pub async fn search_and_fetch_by_title(&self, title: &str) -> Result<EnrichOutcome> {
        let Some(id) = self.lists.master_index().resolve_title(title) else {
            info!(title, "title not in master index");
            return Ok(EnrichOutcome::Unresolved);
        };
        self.process(id, None).await
    }

    /// Enrich an id without asserting any flag.
    pub async fn search_and_fetch_by_id(&self, id: ExternalId) -> Result<EnrichOutcome> {
        self.process(id, None).await
    }

    /// Run the pipeline for one id.
    ///
    /// `flag` is the flag the caller's feed asserts for this id. It is
    /// written for existing records too; the now-playing flag only holds
    /// for releases inside the configured year window. A run that finds the
    /// id claimed by another run hands its flag to that run, which writes it
    /// once its own steps are done.
    pub async fn process(&self, id: ExternalId, flag: Option<Flag>) -> Result<EnrichOutcome> {
        if self.config.require_indexed && !self.lists.master_index().contains(id) {
            info!(external_id = %id, "not in master index, skipping");
            return Ok(EnrichOutcome::Unresolved);
        }

        if self.lists.is_banned(id) {
            debug!(external_id = %id, "ban-listed, skipping");
            return Ok(EnrichOutcome::BanListed);
        }

        let Some(claim) = Claim::take_or_defer(&self.claims, id, flag) else {
            debug!(external_id = %id, ?flag, "already being processed, flag handed to holder");
            return Ok(EnrichOutcome::AlreadyExists);
        };

        let result = self.run_claimed(id, flag).await;
        let deferred = claim.release();
        if !deferred.is_empty() {
            self.apply_deferred_flags(id, &deferred).await;
        }
        result
    }

    async fn run_claimed(&self, id: ExternalId, flag: Option<Flag>) -> Result<EnrichOutcome> {
        if let Some(existing) = self.store.get_by_external_id(id).await? {
            if let Some(flag) = flag {
                let value = self.flag_value(flag, existing.release_year);
                self.store.apply(id, RecordPatch::Flag { flag, value }).await?;
                debug!(external_id = %id, %flag, value, "flag updated on existing record");
            }
            debug!(external_id = %id, "already in catalog");
            return Ok(EnrichOutcome::AlreadyExists);
        }

        let detail = self.fetch_detail(id).await?;

        let title = match validate(&detail) {
            Ok(title) => title.to_string(),
            Err(rejection) => {
                info!(external_id = %id, %rejection, "rejected");
                return Ok(EnrichOutcome::Rejected(rejection));
            }
        };

        let record = self.build_record(id, title, &detail, flag);
        let record = match self.store.create(record).await {
            Ok(record) => record,
            Err(DatabaseError::Conflict { .. }) => {
                debug!(external_id = %id, "created concurrently elsewhere");
                return Ok(EnrichOutcome::AlreadyExists);
            }
            Err(e) => return Err(e.into()),
        };
        info!(external_id = %id, title = %record.title, "record created");

        let recommendations = self.recommendations(&detail);
        if !recommendations.is_empty() {
            self.write(id, RecordPatch::Recommendations(recommendations))
                .await;
        }

        if let Some(xref) = record.cross_reference_id.as_deref() {
            match self.lookup_secondary(xref).await {
                Ok(Some(patch)) => self.write(id, RecordPatch::SecondaryRating(patch)).await,
                Ok(None) => {}
                Err(e) => warn!(external_id = %id, error = %e, "secondary rating lookup failed"),
            }
        }

        for genre in &record.genres {
            if let Err(e) = self
                .store
                .get_or_create_reference(ReferenceKind::Genre, genre)
                .await
            {
                warn!(external_id = %id, genre = %genre, error = %e, "failed to associate genre");
            }
        }

        let providers = self.providers(&detail);
        for provider in &providers {
            if let Err(e) = self
                .store
                .get_or_create_reference(ReferenceKind::Provider, &provider.name)
                .await
            {
                warn!(external_id = %id, provider = %provider.name, error = %e, "failed to associate provider");
            }
        }
        if !providers.is_empty() {
            self.write(id, RecordPatch::Providers(providers)).await;
        }

        if let Some(machine) = &self.rating_scraper {
            match self.scrape(machine, &record).await {
                Ok(outcome) => {
                    if let Some(url) = outcome.cache_update {
                        let kind = ScraperKind::Rating;
                        self.write(id, RecordPatch::CachedUrl { kind, url }).await;
                    }
                    if let Some(PageData::Rating(rating)) = outcome.data {
                        self.write(id, RecordPatch::ScrapedRating(Some(rating)))
                            .await;
                    }
                }
                Err(e) => warn!(external_id = %id, error = %e, "rating scrape failed"),
            }
        }

        Ok(EnrichOutcome::Created)
    }

    /// Write flags queued by runs that collided with this one.
    async fn apply_deferred_flags(&self, id: ExternalId, flags: &[Flag]) {
        let existing = match self.store.get_by_external_id(id).await {
            Ok(Some(existing)) => existing,
            Ok(None) => {
                debug!(external_id = %id, "no record, deferred flags dropped");
                return;
            }
            Err(e) => {
                warn!(external_id = %id, error = %e, "failed to load record for deferred flags");
                return;
            }
        };

        for &flag in flags {
            let value = self.flag_value(flag, existing.release_year);
            self.write(id, RecordPatch::Flag { flag, value }).await;
            debug!(external_id = %id, %flag, value, "deferred flag written");
        }
    }

    /// Apply one best-effort patch; failures are logged.
    async fn write(&self, id: ExternalId, patch: RecordPatch) {
        let group = patch.field_group();
        if let Err(e) = self.store.apply(id, patch).await {
            warn!(external_id = %id, group, error = %e, "failed to write field group");
        }
    }

    /// Value to store for a flag the caller asserts.
    #[must_use]
    pub fn flag_value(&self, flag: Flag, release_year: Option<i32>) -> bool {
        match flag {
            Flag::NowPlaying => self.in_now_playing_window(release_year),
            Flag::Popular => true,
        }
    }

    /// Whether a release year falls in the accepted now-playing window.
    #[must_use]
    pub fn in_now_playing_window(&self, release_year: Option<i32>) -> bool {
        let width = i32::try_from(self.config.now_playing_window_years).unwrap_or(i32::MAX);
        release_year.is_some_and(|year| {
            year <= self.current_year && year > self.current_year.saturating_sub(width)
        })
    }

    /// Full detail from the metadata source.
    pub(crate) async fn fetch_detail(&self, id: ExternalId) -> Result<ItemDetail> {
        let detail = self
            .gate
            .call(Source::Metadata, || self.metadata.detail(id))
            .await?;
        Ok(detail)
    }

    /// Secondary ratings for a cross-reference id. `None` when no rating
    /// source is configured or it has no entry.
    pub(crate) async fn lookup_secondary(&self, xref: &str) -> Result<Option<SecondaryRatingPatch>> {
        let Some(rating) = &self.rating else {
            return Ok(None);
        };

        match self.gate.call(Source::Rating, || rating.lookup(xref)).await {
            Ok(found) => Ok(Some(secondary_patch(found))),
            Err(SourceError::NotFound { .. }) => {
                debug!(xref, "no secondary rating");
                Ok(None)
            }
            Err(e) => Err(PipelineError::Source(e)),
        }
    }

    /// Related items above the popularity threshold, capped.
    pub(crate) fn recommendations(&self, detail: &ItemDetail) -> Vec<RecommendedItem> {
        detail
            .recommendations
            .results
            .iter()
            .filter(|item| {
                item.popularity
                    .is_some_and(|p| p > self.config.min_recommendation_popularity)
            })
            .filter_map(|item| {
                let external_id = ExternalId::new(item.id).ok()?;
                if self.lists.is_banned(external_id) || item.adult {
                    return None;
                }
                let title = item.title.as_deref()?.trim();
                (!title.is_empty()).then(|| RecommendedItem {
                    external_id,
                    title: title.to_string(),
                    popularity: item.popularity.unwrap_or_default(),
                })
            })
            .take(self.config.max_recommendations)
            .collect()
    }

    /// Allow-listed providers from the primary availability list.
    pub(crate) fn providers(&self, detail: &ItemDetail) -> Vec<StreamingProvider> {
        self.lists
            .providers()
            .filter(detail.provider_names(&self.watch_region))
    }

    /// Run a scraper for a record, writing any cache update to the URL
    /// cache file.
    ///
    /// A URL known only to the cache file is reported back as a cache
    /// update so the caller can store it on the record.
    pub(crate) async fn scrape(
        &self,
        machine: &ScrapeMachine,
        record: &CatalogRecord,
    ) -> Result<ScrapeOutcome> {
        let kind = machine.site().kind;
        let cache = self.lists.url_cache(kind);
        let on_record = record.cached_url(kind).cloned();
        let from_file = on_record.is_none();
        let cached: Option<CachedUrl> = on_record.or_else(|| cache.get(record.external_id));

        let request = ScrapeRequest {
            external_id: record.external_id,
            title: &record.title,
            release_year: record.release_year,
            cached: cached.as_ref(),
        };
        let mut outcome = machine.run(&request, self.lists.providers()).await?;

        if let Some(url) = outcome.cache_update.clone() {
            if let Err(e) = cache.record(record.external_id, &record.title, url) {
                warn!(external_id = %record.external_id, %kind, error = %e, "failed to write URL cache");
            }
        } else if from_file {
            outcome.cache_update = cached;
        }

        Ok(outcome)
    }

    fn build_record(
        &self,
        id: ExternalId,
        title: String,
        detail: &ItemDetail,
        flag: Option<Flag>,
    ) -> CatalogRecord {
        let mut record = CatalogRecord::new(id, title);
        record.overview = detail.overview.clone();
        record.poster_path = detail.poster_path.clone();
        record.release_year = detail.release_year();
        record.runtime = detail.runtime;
        record.tagline = detail.tagline.clone().filter(|t| !t.trim().is_empty());
        record.trailer_key = detail.trailer_key().map(str::to_string);
        record.primary_rating = detail.vote_average.map(|v| format!("{v:.1}/10"));
        record.primary_rating_value = detail.vote_average;
        record.popularity = detail.popularity;
        record.cross_reference_id = detail.imdb_id.clone().filter(|x| !x.trim().is_empty());
        record.director = detail.directors();
        record.cast = detail.leading_cast(self.config.cast_limit);
        record.genres = detail
            .genres
            .iter()
            .map(|g| g.name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect::<BTreeSet<_>>();

        match flag {
            Some(Flag::NowPlaying) => {
                record.now_playing = self.flag_value(Flag::NowPlaying, record.release_year);
            }
            Some(Flag::Popular) => record.is_popular = true,
            None => {}
        }

        record
    }
}

/// Title to store, or why the item is rejected.
fn validate(detail: &ItemDetail) -> std::result::Result<&str, Rejection> {
    if detail.adult {
        return Err(Rejection::AdultContent);
    }
    let title = detail.display_title().ok_or(Rejection::MissingTitle)?;
    if detail.overview.as_deref().map_or(true, |o| o.trim().is_empty()) {
        return Err(Rejection::MissingOverview);
    }
    if detail.poster_path.as_deref().map_or(true, |p| p.trim().is_empty()) {
        return Err(Rejection::MissingPoster);
    }
    Ok(title.trim())
}

fn secondary_patch(rating: SecondaryRating) -> SecondaryRatingPatch {
    SecondaryRatingPatch {
        ratings: rating.ratings,
        director: rating.director,
        cast: rating.cast,
        certification: rating.certification,
        box_office: rating.box_office,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelhouse_sources::metadata::NamedEntry;

    fn detail() -> ItemDetail {
        ItemDetail {
            id: 42,
            title: Some("Dune".to_string()),
            overview: Some("Spice.".to_string()),
            poster_path: Some("/dune.jpg".to_string()),
            release_date: Some("2021-09-15".to_string()),
            genres: vec![NamedEntry {
                name: "Sci-Fi".to_string(),
            }],
            ..ItemDetail::default()
        }
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate(&detail()), Ok("Dune"));

        let mut adult = detail();
        adult.adult = true;
        assert_eq!(validate(&adult), Err(Rejection::AdultContent));

        let mut no_overview = detail();
        no_overview.overview = Some("   ".to_string());
        assert_eq!(validate(&no_overview), Err(Rejection::MissingOverview));

        let mut no_poster = detail();
        no_poster.poster_path = None;
        assert_eq!(validate(&no_poster), Err(Rejection::MissingPoster));

        let mut no_title = detail();
        no_title.title = None;
        assert_eq!(validate(&no_title), Err(Rejection::MissingTitle));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            EnrichOutcome::Rejected(Rejection::MissingPoster).to_string(),
            "rejected (missing poster)"
        );
        assert!(EnrichOutcome::AlreadyExists.record_exists());
        assert!(!EnrichOutcome::BanListed.record_exists());
    }

    fn id() -> ExternalId {
        ExternalId::new(42).expect("valid id")
    }

    #[test]
    fn test_claim_is_exclusive_until_released() {
        let claims = Mutex::new(HashMap::new());

        let first = Claim::take_or_defer(&claims, id(), None).expect("first claim");
        assert!(Claim::take_or_defer(&claims, id(), None).is_none());
        assert!(claims.lock().expect("acquire claims lock").contains_key(&id()));

        assert!(first.release().is_empty());
        assert!(Claim::take_or_defer(&claims, id(), None).is_some());
    }

    #[test]
    fn test_colliding_run_queues_flag_for_holder() {
        let claims = Mutex::new(HashMap::new());

        let holder = Claim::take_or_defer(&claims, id(), None).expect("first claim");
        assert!(Claim::take_or_defer(&claims, id(), Some(Flag::NowPlaying)).is_none());
        assert!(Claim::take_or_defer(&claims, id(), None).is_none());
        assert!(Claim::take_or_defer(&claims, id(), Some(Flag::Popular)).is_none());

        assert_eq!(holder.release(), vec![Flag::NowPlaying, Flag::Popular]);
        assert!(claims.lock().expect("acquire claims lock").is_empty());
    }

    #[test]
    fn test_dropped_claim_frees_id() {
        let claims = Mutex::new(HashMap::new());

        let holder = Claim::take_or_defer(&claims, id(), None).expect("first claim");
        assert!(Claim::take_or_defer(&claims, id(), Some(Flag::Popular)).is_none());
        drop(holder);

        assert!(claims.lock().expect("acquire claims lock").is_empty());
        let next = Claim::take_or_defer(&claims, id(), None).expect("claim after drop");
        assert!(next.release().is_empty());
    }
}
