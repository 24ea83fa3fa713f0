//! SQLite catalog store.
//!
//! Multi-valued field groups are stored as JSON text columns. Each
//! [`RecordPatch`] becomes a single `UPDATE` over that group's columns, so
//! concurrent patches on different groups cannot clobber each other.

use crate::error::{DatabaseError, Result};
use crate::migrations;
use crate::patch::{Flag, RecordPatch};
use crate::store::{CatalogStore, ReferenceEntity, ReferenceKind};
use async_trait::async_trait;
use reelhouse_core::{CachedUrl, CatalogRecord, ExternalId, ScraperKind, StreamingProvider, Timestamp};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;

const RECORD_COLUMNS: &str = "external_id, title, overview, poster_path, release_year, runtime, \
    tagline, trailer_key, primary_rating, primary_rating_value, popularity, cross_reference_id, \
    secondary_ratings, director, cast_names, certification, box_office, genres, providers, \
    top_provider, recommendations, scraped_rating, rating_url, availability_url, now_playing, \
    is_popular, updated_at";

/// Catalog store backed by a `SQLx` SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteCatalogStore {
    pool: Pool<Sqlite>,
}

impl SqliteCatalogStore {
    /// Open (or create) a database file and run migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_str().ok_or_else(|| {
            DatabaseError::Open("invalid database path: not valid UTF-8".to_string())
        })?;

        let options = SqliteConnectOptions::from_str(path_str)
            .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Open(format!("failed to open {path_str}: {e}")))?;

        tracing::info!("Catalog database opened at {}", path_str);
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open a private in-memory database and run migrations.
    pub async fn in_memory() -> Result<Self> {
        // Every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DatabaseError::Open(format!("failed to open in-memory database: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Apply pending migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Underlying pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the pool.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Catalog database closed");
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::Decode(format!("invalid JSON in column {column}: {e}")))
}

fn record_from_row(row: &SqliteRow) -> Result<CatalogRecord> {
    let raw_id: i64 = row.try_get("external_id")?;
    let external_id = ExternalId::new(raw_id)
        .map_err(|e| DatabaseError::Decode(format!("invalid external_id {raw_id}: {e}")))?;

    let release_year: Option<i64> = row.try_get("release_year")?;
    let runtime: Option<i64> = row.try_get("runtime")?;
    let scraped_rating: Option<String> = row.try_get("scraped_rating")?;
    let rating_url: Option<String> = row.try_get("rating_url")?;
    let availability_url: Option<String> = row.try_get("availability_url")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(CatalogRecord {
        external_id,
        title: row.try_get("title")?,
        overview: row.try_get("overview")?,
        poster_path: row.try_get("poster_path")?,
        release_year: release_year.and_then(|y| i32::try_from(y).ok()),
        runtime: runtime.and_then(|r| u32::try_from(r).ok()),
        tagline: row.try_get("tagline")?,
        trailer_key: row.try_get("trailer_key")?,
        primary_rating: row.try_get("primary_rating")?,
        primary_rating_value: row.try_get("primary_rating_value")?,
        popularity: row.try_get("popularity")?,
        cross_reference_id: row.try_get("cross_reference_id")?,
        secondary_ratings: from_json("secondary_ratings", row.try_get("secondary_ratings")?)?,
        director: row.try_get("director")?,
        cast: row.try_get("cast_names")?,
        certification: row.try_get("certification")?,
        box_office: row.try_get("box_office")?,
        genres: from_json("genres", row.try_get("genres")?)?,
        providers: from_json("providers", row.try_get("providers")?)?,
        top_provider: row.try_get("top_provider")?,
        recommendations: from_json("recommendations", row.try_get("recommendations")?)?,
        scraped_rating: scraped_rating
            .as_deref()
            .map(|raw| from_json("scraped_rating", raw))
            .transpose()?,
        rating_url: rating_url.map(CachedUrl::from),
        availability_url: availability_url.map(CachedUrl::from),
        now_playing: row.try_get("now_playing")?,
        is_popular: row.try_get("is_popular")?,
        updated_at: Timestamp::from_rfc3339(&updated_at)
            .map_err(|e| DatabaseError::Decode(e.to_string()))?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn get_by_external_id(&self, id: ExternalId) -> Result<Option<CatalogRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM catalog_records WHERE external_id = ?");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn create(&self, record: CatalogRecord) -> Result<CatalogRecord> {
        let sql = format!(
            "INSERT INTO catalog_records ({RECORD_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        let result = sqlx::query(&sql)
            .bind(record.external_id.get())
            .bind(&record.title)
            .bind(&record.overview)
            .bind(&record.poster_path)
            .bind(record.release_year)
            .bind(record.runtime.map(i64::from))
            .bind(&record.tagline)
            .bind(&record.trailer_key)
            .bind(&record.primary_rating)
            .bind(record.primary_rating_value)
            .bind(record.popularity)
            .bind(&record.cross_reference_id)
            .bind(to_json(&record.secondary_ratings)?)
            .bind(&record.director)
            .bind(&record.cast)
            .bind(&record.certification)
            .bind(&record.box_office)
            .bind(to_json(&record.genres)?)
            .bind(to_json(&record.providers)?)
            .bind(&record.top_provider)
            .bind(to_json(&record.recommendations)?)
            .bind(record.scraped_rating.as_ref().map(to_json).transpose()?)
            .bind(record.rating_url.clone().map(String::from))
            .bind(record.availability_url.clone().map(String::from))
            .bind(record.now_playing)
            .bind(record.is_popular)
            .bind(record.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(record),
            Err(e) if is_unique_violation(&e) => Err(DatabaseError::Conflict {
                external_id: record.external_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, record: &CatalogRecord) -> Result<()> {
        let result = sqlx::query(
            "UPDATE catalog_records SET
                title = ?, overview = ?, poster_path = ?, release_year = ?, runtime = ?,
                tagline = ?, trailer_key = ?, primary_rating = ?, primary_rating_value = ?,
                popularity = ?, cross_reference_id = ?, secondary_ratings = ?, director = ?,
                cast_names = ?, certification = ?, box_office = ?, genres = ?, providers = ?,
                top_provider = ?, recommendations = ?, scraped_rating = ?, rating_url = ?,
                availability_url = ?, now_playing = ?, is_popular = ?, updated_at = ?
             WHERE external_id = ?",
        )
        .bind(&record.title)
        .bind(&record.overview)
        .bind(&record.poster_path)
        .bind(record.release_year)
        .bind(record.runtime.map(i64::from))
        .bind(&record.tagline)
        .bind(&record.trailer_key)
        .bind(&record.primary_rating)
        .bind(record.primary_rating_value)
        .bind(record.popularity)
        .bind(&record.cross_reference_id)
        .bind(to_json(&record.secondary_ratings)?)
        .bind(&record.director)
        .bind(&record.cast)
        .bind(&record.certification)
        .bind(&record.box_office)
        .bind(to_json(&record.genres)?)
        .bind(to_json(&record.providers)?)
        .bind(&record.top_provider)
        .bind(to_json(&record.recommendations)?)
        .bind(record.scraped_rating.as_ref().map(to_json).transpose()?)
        .bind(record.rating_url.clone().map(String::from))
        .bind(record.availability_url.clone().map(String::from))
        .bind(record.now_playing)
        .bind(record.is_popular)
        .bind(Timestamp::now().to_rfc3339())
        .bind(record.external_id.get())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                external_id: record.external_id,
            });
        }
        Ok(())
    }

    async fn apply(&self, id: ExternalId, patch: RecordPatch) -> Result<()> {
        let now = Timestamp::now().to_rfc3339();
        let group = patch.field_group();

        let result = match patch {
            RecordPatch::Flag { flag, value } => {
                let sql = format!(
                    "UPDATE catalog_records SET {} = ?, updated_at = ? WHERE external_id = ?",
                    flag.column()
                );
                sqlx::query(&sql)
                    .bind(value)
                    .bind(&now)
                    .bind(id.get())
                    .execute(&self.pool)
                    .await?
            }
            RecordPatch::Providers(providers) => {
                let providers = StreamingProvider::ranked(providers);
                let top = providers.first().map(|p| p.name.clone());
                sqlx::query(
                    "UPDATE catalog_records SET providers = ?, top_provider = ?, updated_at = ?
                     WHERE external_id = ?",
                )
                .bind(to_json(&providers)?)
                .bind(top)
                .bind(&now)
                .bind(id.get())
                .execute(&self.pool)
                .await?
            }
            RecordPatch::Recommendations(items) => {
                sqlx::query(
                    "UPDATE catalog_records SET recommendations = ?, updated_at = ?
                     WHERE external_id = ?",
                )
                .bind(to_json(&items)?)
                .bind(&now)
                .bind(id.get())
                .execute(&self.pool)
                .await?
            }
            RecordPatch::ScrapedRating(rating) => {
                sqlx::query(
                    "UPDATE catalog_records SET scraped_rating = ?, updated_at = ?
                     WHERE external_id = ?",
                )
                .bind(rating.as_ref().map(to_json).transpose()?)
                .bind(&now)
                .bind(id.get())
                .execute(&self.pool)
                .await?
            }
            RecordPatch::SecondaryRating(patch) => {
                sqlx::query(
                    "UPDATE catalog_records SET
                        secondary_ratings = ?,
                        director = COALESCE(?, director),
                        cast_names = COALESCE(?, cast_names),
                        certification = COALESCE(?, certification),
                        box_office = COALESCE(?, box_office),
                        updated_at = ?
                     WHERE external_id = ?",
                )
                .bind(to_json(&patch.ratings)?)
                .bind(patch.director)
                .bind(patch.cast)
                .bind(patch.certification)
                .bind(patch.box_office)
                .bind(&now)
                .bind(id.get())
                .execute(&self.pool)
                .await?
            }
            RecordPatch::CachedUrl { kind, url } => {
                let column = match kind {
                    ScraperKind::Rating => "rating_url",
                    ScraperKind::Availability => "availability_url",
                };
                let sql = format!(
                    "UPDATE catalog_records SET {column} = ?, updated_at = ? WHERE external_id = ?"
                );
                sqlx::query(&sql)
                    .bind(String::from(url))
                    .bind(&now)
                    .bind(id.get())
                    .execute(&self.pool)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound { external_id: id });
        }

        tracing::trace!(external_id = %id, group, "applied patch");
        Ok(())
    }

    async fn list_page(&self, offset: usize, limit: usize) -> Result<Vec<CatalogRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM catalog_records ORDER BY external_id LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn get_or_create_reference(
        &self,
        kind: ReferenceKind,
        key: &str,
    ) -> Result<ReferenceEntity> {
        sqlx::query(
            "INSERT INTO reference_entities (kind, natural_key, created_at) VALUES (?, ?, ?)
             ON CONFLICT (kind, natural_key) DO NOTHING",
        )
        .bind(kind.as_str())
        .bind(key)
        .bind(Timestamp::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let id: i64 = sqlx::query_scalar(
            "SELECT id FROM reference_entities WHERE kind = ? AND natural_key = ?",
        )
        .bind(kind.as_str())
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        Ok(ReferenceEntity {
            id,
            kind,
            key: key.to_string(),
        })
    }

    async fn reset_flag(&self, flag: Flag) -> Result<u64> {
        let sql = format!(
            "UPDATE catalog_records SET {column} = 0, updated_at = ? WHERE {column} = 1",
            column = flag.column()
        );
        let result = sqlx::query(&sql)
            .bind(Timestamp::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
