use std::sync::Arc;

use chrono::{DateTime, Utc};
use kompas_core::{normalize, Domain, ListingRecord};
use parking_lot::RwLock;
use sqlx::{Row, SqlitePool};
use thiserror::Error;

/// Failure of the listing store, kept distinct from an empty result set:
/// callers phrase "no data for this city" and "the store was unreachable"
/// differently.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("listing store connection failed for {url}")]
    Connect {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("listing store query failed")]
    Query(#[source] sqlx::Error),
    #[error("malformed listing row {id}")]
    Decode {
        id: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// The `query_active_listings` contract consumed by the context
/// assembler. Implementations return only active rows; city filtering is
/// case- and diacritic-insensitive (normalized equality), never raw
/// string equality.
pub trait ListingRepository: Send + Sync {
    async fn query_active_listings(
        &self,
        jurisdiction: &str,
        domain: Domain,
        city: Option<&str>,
    ) -> Result<Vec<ListingRecord>, StoreError>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    listings: Arc<RwLock<Vec<ListingRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_listing(&self, record: ListingRecord) {
        let mut listings = self.listings.write();
        listings.retain(|existing| existing.id != record.id);
        listings.push(record);
    }
}

impl ListingRepository for MemoryStore {
    async fn query_active_listings(
        &self,
        jurisdiction: &str,
        domain: Domain,
        city: Option<&str>,
    ) -> Result<Vec<ListingRecord>, StoreError> {
        let wanted_city = city.map(normalize);

        let records = self
            .listings
            .read()
            .iter()
            .filter(|record| record.is_active)
            .filter(|record| record.jurisdiction_code == jurisdiction)
            .filter(|record| record.domain == domain)
            .filter(|record| match &wanted_city {
                Some(wanted) => &normalize(&record.city) == wanted,
                None => true,
            })
            .cloned()
            .collect();

        Ok(records)
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|source| StoreError::Connect {
                url: database_url.to_string(),
                source,
            })?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listings (
              id TEXT PRIMARY KEY,
              domain TEXT NOT NULL,
              display_name TEXT NOT NULL,
              city TEXT NOT NULL,
              city_folded TEXT NOT NULL,
              jurisdiction_code TEXT NOT NULL,
              country_code TEXT NOT NULL,
              website_url TEXT NOT NULL,
              is_active INTEGER NOT NULL,
              content TEXT,
              updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS listings_scope
            ON listings (jurisdiction_code, domain, is_active, city_folded);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        Ok(())
    }

    /// Seeding/sync surface used by the ingestion side and the CLI; the
    /// retrieval path itself never writes.
    pub async fn upsert_listing(&self, record: &ListingRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO listings
              (id, domain, display_name, city, city_folded, jurisdiction_code,
               country_code, website_url, is_active, content, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
              domain=excluded.domain,
              display_name=excluded.display_name,
              city=excluded.city,
              city_folded=excluded.city_folded,
              jurisdiction_code=excluded.jurisdiction_code,
              country_code=excluded.country_code,
              website_url=excluded.website_url,
              is_active=excluded.is_active,
              content=excluded.content,
              updated_at=excluded.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(record.domain.as_str())
        .bind(&record.display_name)
        .bind(&record.city)
        .bind(normalize(&record.city))
        .bind(&record.jurisdiction_code)
        .bind(&record.country_code)
        .bind(&record.website_url)
        .bind(record.is_active)
        .bind(&record.content)
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        Ok(())
    }
}

impl ListingRepository for SqliteStore {
    async fn query_active_listings(
        &self,
        jurisdiction: &str,
        domain: Domain,
        city: Option<&str>,
    ) -> Result<Vec<ListingRecord>, StoreError> {
        let rows = match city {
            Some(city) => {
                sqlx::query(
                    r#"
                    SELECT id, display_name, city, jurisdiction_code,
                           country_code, website_url, is_active, content, updated_at
                    FROM listings
                    WHERE is_active = 1
                      AND jurisdiction_code = ?1
                      AND domain = ?2
                      AND city_folded = ?3
                    "#,
                )
                .bind(jurisdiction)
                .bind(domain.as_str())
                .bind(normalize(city))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, display_name, city, jurisdiction_code,
                           country_code, website_url, is_active, content, updated_at
                    FROM listings
                    WHERE is_active = 1
                      AND jurisdiction_code = ?1
                      AND domain = ?2
                    "#,
                )
                .bind(jurisdiction)
                .bind(domain.as_str())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(StoreError::Query)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let updated_at: String = row.get("updated_at");
            let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                .map_err(|source| StoreError::Decode {
                    id: id.clone(),
                    source,
                })?
                .with_timezone(&Utc);

            records.push(ListingRecord {
                id,
                domain,
                display_name: row.get("display_name"),
                city: row.get("city"),
                jurisdiction_code: row.get("jurisdiction_code"),
                country_code: row.get("country_code"),
                website_url: row.get("website_url"),
                is_active: row.get::<i64, _>("is_active") != 0,
                content: row.get("content"),
                updated_at,
            });
        }

        Ok(records)
    }
}

/// Backend selection mirrors deployment: SQLite when a database URL is
/// configured, process-local memory otherwise (tests, demos).
#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self, StoreError> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }
}

impl ListingRepository for Store {
    async fn query_active_listings(
        &self,
        jurisdiction: &str,
        domain: Domain,
        city: Option<&str>,
    ) -> Result<Vec<ListingRecord>, StoreError> {
        match self {
            Store::Memory(store) => store.query_active_listings(jurisdiction, domain, city).await,
            Store::Sqlite(store) => store.query_active_listings(jurisdiction, domain, city).await,
        }
    }
}
