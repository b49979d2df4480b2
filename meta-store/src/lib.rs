//! Postgres-backed `MetaStore` adapter.
//!
//! Owns the Document row, the persisted query results and the settings
//! key/value table. Status writes go through dedicated methods so the
//! `pending -> processing -> completed|failed` lattice is enforced at the
//! query level: each transition updates only rows currently in the expected
//! prior state.

mod documents;
mod errors;
mod queries;
mod settings;

pub use errors::MetaStoreError;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;
use uuid::Uuid;

use doc_base::{DocumentRecord, IngestOutcome, MetaStore, PortError, QueryRecord};

use crate::settings::SettingsCache;

/// Connection + cache handle. Cheap to clone via the inner pool.
pub struct PgMetaStore {
    pool: PgPool,
    settings_cache: SettingsCache,
}

impl PgMetaStore {
    /// Connects to Postgres with a small pool.
    ///
    /// # Errors
    /// Returns `MetaStoreError::Sqlx` if the URL is invalid or the server is
    /// unreachable.
    pub async fn connect(database_url: &str) -> Result<Self, MetaStoreError> {
        let options = PgConnectOptions::from_str(database_url)?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;
        info!("meta-store connected");
        Ok(Self {
            pool,
            settings_cache: SettingsCache::new(Duration::from_secs(30)),
        })
    }

    /// Creates the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), MetaStoreError> {
        documents::ensure_schema(&self.pool).await?;
        queries::ensure_schema(&self.pool).await?;
        settings::ensure_schema(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MetaStore for PgMetaStore {
    async fn document(&self, id: Uuid) -> Result<Option<DocumentRecord>, PortError> {
        Ok(documents::fetch(&self.pool, id).await?)
    }

    async fn mark_processing(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<(), PortError> {
        Ok(documents::mark_processing(&self.pool, id, started_at).await?)
    }

    async fn mark_completed(&self, id: Uuid, outcome: &IngestOutcome) -> Result<(), PortError> {
        Ok(documents::mark_completed(&self.pool, id, outcome).await?)
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error_message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        Ok(documents::mark_failed(&self.pool, id, error_message, completed_at).await?)
    }

    async fn put_query_result(&self, record: &QueryRecord) -> Result<(), PortError> {
        Ok(queries::put(&self.pool, record).await?)
    }

    async fn setting(&self, key: &str) -> Result<Option<serde_json::Value>, PortError> {
        if let Some(hit) = self.settings_cache.get(key) {
            return Ok(hit);
        }
        let value = settings::get(&self.pool, key).await?;
        self.settings_cache.put(key, value.clone());
        Ok(value)
    }

    async fn put_setting(&self, key: &str, value: serde_json::Value) -> Result<(), PortError> {
        settings::put(&self.pool, key, &value).await?;
        // Best-effort invalidation; readers tolerate seconds of staleness.
        self.settings_cache.put(key, Some(value));
        Ok(())
    }
}
