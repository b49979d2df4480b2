//! Settings key/value persistence with a small read-through cache.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::errors::MetaStoreError;

pub(crate) async fn ensure_schema(pool: &PgPool) -> Result<(), MetaStoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key VARCHAR(100) PRIMARY KEY,
            value JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn get(pool: &PgPool, key: &str) -> Result<Option<Value>, MetaStoreError> {
    let row = sqlx::query("SELECT value FROM settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get::<Value, _>("value")))
}

pub(crate) async fn put(pool: &PgPool, key: &str, value: &Value) -> Result<(), MetaStoreError> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES ($1, $2, now())
        ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    debug!(key, "setting updated");
    Ok(())
}

/// Read-mostly per-key cache. Entries expire after a TTL so out-of-band
/// writes are picked up within seconds.
pub(crate) struct SettingsCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Option<Value>)>>,
}

impl SettingsCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// `Some(cached)` on a fresh hit; `None` means the caller must read
    /// through. The inner `Option` caches negative lookups too.
    pub(crate) fn get(&self, key: &str) -> Option<Option<Value>> {
        let entries = self.entries.lock().expect("settings cache poisoned");
        entries.get(key).and_then(|(at, value)| {
            if at.elapsed() < self.ttl {
                Some(value.clone())
            } else {
                None
            }
        })
    }

    pub(crate) fn put(&self, key: &str, value: Option<Value>) {
        let mut entries = self.entries.lock().expect("settings cache poisoned");
        entries.insert(key.to_string(), (Instant::now(), value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_serves_fresh_entries_only() {
        let cache = SettingsCache::new(Duration::from_secs(60));
        assert!(cache.get("chunk_size").is_none());

        cache.put("chunk_size", Some(Value::from(256)));
        assert_eq!(cache.get("chunk_size"), Some(Some(Value::from(256))));

        let expired = SettingsCache::new(Duration::from_millis(0));
        expired.put("chunk_size", Some(Value::from(256)));
        assert!(expired.get("chunk_size").is_none());
    }

    #[test]
    fn cache_remembers_negative_lookups() {
        let cache = SettingsCache::new(Duration::from_secs(60));
        cache.put("prompt_summary", None);
        assert_eq!(cache.get("prompt_summary"), Some(None));
    }
}
