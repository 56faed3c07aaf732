//! Short-lived cache for home page reference data.
//!
//! Occupations and countries change rarely, so they are kept for ten minutes
//! under a fixed key. Entries past their expiry, or that no longer parse, are
//! treated as missing and refetched.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::models::ReferenceData;

pub const HOME_CACHE_KEY: &str = "overseas.home-data";
pub const HOME_CACHE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: String,
    pub stored_at: DateTime<Utc>,
}

pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    fn put(&self, key: &str, value: &str, stored_at: DateTime<Utc>) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open cache database: {}", path.display()))?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                stored_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create cache table")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("cache connection lock poisoned"))
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT value, stored_at FROM cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            Some((value, stored_at)) => {
                let stored_at = DateTime::parse_from_rfc3339(&stored_at)
                    .with_context(|| format!("Bad timestamp for cache key {}", key))?
                    .with_timezone(&Utc);
                Ok(Some(CacheEntry { value, stored_at }))
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str, stored_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cache (key, value, stored_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, stored_at = excluded.stored_at",
            params![key, value, stored_at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn()?.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entries = self.entries.lock().map_err(|_| anyhow!("cache lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str, stored_at: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("cache lock poisoned"))?;
        entries.insert(key.to_string(), CacheEntry { value: value.to_string(), stored_at });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("cache lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

pub struct ReferenceCache<S: CacheStore> {
    store: S,
    ttl: Duration,
}

impl<S: CacheStore> ReferenceCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            ttl: Duration::minutes(HOME_CACHE_TTL_MINUTES),
        }
    }

    /// Cached data if it is younger than the expiry window at `now`.
    pub fn read(&self, now: DateTime<Utc>) -> Option<ReferenceData> {
        let entry = match self.store.get(HOME_CACHE_KEY) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!("Reading reference cache failed: {:#}", e);
                return None;
            }
        };

        if now - entry.stored_at >= self.ttl {
            debug!("Reference cache expired (stored {})", entry.stored_at);
            return None;
        }

        match serde_json::from_str(&entry.value) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Discarding unreadable reference cache: {}", e);
                None
            }
        }
    }

    pub fn write(&self, data: &ReferenceData, now: DateTime<Utc>) -> Result<()> {
        let value = serde_json::to_string(data).context("Failed to serialize reference data")?;
        self.store.put(HOME_CACHE_KEY, &value, now)
    }

    pub fn invalidate(&self) -> Result<()> {
        self.store.remove(HOME_CACHE_KEY)
    }

    /// Returns cached data when fresh, otherwise runs `fetch` and caches its
    /// result. A failing cache write only costs the next caller a refetch.
    pub async fn load_with<F, Fut>(&self, now: DateTime<Utc>, fetch: F) -> Result<ReferenceData, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ReferenceData, ApiError>>,
    {
        if let Some(data) = self.read(now) {
            debug!("Reference data served from cache");
            return Ok(data);
        }
        let data = fetch().await?;
        info!(
            "Fetched reference data: {} occupations, {} countries",
            data.occupations.len(),
            data.countries.len()
        );
        if let Err(e) = self.write(&data, now) {
            warn!("Writing reference cache failed: {:#}", e);
        }
        Ok(data)
    }

    pub async fn load(&self, client: &ApiClient, now: DateTime<Utc>) -> Result<ReferenceData, ApiError> {
        self.load_with(now, || fetch_reference_data(client)).await
    }
}

pub async fn fetch_reference_data(client: &ApiClient) -> Result<ReferenceData, ApiError> {
    let (occupations, countries) = futures::try_join!(client.occupations(), client.countries())?;
    Ok(ReferenceData { occupations, countries })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::models::{Country, Occupation};

    fn sample() -> ReferenceData {
        ReferenceData {
            occupations: vec![Occupation { id: 3.into(), title: "Construction".to_string() }],
            countries: vec![Country { id: 7.into(), name: "Qatar".to_string() }],
        }
    }

    fn at(minute: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z").unwrap().with_timezone(&Utc) + Duration::minutes(minute)
    }

    async fn load_counting<S: CacheStore>(cache: &ReferenceCache<S>, now: DateTime<Utc>, calls: &AtomicUsize) -> ReferenceData {
        cache
            .load_with(now, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(sample())
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_entry_skips_fetch_until_expiry() {
        let cache = ReferenceCache::new(SqliteStore::in_memory().unwrap());
        let calls = AtomicUsize::new(0);

        assert_eq!(load_counting(&cache, at(0), &calls).await, sample());
        assert_eq!(load_counting(&cache, at(9), &calls).await, sample());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        load_counting(&cache, at(10), &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // the refetch restarted the window
        load_counting(&cache, at(15), &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let cache = ReferenceCache::new(MemoryStore::default());
        let result = cache
            .load_with(at(0), || async { Err(ApiError::Status { code: 500, message: "down".to_string() }) })
            .await;
        assert!(result.is_err());
        assert!(cache.read(at(0)).is_none());
    }

    #[test]
    fn test_unreadable_entry_is_a_miss() {
        let store = MemoryStore::default();
        store.put(HOME_CACHE_KEY, "{not json", at(0)).unwrap();
        let cache = ReferenceCache::new(store);
        assert!(cache.read(at(1)).is_none());
    }

    #[test]
    fn test_sqlite_roundtrip_and_invalidate() {
        let store = SqliteStore::in_memory().unwrap();
        store.put("k", "v1", at(0)).unwrap();
        store.put("k", "v2", at(3)).unwrap();
        let entry = store.get("k").unwrap().unwrap();
        assert_eq!(entry.value, "v2");
        assert_eq!(entry.stored_at, at(3));

        let cache = ReferenceCache::new(store);
        cache.write(&sample(), at(0)).unwrap();
        assert!(cache.read(at(1)).is_some());
        cache.invalidate().unwrap();
        assert!(cache.read(at(1)).is_none());
    }
}
