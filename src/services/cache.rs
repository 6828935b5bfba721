use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::repository::KvStore;

pub const DEFAULT_TTL_MINUTES: i64 = 5;

/// Time source for expiry checks; tests substitute a fixed clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    value: serde_json::Value,
    /// Absolute expiry, unix milliseconds.
    expiry: i64,
}

/// Key-expiry cache over the persistent store. Entries are written
/// with an absolute expiry and evicted lazily on the first read past
/// it; there is no background sweep.
pub struct TtlCache {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.put_with_ttl(key, value, Duration::minutes(DEFAULT_TTL_MINUTES))
            .await
    }

    pub async fn put_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let entry = CacheEntry {
            value: serde_json::to_value(value)?,
            expiry: (self.clock.now() + ttl).timestamp_millis(),
        };
        self.store.put(key, &serde_json::to_string(&entry)?).await
    }

    /// Returns the cached value if present and unexpired. An expired
    /// or undeserializable entry is removed and treated as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(_) => {
                debug!(key, "evicting corrupt cache entry");
                self.store.delete(key).await?;
                return Ok(None);
            }
        };

        if self.clock.now().timestamp_millis() > entry.expiry {
            debug!(key, "evicting expired cache entry");
            self.store.delete(key).await?;
            return Ok(None);
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                self.store.delete(key).await?;
                Ok(None)
            }
        }
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.store.delete(key).await
    }
}
