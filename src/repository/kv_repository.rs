use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Typed accessor over the client-local persistent store. The
/// synchronizer and session code talk to this seam, never to the
/// storage API directly.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct KvRepository {
    pool: Arc<SqlitePool>,
}

impl KvRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl KvStore for KvRepository {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&*self.pool)
            .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }
}

/// In-memory store for unit tests that don't need a pool.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::database::init_test_database;

    async fn setup() -> KvRepository {
        let pool = init_test_database().await.unwrap();
        KvRepository::new(pool)
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let repo = setup().await;
        assert_eq!(repo.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let repo = setup().await;
        repo.put("token", "abc123").await.unwrap();
        assert_eq!(repo.get("token").await.unwrap().as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let repo = setup().await;
        repo.put("k", "v1").await.unwrap();
        repo.put("k", "v2").await.unwrap();
        assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = setup().await;
        repo.put("k", "v").await.unwrap();
        repo.delete("k").await.unwrap();
        assert_eq!(repo.get("k").await.unwrap(), None);
    }
}
