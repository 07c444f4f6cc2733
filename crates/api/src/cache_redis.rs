use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde_json::Value;
use tracing::info;

use subtext_annotation::cache::{AnnotationCache, CacheKey};

/// Redis-backed annotation cache. Values are JSON strings; last write wins.
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| anyhow::anyhow!("Invalid Redis URL: {e}"))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {e}"))?;
        info!("Redis cache connected");
        Ok(Self { conn })
    }
}

#[async_trait]
impl AnnotationCache for RedisCache {
    async fn get(&self, key: &CacheKey) -> anyhow::Result<Option<Value>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key.to_string()).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, value: Value) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(&value)?;
        let _: () = conn.set(key.to_string(), raw).await?;
        Ok(())
    }
}
