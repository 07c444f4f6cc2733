use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

/// Composite cache key scoped to one subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub subject_id: String,
    pub scope: CacheScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// The whole-subject aggregate.
    Subject,
    /// One chunk, identified by its start index and length.
    Chunk { start_index: usize, len: usize },
}

impl CacheKey {
    pub fn subject(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            scope: CacheScope::Subject,
        }
    }

    pub fn chunk(subject_id: impl Into<String>, start_index: usize, len: usize) -> Self {
        Self {
            subject_id: subject_id.into(),
            scope: CacheScope::Chunk { start_index, len },
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            CacheScope::Subject => write!(f, "ann:{}:full", self.subject_id),
            CacheScope::Chunk { start_index, len } => {
                write!(f, "ann:{}:{}:{}", self.subject_id, start_index, len)
            }
        }
    }
}

/// Trait for the external annotation cache.
///
/// Last-write-wins per key is the only consistency requirement. Callers treat
/// errors as misses; a broken cache degrades throughput, never correctness.
#[async_trait]
pub trait AnnotationCache: Send + Sync + 'static {
    async fn get(&self, key: &CacheKey) -> anyhow::Result<Option<Value>>;
    async fn set(&self, key: &CacheKey, value: Value) -> anyhow::Result<()>;
}

/// In-process cache for tests and single-node deployments.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Value>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AnnotationCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> anyhow::Result<Option<Value>> {
        Ok(self.entries.get(&key.to_string()).map(|v| v.clone()))
    }

    async fn set(&self, key: &CacheKey, value: Value) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(CacheKey::subject("vid1").to_string(), "ann:vid1:full");
        assert_eq!(CacheKey::chunk("vid1", 20, 15).to_string(), "ann:vid1:20:15");
    }

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new();
        let key = CacheKey::chunk("vid1", 0, 10);
        assert!(cache.get(&key).await.unwrap().is_none());
        cache.set(&key, serde_json::json!({"count": 3})).await.unwrap();
        let value = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(value["count"], 3);
        // last write wins
        cache.set(&key, serde_json::json!({"count": 4})).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().unwrap()["count"], 4);
        assert_eq!(cache.len(), 1);
    }
}
