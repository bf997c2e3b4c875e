//! In-memory cache store for tests and ephemeral deployments.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shabaka_core::{CacheEntry, CacheStats, EntryMeta, PlayerResult};
use tokio::sync::RwLock;

use super::traits::CacheStore;

#[derive(Debug)]
struct Partition {
    created_at: DateTime<Utc>,
    entries: BTreeMap<String, CacheEntry>,
}

impl Partition {
    fn new() -> Self {
        Self {
            created_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }
}

/// [`CacheStore`] kept in a `HashMap` of partitions.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    partitions: RwLock<HashMap<String, Partition>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, partition: &str, key: &str) -> PlayerResult<Option<CacheEntry>> {
        let partitions = self.partitions.read().await;
        let found = partitions
            .get(partition)
            .and_then(|p| p.entries.get(key))
            .cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(found)
    }

    async fn contains(&self, partition: &str, key: &str) -> PlayerResult<bool> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(partition)
            .is_some_and(|p| p.entries.contains_key(key)))
    }

    async fn put(&self, partition: &str, entry: &CacheEntry) -> PlayerResult<()> {
        self.put_many(partition, std::slice::from_ref(entry)).await
    }

    async fn put_many(&self, partition: &str, entries: &[CacheEntry]) -> PlayerResult<()> {
        let mut partitions = self.partitions.write().await;
        let target = partitions
            .entry(partition.to_string())
            .or_insert_with(Partition::new);
        for entry in entries {
            target.entries.insert(entry.key.clone(), entry.clone());
        }
        Ok(())
    }

    async fn list(&self, partition: &str) -> PlayerResult<Vec<EntryMeta>> {
        let partitions = self.partitions.read().await;
        let mut listed: Vec<EntryMeta> = partitions
            .get(partition)
            .map(|p| p.entries.values().map(CacheEntry::meta).collect())
            .unwrap_or_default();
        listed.sort_by(|a, b| {
            a.captured_at
                .cmp(&b.captured_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(listed)
    }

    async fn retain(&self, partition: &str, keep: &HashSet<String>) -> PlayerResult<u64> {
        let mut partitions = self.partitions.write().await;
        let Some(target) = partitions.get_mut(partition) else {
            return Ok(0);
        };
        let before = target.entries.len();
        target.entries.retain(|key, _| keep.contains(key));
        Ok((before - target.entries.len()) as u64)
    }

    async fn partitions(&self) -> PlayerResult<Vec<String>> {
        let partitions = self.partitions.read().await;
        let mut names: Vec<String> = partitions.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn has_partition(&self, partition: &str) -> PlayerResult<bool> {
        Ok(self.partitions.read().await.contains_key(partition))
    }

    async fn partition_created_at(&self, partition: &str) -> PlayerResult<Option<DateTime<Utc>>> {
        Ok(self
            .partitions
            .read()
            .await
            .get(partition)
            .map(|p| p.created_at))
    }

    async fn drop_partition(&self, partition: &str) -> PlayerResult<u64> {
        let mut partitions = self.partitions.write().await;
        Ok(partitions
            .remove(partition)
            .map(|p| p.entries.len() as u64)
            .unwrap_or(0))
    }

    fn stats(&self) -> CacheStats {
        let (entry_count, partition_count) = self
            .partitions
            .try_read()
            .map(|p| {
                (
                    p.values().map(|part| part.entries.len() as u64).sum(),
                    p.len() as u64,
                )
            })
            .unwrap_or_default();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            partition_count,
        }
    }
}
