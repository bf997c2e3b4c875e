//! Cache store trait.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shabaka_core::{CacheEntry, CacheStats, EntryMeta, PlayerResult};

/// Named partitions of URL-keyed responses.
///
/// Within a partition a key maps to at most one entry and writes overwrite.
/// A partition exists once something has been written to it and until it is
/// dropped.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up an entry. Counts as a hit or a miss in [`CacheStore::stats`].
    async fn get(&self, partition: &str, key: &str) -> PlayerResult<Option<CacheEntry>>;

    /// Whether an entry exists, without touching the hit counters.
    async fn contains(&self, partition: &str, key: &str) -> PlayerResult<bool>;

    /// Insert or overwrite one entry.
    async fn put(&self, partition: &str, entry: &CacheEntry) -> PlayerResult<()>;

    /// Insert or overwrite several entries in one atomic write.
    async fn put_many(&self, partition: &str, entries: &[CacheEntry]) -> PlayerResult<()>;

    /// Entry metadata of a partition, oldest capture first.
    async fn list(&self, partition: &str) -> PlayerResult<Vec<EntryMeta>>;

    /// Delete every entry of `partition` whose key is not in `keep`.
    /// Returns the number of deleted entries.
    async fn retain(&self, partition: &str, keep: &HashSet<String>) -> PlayerResult<u64>;

    /// Names of every existing partition, sorted.
    async fn partitions(&self) -> PlayerResult<Vec<String>>;

    async fn has_partition(&self, partition: &str) -> PlayerResult<bool>;

    /// When `partition` received its first write, if it exists.
    async fn partition_created_at(&self, partition: &str) -> PlayerResult<Option<DateTime<Utc>>>;

    /// Delete a partition and all of its entries. Returns the number of
    /// deleted entries.
    async fn drop_partition(&self, partition: &str) -> PlayerResult<u64>;

    fn stats(&self) -> CacheStats;
}
