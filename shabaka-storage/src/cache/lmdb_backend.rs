//! LMDB-backed cache store with partition isolation.
//!
//! Uses the heed crate (Rust bindings for LMDB). One environment holds three
//! named databases:
//!
//! - `entries`: full cache entries keyed by [`PartitionScopedKey`]
//! - `entry_meta`: body-less metadata under the same keys, so listings never
//!   copy media bodies
//! - `partitions`: registry of existing partitions and their creation time
//!
//! Every mutation touches `entries` and `entry_meta` in the same write
//! transaction.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heed::types::{Bytes, SerdeBincode, Str};
use heed::{Database, Env, RwTxn};
use shabaka_core::{CacheEntry, CacheStats, EntryMeta, PlayerResult};

use super::partition_key::PartitionScopedKey;
use super::traits::CacheStore;
use crate::lmdb::{open_env, LmdbStoreError};

const ENTRIES_DB: &str = "entries";
const META_DB: &str = "entry_meta";
const PARTITIONS_DB: &str = "partitions";

/// LMDB-backed [`CacheStore`].
pub struct LmdbCacheStore {
    env: Env,
    entries: Database<Bytes, SerdeBincode<CacheEntry>>,
    meta: Database<Bytes, SerdeBincode<EntryMeta>>,
    partitions: Database<Str, SerdeBincode<DateTime<Utc>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LmdbCacheStore {
    /// Open or create a cache store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the environment in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        let env = open_env(path.as_ref(), max_size_mb, 3)?;

        let mut wtxn = env.write_txn()?;
        let entries = env
            .create_database(&mut wtxn, Some(ENTRIES_DB))
            .map_err(|e| db_open(ENTRIES_DB, e))?;
        let meta = env
            .create_database(&mut wtxn, Some(META_DB))
            .map_err(|e| db_open(META_DB, e))?;
        let partitions = env
            .create_database(&mut wtxn, Some(PARTITIONS_DB))
            .map_err(|e| db_open(PARTITIONS_DB, e))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            entries,
            meta,
            partitions,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    fn get_sync(&self, partition: &str, key: &str) -> Result<Option<CacheEntry>, LmdbStoreError> {
        let rtxn = self.env.read_txn()?;
        let encoded = PartitionScopedKey::new(partition, key).encode();
        Ok(self.entries.get(&rtxn, &encoded)?)
    }

    fn contains_sync(&self, partition: &str, key: &str) -> Result<bool, LmdbStoreError> {
        let rtxn = self.env.read_txn()?;
        let encoded = PartitionScopedKey::new(partition, key).encode();
        Ok(self.meta.get(&rtxn, &encoded)?.is_some())
    }

    fn register_partition(&self, wtxn: &mut RwTxn, partition: &str) -> Result<(), LmdbStoreError> {
        if self.partitions.get(wtxn, partition)?.is_none() {
            self.partitions.put(wtxn, partition, &Utc::now())?;
        }
        Ok(())
    }

    fn put_sync(&self, partition: &str, entries: &[CacheEntry]) -> Result<(), LmdbStoreError> {
        let mut wtxn = self.env.write_txn()?;
        self.register_partition(&mut wtxn, partition)?;
        for entry in entries {
            let encoded = PartitionScopedKey::new(partition, entry.key.as_str()).encode();
            self.entries.put(&mut wtxn, &encoded, entry)?;
            self.meta.put(&mut wtxn, &encoded, &entry.meta())?;
        }
        wtxn.commit()?;
        Ok(())
    }

    fn list_sync(&self, partition: &str) -> Result<Vec<EntryMeta>, LmdbStoreError> {
        let rtxn = self.env.read_txn()?;
        let prefix = PartitionScopedKey::partition_prefix(partition);
        let mut listed = Vec::new();
        for result in self.meta.prefix_iter(&rtxn, &prefix)? {
            let (_, meta) = result?;
            listed.push(meta);
        }
        listed.sort_by(|a, b| {
            a.captured_at
                .cmp(&b.captured_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(listed)
    }

    /// Delete every entry of `partition` whose key fails `keep`, in one
    /// write transaction.
    fn delete_where(
        &self,
        wtxn: &mut RwTxn,
        partition: &str,
        keep: impl Fn(&str) -> bool,
    ) -> Result<u64, LmdbStoreError> {
        let prefix = PartitionScopedKey::partition_prefix(partition);
        let mut doomed = Vec::new();
        for result in self.meta.prefix_iter(wtxn, &prefix)? {
            let (raw, meta) = result?;
            if !keep(&meta.key) {
                doomed.push(raw.to_vec());
            }
        }

        let mut deleted = 0u64;
        for raw in &doomed {
            if self.meta.delete(wtxn, raw)? {
                deleted += 1;
            }
            self.entries.delete(wtxn, raw)?;
        }
        Ok(deleted)
    }

    fn retain_sync(&self, partition: &str, keep: &HashSet<String>) -> Result<u64, LmdbStoreError> {
        let mut wtxn = self.env.write_txn()?;
        let deleted = self.delete_where(&mut wtxn, partition, |key| keep.contains(key))?;
        wtxn.commit()?;
        Ok(deleted)
    }

    fn drop_partition_sync(&self, partition: &str) -> Result<u64, LmdbStoreError> {
        let mut wtxn = self.env.write_txn()?;
        let deleted = self.delete_where(&mut wtxn, partition, |_| false)?;
        self.partitions.delete(&mut wtxn, partition)?;
        wtxn.commit()?;
        Ok(deleted)
    }

    fn partitions_sync(&self) -> Result<Vec<String>, LmdbStoreError> {
        let rtxn = self.env.read_txn()?;
        let mut names = Vec::new();
        for result in self.partitions.iter(&rtxn)? {
            let (name, _) = result?;
            names.push(name.to_string());
        }
        Ok(names)
    }

    fn has_partition_sync(&self, partition: &str) -> Result<bool, LmdbStoreError> {
        Ok(self.created_at_sync(partition)?.is_some())
    }

    fn created_at_sync(&self, partition: &str) -> Result<Option<DateTime<Utc>>, LmdbStoreError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.partitions.get(&rtxn, partition)?)
    }

    fn counts(&self) -> Result<(u64, u64), LmdbStoreError> {
        let rtxn = self.env.read_txn()?;
        Ok((self.meta.len(&rtxn)?, self.partitions.len(&rtxn)?))
    }
}

fn db_open(name: &str, e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::DbOpen {
        name: name.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl CacheStore for LmdbCacheStore {
    async fn get(&self, partition: &str, key: &str) -> PlayerResult<Option<CacheEntry>> {
        let found = self.get_sync(partition, key)?;
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(found)
    }

    async fn contains(&self, partition: &str, key: &str) -> PlayerResult<bool> {
        Ok(self.contains_sync(partition, key)?)
    }

    async fn put(&self, partition: &str, entry: &CacheEntry) -> PlayerResult<()> {
        Ok(self.put_sync(partition, std::slice::from_ref(entry))?)
    }

    async fn put_many(&self, partition: &str, entries: &[CacheEntry]) -> PlayerResult<()> {
        Ok(self.put_sync(partition, entries)?)
    }

    async fn list(&self, partition: &str) -> PlayerResult<Vec<EntryMeta>> {
        Ok(self.list_sync(partition)?)
    }

    async fn retain(&self, partition: &str, keep: &HashSet<String>) -> PlayerResult<u64> {
        Ok(self.retain_sync(partition, keep)?)
    }

    async fn partitions(&self) -> PlayerResult<Vec<String>> {
        Ok(self.partitions_sync()?)
    }

    async fn has_partition(&self, partition: &str) -> PlayerResult<bool> {
        Ok(self.has_partition_sync(partition)?)
    }

    async fn partition_created_at(&self, partition: &str) -> PlayerResult<Option<DateTime<Utc>>> {
        Ok(self.created_at_sync(partition)?)
    }

    async fn drop_partition(&self, partition: &str) -> PlayerResult<u64> {
        let deleted = self.drop_partition_sync(partition)?;
        tracing::debug!(partition = %partition, deleted, "Dropped cache partition");
        Ok(deleted)
    }

    fn stats(&self) -> CacheStats {
        let (entry_count, partition_count) = self.counts().unwrap_or_default();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            partition_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shabaka_core::PlayerResponse;
    use tempfile::TempDir;

    const MEDIA: &str = "shabaka-media-v1";

    fn create_test_store() -> (LmdbCacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbCacheStore::open(temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    fn entry(key: &str, body: &[u8]) -> CacheEntry {
        let response = PlayerResponse::from_network(200, Vec::new(), body.to_vec());
        CacheEntry::from_response(key, &response)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _dir) = create_test_store();
        store
            .put(MEDIA, &entry("/static/uploads/a.mp4", b"video"))
            .await
            .expect("put should succeed");

        let found = store
            .get(MEDIA, "/static/uploads/a.mp4")
            .await
            .expect("get should succeed")
            .expect("entry should exist");
        assert_eq!(found.body, b"video");
        assert!(store.has_partition(MEDIA).await.expect("has_partition should succeed"));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (store, _dir) = create_test_store();
        store.put(MEDIA, &entry("/a", b"one")).await.expect("put should succeed");
        store.put(MEDIA, &entry("/a", b"two")).await.expect("put should succeed");

        let listed = store.list(MEDIA).await.expect("list should succeed");
        assert_eq!(listed.len(), 1);
        let found = store.get(MEDIA, "/a").await.expect("get should succeed");
        assert_eq!(found.map(|e| e.body), Some(b"two".to_vec()));
    }

    #[tokio::test]
    async fn test_partition_isolation() {
        let (store, _dir) = create_test_store();
        store.put(MEDIA, &entry("/a", b"media")).await.expect("put should succeed");
        store
            .put("shabaka-api-v1", &entry("/a", b"api"))
            .await
            .expect("put should succeed");

        assert!(store.get("shabaka-media-v2", "/a").await.expect("get should succeed").is_none());
        assert_eq!(store.list(MEDIA).await.expect("list should succeed").len(), 1);

        let dropped = store.drop_partition(MEDIA).await.expect("drop should succeed");
        assert_eq!(dropped, 1);
        assert!(store.get("shabaka-api-v1", "/a").await.expect("get should succeed").is_some());
        assert_eq!(
            store.partitions().await.expect("partitions should succeed"),
            vec!["shabaka-api-v1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_retain_keeps_only_listed_keys() {
        let (store, _dir) = create_test_store();
        let batch = [entry("/a", b"a"), entry("/b", b"b"), entry("/c", b"c")];
        store.put_many(MEDIA, &batch).await.expect("put_many should succeed");

        let keep: HashSet<String> = ["/b".to_string()].into_iter().collect();
        let deleted = store.retain(MEDIA, &keep).await.expect("retain should succeed");
        assert_eq!(deleted, 2);

        let keys: Vec<_> = store
            .list(MEDIA)
            .await
            .expect("list should succeed")
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(keys, vec!["/b".to_string()]);
        assert!(!store.contains(MEDIA, "/a").await.expect("contains should succeed"));
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        {
            let store = LmdbCacheStore::open(temp_dir.path(), 10).expect("open should succeed");
            store.put(MEDIA, &entry("/a", b"persisted")).await.expect("put should succeed");
        }
        let store = LmdbCacheStore::open(temp_dir.path(), 10).expect("reopen should succeed");
        let found = store.get(MEDIA, "/a").await.expect("get should succeed");
        assert_eq!(found.map(|e| e.body), Some(b"persisted".to_vec()));
    }

    #[tokio::test]
    async fn test_partition_created_at_is_first_write() {
        let (store, _dir) = create_test_store();
        assert!(store
            .partition_created_at(MEDIA)
            .await
            .expect("created_at should succeed")
            .is_none());

        store.put(MEDIA, &entry("/a", b"a")).await.expect("put should succeed");
        let first = store
            .partition_created_at(MEDIA)
            .await
            .expect("created_at should succeed");
        store.put(MEDIA, &entry("/b", b"b")).await.expect("put should succeed");
        let second = store
            .partition_created_at(MEDIA)
            .await
            .expect("created_at should succeed");

        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_stats() {
        let (store, _dir) = create_test_store();
        store.put(MEDIA, &entry("/a", b"a")).await.expect("put should succeed");
        let _ = store.get(MEDIA, "/a").await;
        let _ = store.get(MEDIA, "/missing").await;

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.partition_count, 1);
    }
}
