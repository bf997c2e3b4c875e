//! LMDB-backed durable event queue.
//!
//! Events live in the `pending` database keyed by
//! [`EventTimestamp::to_key_bytes`], so LMDB's byte ordering is timestamp
//! ordering and the first key is always the oldest event.

use std::path::Path;

use async_trait::async_trait;
use heed::types::{Bytes, SerdeJson};
use heed::{Database, Env, RwTxn};
use serde_json::Value;
use shabaka_core::{EventTimestamp, PlayerResult, QueuedEvent, TimestampSequencer};

use super::traits::{Enqueued, EventQueue};
use crate::lmdb::{open_env, LmdbStoreError};

const PENDING_DB: &str = "pending";

/// LMDB-backed [`EventQueue`] with a fixed capacity.
pub struct LmdbEventQueue {
    env: Env,
    pending: Database<Bytes, SerdeJson<Value>>,
    sequencer: TimestampSequencer,
    capacity: usize,
}

impl LmdbEventQueue {
    /// Open or create a queue.
    ///
    /// The sequencer is seeded with the newest persisted timestamp so keys
    /// keep increasing across restarts.
    pub fn open<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        capacity: usize,
        sequencer: TimestampSequencer,
    ) -> Result<Self, LmdbStoreError> {
        let env = open_env(path.as_ref(), max_size_mb, 1)?;

        let mut wtxn = env.write_txn()?;
        let pending: Database<Bytes, SerdeJson<Value>> = env
            .create_database(&mut wtxn, Some(PENDING_DB))
            .map_err(|e| LmdbStoreError::DbOpen {
                name: PENDING_DB.to_string(),
                reason: e.to_string(),
            })?;
        wtxn.commit()?;

        let queue = Self {
            env,
            pending,
            sequencer,
            capacity,
        };
        if let Some(newest) = queue.newest_timestamp()? {
            queue.sequencer.seed(newest);
        }
        Ok(queue)
    }

    fn newest_timestamp(&self) -> Result<Option<EventTimestamp>, LmdbStoreError> {
        let rtxn = self.env.read_txn()?;
        let newest = self
            .pending
            .last(&rtxn)?
            .and_then(|(raw, _)| EventTimestamp::from_key_bytes(raw));
        Ok(newest)
    }

    /// Drop the oldest events until at most `capacity` remain.
    fn evict_overflow(&self, wtxn: &mut RwTxn) -> Result<u64, LmdbStoreError> {
        let len = self.pending.len(wtxn)?;
        let overflow = len.saturating_sub(self.capacity as u64);
        if overflow == 0 {
            return Ok(0);
        }

        let mut doomed = Vec::new();
        for result in self.pending.iter(wtxn)?.take(overflow as usize) {
            let (raw, _) = result?;
            doomed.push(raw.to_vec());
        }
        for raw in &doomed {
            self.pending.delete(wtxn, raw)?;
        }
        Ok(doomed.len() as u64)
    }

    fn enqueue_sync(&self, payload: Value) -> Result<Enqueued, LmdbStoreError> {
        let timestamp = self.sequencer.next();
        let mut wtxn = self.env.write_txn()?;
        self.pending.put(&mut wtxn, &timestamp.to_key_bytes(), &payload)?;
        let evicted = self.evict_overflow(&mut wtxn)?;
        wtxn.commit()?;

        Ok(Enqueued {
            event: QueuedEvent { timestamp, payload },
            evicted,
        })
    }

    fn peek_sync(&self, limit: usize) -> Result<Vec<QueuedEvent>, LmdbStoreError> {
        let rtxn = self.env.read_txn()?;
        let mut events = Vec::new();
        for result in self.pending.iter(&rtxn)?.take(limit) {
            let (raw, payload) = result?;
            match EventTimestamp::from_key_bytes(raw) {
                Some(timestamp) => events.push(QueuedEvent { timestamp, payload }),
                None => tracing::warn!(key_len = raw.len(), "Skipping malformed queue key"),
            }
        }
        Ok(events)
    }

    fn remove_sync(&self, timestamp: EventTimestamp) -> Result<bool, LmdbStoreError> {
        let mut wtxn = self.env.write_txn()?;
        let deleted = self.pending.delete(&mut wtxn, &timestamp.to_key_bytes())?;
        wtxn.commit()?;
        Ok(deleted)
    }

    fn len_sync(&self) -> Result<u64, LmdbStoreError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.pending.len(&rtxn)?)
    }
}

#[async_trait]
impl EventQueue for LmdbEventQueue {
    async fn enqueue(&self, payload: Value) -> PlayerResult<Enqueued> {
        let enqueued = self.enqueue_sync(payload)?;
        if enqueued.evicted > 0 {
            tracing::warn!(
                evicted = enqueued.evicted,
                capacity = self.capacity,
                "Event queue full, dropped oldest events"
            );
        }
        Ok(enqueued)
    }

    async fn peek_batch(&self, limit: usize) -> PlayerResult<Vec<QueuedEvent>> {
        Ok(self.peek_sync(limit)?)
    }

    async fn remove(&self, timestamp: EventTimestamp) -> PlayerResult<bool> {
        Ok(self.remove_sync(timestamp)?)
    }

    async fn len(&self) -> PlayerResult<u64> {
        Ok(self.len_sync()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shabaka_core::Clock;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct FrozenClock(i64);

    impl Clock for FrozenClock {
        fn now_micros(&self) -> i64 {
            self.0
        }
    }

    fn frozen(at: i64) -> TimestampSequencer {
        TimestampSequencer::new(Arc::new(FrozenClock(at)))
    }

    fn create_test_queue(capacity: usize) -> (LmdbEventQueue, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let queue = LmdbEventQueue::open(temp_dir.path(), 10, capacity, frozen(1_000))
            .expect("queue creation should succeed");
        (queue, temp_dir)
    }

    #[tokio::test]
    async fn test_clock_collision_yields_distinct_keys() {
        let (queue, _dir) = create_test_queue(100);
        let a = queue.enqueue(json!({"content_id": 1})).await.expect("enqueue should succeed");
        let b = queue.enqueue(json!({"content_id": 2})).await.expect("enqueue should succeed");
        assert_ne!(a.event.timestamp, b.event.timestamp);
        assert_eq!(queue.len().await.expect("len should succeed"), 2);
    }

    #[tokio::test]
    async fn test_peek_is_ascending() {
        let (queue, _dir) = create_test_queue(100);
        for id in 0..5 {
            queue.enqueue(json!({"content_id": id})).await.expect("enqueue should succeed");
        }
        let batch = queue.peek_batch(3).await.expect("peek should succeed");
        assert_eq!(batch.len(), 3);
        assert!(batch.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(batch[0].payload, json!({"content_id": 0}));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let (queue, _dir) = create_test_queue(2);
        queue.enqueue(json!({"n": 1})).await.expect("enqueue should succeed");
        queue.enqueue(json!({"n": 2})).await.expect("enqueue should succeed");
        let third = queue.enqueue(json!({"n": 3})).await.expect("enqueue should succeed");
        assert_eq!(third.evicted, 1);

        let remaining: Vec<_> = queue
            .peek_batch(10)
            .await
            .expect("peek should succeed")
            .into_iter()
            .map(|e| e.payload)
            .collect();
        assert_eq!(remaining, vec![json!({"n": 2}), json!({"n": 3})]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_events_and_monotonic_keys() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let first = {
            let queue = LmdbEventQueue::open(temp_dir.path(), 10, 100, frozen(5_000))
                .expect("open should succeed");
            queue.enqueue(json!({"n": 1})).await.expect("enqueue should succeed");
            queue.enqueue(json!({"n": 2})).await.expect("enqueue should succeed").event.timestamp
        };

        // Wall clock moved backwards across the restart.
        let queue = LmdbEventQueue::open(temp_dir.path(), 10, 100, frozen(10))
            .expect("reopen should succeed");
        assert_eq!(queue.len().await.expect("len should succeed"), 2);
        let next = queue.enqueue(json!({"n": 3})).await.expect("enqueue should succeed");
        assert!(next.event.timestamp > first);
    }

    #[tokio::test]
    async fn test_remove_only_named_event() {
        let (queue, _dir) = create_test_queue(100);
        let a = queue.enqueue(json!({"n": 1})).await.expect("enqueue should succeed");
        queue.enqueue(json!({"n": 2})).await.expect("enqueue should succeed");

        assert!(queue.remove(a.event.timestamp).await.expect("remove should succeed"));
        assert!(!queue.remove(a.event.timestamp).await.expect("remove should succeed"));
        assert_eq!(queue.len().await.expect("len should succeed"), 1);
    }
}
