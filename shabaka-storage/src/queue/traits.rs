//! Durable event queue trait.

use async_trait::async_trait;
use serde_json::Value;
use shabaka_core::{EventTimestamp, PlayerResult, QueuedEvent};

/// Outcome of an enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct Enqueued {
    pub event: QueuedEvent,
    /// Oldest events dropped to stay within capacity.
    pub evicted: u64,
}

/// Telemetry events waiting for delivery, ordered by timestamp.
///
/// Events leave the queue only through [`EventQueue::remove`], which callers
/// invoke after confirmed delivery, or through capacity eviction.
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// Store `payload` under a fresh, strictly increasing timestamp.
    async fn enqueue(&self, payload: Value) -> PlayerResult<Enqueued>;

    /// Up to `limit` oldest events, ascending by timestamp.
    async fn peek_batch(&self, limit: usize) -> PlayerResult<Vec<QueuedEvent>>;

    /// Delete one event. Returns whether it existed.
    async fn remove(&self, timestamp: EventTimestamp) -> PlayerResult<bool>;

    async fn len(&self) -> PlayerResult<u64>;

    async fn is_empty(&self) -> PlayerResult<bool> {
        Ok(self.len().await? == 0)
    }
}
