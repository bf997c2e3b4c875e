//! In-memory event queue.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use shabaka_core::{EventTimestamp, PlayerResult, QueuedEvent, TimestampSequencer};
use tokio::sync::RwLock;

use super::traits::{Enqueued, EventQueue};

/// [`EventQueue`] kept in a `BTreeMap`; contents are lost on restart.
#[derive(Debug)]
pub struct InMemoryEventQueue {
    events: RwLock<BTreeMap<EventTimestamp, Value>>,
    sequencer: TimestampSequencer,
    capacity: usize,
}

impl InMemoryEventQueue {
    pub fn new(capacity: usize, sequencer: TimestampSequencer) -> Self {
        Self {
            events: RwLock::new(BTreeMap::new()),
            sequencer,
            capacity,
        }
    }
}

#[async_trait]
impl EventQueue for InMemoryEventQueue {
    async fn enqueue(&self, payload: Value) -> PlayerResult<Enqueued> {
        let mut events = self.events.write().await;
        let timestamp = self.sequencer.next();
        events.insert(timestamp, payload.clone());

        let mut evicted = 0u64;
        while events.len() > self.capacity {
            if events.pop_first().is_none() {
                break;
            }
            evicted += 1;
        }

        Ok(Enqueued {
            event: QueuedEvent { timestamp, payload },
            evicted,
        })
    }

    async fn peek_batch(&self, limit: usize) -> PlayerResult<Vec<QueuedEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .take(limit)
            .map(|(timestamp, payload)| QueuedEvent {
                timestamp: *timestamp,
                payload: payload.clone(),
            })
            .collect())
    }

    async fn remove(&self, timestamp: EventTimestamp) -> PlayerResult<bool> {
        Ok(self.events.write().await.remove(&timestamp).is_some())
    }

    async fn len(&self) -> PlayerResult<u64> {
        Ok(self.events.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        #[test]
        fn prop_len_never_exceeds_capacity(capacity in 1usize..8, pushes in 0usize..32) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime should build");
            runtime.block_on(async {
                let queue = InMemoryEventQueue::new(capacity, TimestampSequencer::system());
                let mut evicted = 0u64;
                for n in 0..pushes {
                    evicted += queue.enqueue(json!({"n": n})).await.expect("enqueue should succeed").evicted;
                }
                let len = queue.len().await.expect("len should succeed");
                assert_eq!(len, pushes.min(capacity) as u64);
                assert_eq!(evicted, pushes.saturating_sub(capacity) as u64);

                // Survivors are the newest pushes, oldest first.
                let batch = queue.peek_batch(capacity).await.expect("peek should succeed");
                if let Some(first) = batch.first() {
                    assert_eq!(first.payload, json!({"n": pushes - len as usize}));
                }
            });
        }
    }
}
