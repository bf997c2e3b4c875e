//! Sync coordinator: queue drain, cache status, and media eviction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use shabaka_core::{normalize_key, CacheStatus, InterceptedRequest, PlayerResult};
use tokio::sync::Mutex;

use crate::constants::LOG_PLAY_PATH;
use crate::state::ProxyState;

/// Outcome of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub delivered: u64,
    pub remaining: u64,
    /// Whether the drain stopped on a failed delivery.
    pub halted: bool,
}

pub struct SyncCoordinator {
    state: ProxyState,
    drain_lock: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(state: ProxyState) -> Self {
        Self {
            state,
            drain_lock: Mutex::new(()),
        }
    }

    /// Deliver queued events oldest first.
    ///
    /// An event is removed only after a 2xx from the server. The first
    /// failure ends the drain so later events never overtake it. Concurrent
    /// calls wait for each other.
    pub async fn drain(&self) -> PlayerResult<DrainReport> {
        let _guard = self.drain_lock.lock().await;
        let batch_size = self.state.config.drain_batch_size;
        let mut report = DrainReport::default();

        'pages: loop {
            let batch = self.state.queue.peek_batch(batch_size).await?;
            if batch.is_empty() {
                break;
            }

            for event in batch {
                let request = self
                    .state
                    .session
                    .apply(InterceptedRequest::post_json(LOG_PLAY_PATH, &event.payload));

                match self.state.upstream.send(&request).await {
                    Ok(response) if response.is_success() => {
                        self.state.queue.remove(event.timestamp).await?;
                        report.delivered += 1;
                    }
                    Ok(response) => {
                        tracing::warn!(
                            timestamp = %event.timestamp,
                            status = response.status,
                            "Play log rejected, halting drain"
                        );
                        report.halted = true;
                        break 'pages;
                    }
                    Err(e) => {
                        tracing::debug!(
                            timestamp = %event.timestamp,
                            error = %e,
                            "Play log delivery failed, halting drain"
                        );
                        report.halted = true;
                        break 'pages;
                    }
                }
            }
        }

        report.remaining = self.state.queue.len().await?;
        if report.delivered > 0 || report.halted {
            tracing::info!(
                delivered = report.delivered,
                remaining = report.remaining,
                halted = report.halted,
                "Queue drain finished"
            );
        }
        Ok(report)
    }

    /// Snapshot of the active media partition.
    pub async fn cache_status(&self) -> PlayerResult<CacheStatus> {
        let partition = self.state.partitions.current().media();
        let entries = self.state.cache.list(&partition).await?;
        Ok(CacheStatus::from_entries(entries.iter()))
    }

    /// Delete every media entry whose key is not in `keep_urls`.
    ///
    /// Returns the number of entries removed.
    pub async fn evict_media(&self, keep_urls: &[String]) -> PlayerResult<u64> {
        let origin = self.state.upstream.origin();
        let keep: HashSet<String> = keep_urls
            .iter()
            .filter_map(|url| normalize_key(url, origin))
            .collect();
        let partition = self.state.partitions.current().media();
        let removed = self.state.cache.retain(&partition, &keep).await?;
        tracing::info!(partition = %partition, kept = keep.len(), removed, "Media eviction complete");
        Ok(removed)
    }
}
