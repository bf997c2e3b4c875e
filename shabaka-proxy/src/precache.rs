//! Media precacher.
//!
//! Walks a playlist or an explicit URL list and makes sure every local asset
//! is in the media partition. Items are independent: one failure is logged
//! and the walk continues.

use serde::{Deserialize, Serialize};
use shabaka_core::{normalize_key, PlaylistDescription};

use crate::handlers::store_response;
use crate::state::ProxyState;

/// Outcome of one precache pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecacheReport {
    pub fetched: u64,
    pub already_cached: u64,
    pub skipped_remote: u64,
    pub failed: u64,
}

#[derive(Clone)]
pub struct MediaPrecacher {
    state: ProxyState,
}

impl MediaPrecacher {
    pub fn new(state: ProxyState) -> Self {
        Self { state }
    }

    pub async fn precache_playlist(&self, playlist: &PlaylistDescription) -> PrecacheReport {
        let urls: Vec<String> = playlist.local_urls().map(str::to_string).collect();
        let report = PrecacheReport {
            skipped_remote: (playlist.items.len() - urls.len()) as u64,
            ..PrecacheReport::default()
        };
        self.run(urls, report).await
    }

    /// Precache an explicit list, as sent by a `PRECACHE_MEDIA` message.
    ///
    /// Absolute URLs on the upstream origin count as local.
    pub async fn precache_urls(&self, urls: &[String]) -> PrecacheReport {
        self.run(urls.to_vec(), PrecacheReport::default()).await
    }

    async fn run(&self, urls: Vec<String>, mut report: PrecacheReport) -> PrecacheReport {
        let partition = self.state.partitions.current().media();
        let origin = self.state.upstream.origin().to_string();

        for url in urls {
            let Some(key) = normalize_key(&url, &origin) else {
                report.skipped_remote += 1;
                continue;
            };

            match self.state.cache.contains(&partition, &key).await {
                Ok(true) => {
                    report.already_cached += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(url = %key, error = %e, "Cache lookup failed during precache");
                }
            }

            match self.state.background_get(&key).await {
                Ok(response) if response.is_cacheable() => {
                    if store_response(&self.state, &partition, &key, &response).await {
                        report.fetched += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Ok(response) => {
                    tracing::warn!(url = %key, status = response.status, "Precache fetch rejected");
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::warn!(url = %key, error = %e, "Precache fetch failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            fetched = report.fetched,
            already_cached = report.already_cached,
            skipped_remote = report.skipped_remote,
            failed = report.failed,
            "Precache pass complete"
        );
        report
    }
}
