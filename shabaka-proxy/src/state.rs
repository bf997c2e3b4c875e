//! Shared state handed to every component of the proxy.

use std::sync::{Arc, RwLock};

use shabaka_core::{
    InterceptedRequest, OfflineConfig, PartitionSet, PlayerResponse, Upstream, UpstreamError,
};
use shabaka_storage::{CacheStore, EventQueue};

use crate::background::BackgroundTasks;
use crate::session::SessionHeaders;

/// The partition set currently serving traffic.
///
/// Starts at the configured version and changes only when the lifecycle
/// manager activates or falls back to another version.
#[derive(Debug, Clone)]
pub struct ActivePartitions(Arc<RwLock<PartitionSet>>);

impl ActivePartitions {
    pub fn new(set: PartitionSet) -> Self {
        Self(Arc::new(RwLock::new(set)))
    }

    pub fn current(&self) -> PartitionSet {
        self.0
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn replace(&self, set: PartitionSet) {
        *self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = set;
    }
}

#[derive(Clone)]
pub struct ProxyState {
    pub cache: Arc<dyn CacheStore>,
    pub queue: Arc<dyn EventQueue>,
    pub upstream: Arc<dyn Upstream>,
    pub partitions: ActivePartitions,
    pub session: Arc<SessionHeaders>,
    pub background: BackgroundTasks,
    pub config: Arc<OfflineConfig>,
}

impl ProxyState {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        queue: Arc<dyn EventQueue>,
        upstream: Arc<dyn Upstream>,
        config: OfflineConfig,
    ) -> Self {
        Self {
            cache,
            queue,
            upstream,
            partitions: ActivePartitions::new(config.partitions()),
            session: Arc::new(SessionHeaders::new()),
            background: BackgroundTasks::new(),
            config: Arc::new(config),
        }
    }

    /// GET `target` upstream carrying the display's session credentials.
    pub async fn background_get(&self, target: &str) -> Result<PlayerResponse, UpstreamError> {
        let request = self.session.apply(InterceptedRequest::get(target));
        self.upstream.send(&request).await
    }
}
