//! Install Retry Background Task
//!
//! Started only when bootstrap fell back to an older version. Retries the
//! install of the configured version every `interval`; on the first success
//! it activates that version (dropping the old partitions) and exits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shabaka_core::{OfflineConfig, PartitionSet};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::lifecycle::LifecycleManager;

#[derive(Debug, Clone)]
pub struct InstallRetryConfig {
    /// Time between attempts (default: 60 seconds)
    pub interval: Duration,

    /// Version being installed
    pub target: PartitionSet,
}

impl Default for InstallRetryConfig {
    fn default() -> Self {
        Self::from_offline(&OfflineConfig::default())
    }
}

impl InstallRetryConfig {
    pub fn from_offline(config: &OfflineConfig) -> Self {
        Self {
            interval: config.install_retry_interval,
            target: config.partitions(),
        }
    }
}

#[derive(Debug, Default)]
pub struct InstallRetryMetrics {
    pub attempts: AtomicU64,
    pub failures: AtomicU64,
    /// 1 once the target version is active
    pub installed: AtomicU64,
}

impl InstallRetryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> InstallRetrySnapshot {
        InstallRetrySnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            installed: self.installed.load(Ordering::Relaxed) > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRetrySnapshot {
    pub attempts: u64,
    pub failures: u64,
    pub installed: bool,
}

pub async fn install_retry_task(
    lifecycle: LifecycleManager,
    config: InstallRetryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<InstallRetryMetrics> {
    let metrics = Arc::new(InstallRetryMetrics::new());

    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        version = config.target.version(),
        "Install retry task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Install retry task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                if attempt(&lifecycle, &config, &metrics).await {
                    break;
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        attempts = snapshot.attempts,
        failures = snapshot.failures,
        installed = snapshot.installed,
        "Install retry task completed"
    );

    metrics
}

/// One install attempt. Returns whether the version is now active.
async fn attempt(
    lifecycle: &LifecycleManager,
    config: &InstallRetryConfig,
    metrics: &InstallRetryMetrics,
) -> bool {
    metrics.attempts.fetch_add(1, Ordering::Relaxed);

    let result = match lifecycle.install(&config.target).await {
        Ok(_) => lifecycle.activate(config.target.clone()).await.map(|_| ()),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            metrics.installed.store(1, Ordering::Relaxed);
            true
        }
        Err(e) => {
            metrics.failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(version = config.target.version(), error = %e, "Install retry failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ProxyState;
    use shabaka_test_utils::fixtures::{
        cached, frozen_queue, memory_cache, test_config, upstream_with_shell,
    };
    use shabaka_test_utils::{CacheStore, MockReply};

    #[tokio::test]
    async fn test_retry_installs_once_asset_returns() {
        let config = test_config();
        let mock = Arc::new(upstream_with_shell(&config));
        mock.script(
            "/static/js/hls.min.js",
            vec![MockReply::status(502), MockReply::ok("hls")],
        );
        let state = ProxyState::new(memory_cache(), frozen_queue(10), mock, config.clone());
        state
            .cache
            .put("shabaka-media-v0", &cached("/static/uploads/old.mp4", b"old"))
            .await
            .expect("seed should succeed");
        state.partitions.replace(PartitionSet::new("v0"));

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let retry = InstallRetryConfig {
            interval: Duration::from_millis(5),
            target: config.partitions(),
        };
        let metrics = install_retry_task(LifecycleManager::new(state.clone()), retry, shutdown_rx).await;

        let snapshot = metrics.snapshot();
        assert!(snapshot.installed);
        assert_eq!(snapshot.attempts, 2);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(state.partitions.current().version(), "v1");
        assert!(!state
            .cache
            .has_partition("shabaka-media-v0")
            .await
            .expect("has_partition"));
    }
}
