//! Connectivity Probe Background Task
//!
//! While the upstream is marked offline, fetch a small shell asset every
//! `interval`. The probe goes through the observed upstream, so the first
//! successful probe flips the tracker back online and emits the `sync-logs`
//! signal that drains the queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shabaka_core::OfflineConfig;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::state::ProxyState;
use crate::upstream::ConnectivityTracker;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Time between probes (default: 30 seconds)
    pub interval: Duration,

    /// Path requested from the upstream (default: the player favicon)
    pub path: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::from_offline(&OfflineConfig::default())
    }
}

impl ProbeConfig {
    pub fn from_offline(config: &OfflineConfig) -> Self {
        Self {
            interval: config.probe_interval,
            path: config.probe_path.clone(),
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct ProbeMetrics {
    /// Probes sent while offline
    pub probes_sent: AtomicU64,

    /// Probes that got any response
    pub probes_succeeded: AtomicU64,

    /// Ticks skipped because the upstream was already online
    pub ticks_skipped: AtomicU64,
}

impl ProbeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProbeSnapshot {
        ProbeSnapshot {
            probes_sent: self.probes_sent.load(Ordering::Relaxed),
            probes_succeeded: self.probes_succeeded.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSnapshot {
    pub probes_sent: u64,
    pub probes_succeeded: u64,
    pub ticks_skipped: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Probe the upstream while offline until shutdown.
///
/// `state.upstream` must be the observed upstream reporting to `tracker`.
pub async fn connectivity_probe_task(
    state: ProxyState,
    tracker: Arc<ConnectivityTracker>,
    config: ProbeConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ProbeMetrics> {
    let metrics = Arc::new(ProbeMetrics::new());

    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        path = %config.path,
        "Connectivity probe started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Connectivity probe shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                probe_once(&state, &tracker, &config, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        probes_sent = snapshot.probes_sent,
        probes_succeeded = snapshot.probes_succeeded,
        ticks_skipped = snapshot.ticks_skipped,
        "Connectivity probe completed"
    );

    metrics
}

async fn probe_once(
    state: &ProxyState,
    tracker: &ConnectivityTracker,
    config: &ProbeConfig,
    metrics: &ProbeMetrics,
) {
    if tracker.is_online() {
        metrics.ticks_skipped.fetch_add(1, Ordering::Relaxed);
        return;
    }

    metrics.probes_sent.fetch_add(1, Ordering::Relaxed);
    match state.background_get(&config.path).await {
        Ok(response) => {
            metrics.probes_succeeded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(status = response.status, "Connectivity probe answered");
        }
        Err(e) => tracing::debug!(error = %e, "Connectivity probe failed"),
    }
}
