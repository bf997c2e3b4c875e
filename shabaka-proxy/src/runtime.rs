//! Process wiring: open stores, bootstrap the version, start services, serve.

use std::sync::Arc;

use shabaka_core::{PlayerError, TimestampSequencer, Upstream};
use shabaka_storage::{LmdbCacheStore, LmdbEventQueue};
use tokio::sync::watch;

use crate::config::ProxyConfig;
use crate::constants::{CONTROL_CHANNEL_CAPACITY, SIGNAL_CHANNEL_CAPACITY};
use crate::control::{signal_channel, signal_listener_task, ControlService, SyncSignal};
use crate::error::{ProxyError, ProxyResult};
use crate::jobs::{connectivity_probe_task, install_retry_task, InstallRetryConfig, ProbeConfig};
use crate::lifecycle::LifecycleManager;
use crate::precache::MediaPrecacher;
use crate::router::RequestRouter;
use crate::server::{create_router, AppState};
use crate::state::ProxyState;
use crate::sync::SyncCoordinator;
use crate::upstream::{ConnectivityTracker, HttpUpstream, ObservedUpstream};

/// Run the proxy until ctrl-c or a server error.
pub async fn run(config: ProxyConfig) -> ProxyResult<()> {
    config.validate()?;
    let addr = config.bind_addr()?;

    let cache = LmdbCacheStore::open(config.cache_dir(), config.cache_max_size_mb)
        .map_err(PlayerError::from)?;
    let queue = LmdbEventQueue::open(
        config.queue_dir(),
        config.queue_max_size_mb,
        config.offline.max_pending_events,
        TimestampSequencer::system(),
    )
    .map_err(PlayerError::from)?;

    let (signal_tx, signal_rx) = signal_channel(SIGNAL_CHANNEL_CAPACITY);
    let tracker = Arc::new(ConnectivityTracker::new(Some(signal_tx.clone())));
    let http = HttpUpstream::new(config.upstream_url.clone(), config.upstream_timeout)?;
    let upstream: Arc<dyn Upstream> =
        Arc::new(ObservedUpstream::new(Arc::new(http), tracker.clone()));

    let state = ProxyState::new(
        Arc::new(cache),
        Arc::new(queue),
        upstream,
        config.offline.clone(),
    );

    let lifecycle = LifecycleManager::new(state.clone());
    let outcome = lifecycle.bootstrap().await?;
    tracing::info!(outcome = ?outcome, "Bootstrap finished");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let coordinator = Arc::new(SyncCoordinator::new(state.clone()));
    let control_service =
        ControlService::new(coordinator.clone(), MediaPrecacher::new(state.clone()));
    let (control, _control_task) =
        control_service.spawn(CONTROL_CHANNEL_CAPACITY, shutdown_rx.clone());

    tokio::spawn(signal_listener_task(
        coordinator,
        signal_rx,
        shutdown_rx.clone(),
    ));
    tokio::spawn(connectivity_probe_task(
        state.clone(),
        tracker.clone(),
        ProbeConfig::from_offline(&config.offline),
        shutdown_rx.clone(),
    ));
    if outcome.needs_retry() {
        tokio::spawn(install_retry_task(
            lifecycle,
            InstallRetryConfig::from_offline(&config.offline),
            shutdown_rx.clone(),
        ));
    }

    // Deliver whatever a previous run left queued.
    if signal_tx.try_send(SyncSignal::sync_logs()).is_err() {
        tracing::debug!("Startup sync signal dropped");
    }

    let app_state = Arc::new(AppState::new(
        RequestRouter::new(state.clone()),
        control,
        signal_tx,
        tracker,
    ));
    let app = create_router(app_state, config.max_body_bytes);

    tracing::info!(%addr, upstream = %config.upstream_url, "Starting Shabaka offline proxy");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ProxyError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    let result = tokio::select! {
        result = server => {
            result.map_err(|e| ProxyError::internal_error(format!("Server error: {}", e)))
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    };

    let _ = shutdown_tx.send(true);
    state.background.abort_all();
    result
}
