//! Shared wiring for proxy integration tests.
//!
//! Builds the same component graph as the runtime, but over a scripted
//! upstream and in-memory stores.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use shabaka_core::{OfflineConfig, Upstream};
use shabaka_proxy::{
    create_router, signal_channel, AppState, ConnectivityTracker, ControlService,
    LifecycleManager, MediaPrecacher, ObservedUpstream, ProxyState, RequestRouter,
    SyncCoordinator, SyncSignal,
};
use shabaka_storage::{CacheStore, EventQueue};
use shabaka_test_utils::fixtures::{frozen_queue, memory_cache, test_config, upstream_with_shell};
use shabaka_test_utils::MockUpstream;
use tokio::sync::{mpsc, watch};

pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub struct Harness {
    pub mock: Arc<MockUpstream>,
    pub state: ProxyState,
    pub router: RequestRouter,
    pub coordinator: Arc<SyncCoordinator>,
    pub lifecycle: LifecycleManager,
    pub tracker: Arc<ConnectivityTracker>,
    pub signals: mpsc::Receiver<SyncSignal>,
    signal_tx: mpsc::Sender<SyncSignal>,
}

impl Harness {
    /// Harness over in-memory stores and an upstream serving the shell.
    pub fn new() -> Self {
        let config = test_config();
        Self::with_stores(
            Arc::new(upstream_with_shell(&config)),
            memory_cache(),
            frozen_queue(config.max_pending_events),
            config,
        )
    }

    pub fn with_stores(
        mock: Arc<MockUpstream>,
        cache: Arc<dyn CacheStore>,
        queue: Arc<dyn EventQueue>,
        config: OfflineConfig,
    ) -> Self {
        let (signal_tx, signals) = signal_channel(4);
        let tracker = Arc::new(ConnectivityTracker::new(Some(signal_tx.clone())));
        let upstream: Arc<dyn Upstream> =
            Arc::new(ObservedUpstream::new(mock.clone(), tracker.clone()));
        let state = ProxyState::new(cache, queue, upstream, config);

        Self {
            mock,
            router: RequestRouter::new(state.clone()),
            coordinator: Arc::new(SyncCoordinator::new(state.clone())),
            lifecycle: LifecycleManager::new(state.clone()),
            state,
            tracker,
            signals,
            signal_tx,
        }
    }

    /// Axum app over this harness with a running control service.
    ///
    /// Keep the returned sender alive for as long as the app is used.
    pub fn app(&self) -> (Router, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let service = ControlService::new(
            self.coordinator.clone(),
            MediaPrecacher::new(self.state.clone()),
        );
        let (control, _task) = service.spawn(8, shutdown_rx);
        let app_state = Arc::new(AppState::new(
            self.router.clone(),
            control,
            self.signal_tx.clone(),
            self.tracker.clone(),
        ));
        (create_router(app_state, MAX_BODY_BYTES), shutdown_tx)
    }

    pub fn media(&self) -> String {
        self.state.partitions.current().media()
    }

    pub fn api(&self) -> String {
        self.state.partitions.current().api()
    }

    pub async fn settle(&self) {
        self.state.background.wait_idle().await;
    }
}
