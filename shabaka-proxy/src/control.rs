//! Control message protocol.
//!
//! Administrative requests from the display arrive as [`ControlMessage`]s on
//! an mpsc channel, each carrying a oneshot for its [`ControlReply`].
//! Connectivity signals travel on a separate channel and expect no reply.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shabaka_core::{CacheStatus, ControlError, PlayerResult};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::constants::SYNC_SIGNAL_TAG;
use crate::precache::MediaPrecacher;
use crate::sync::SyncCoordinator;

// ============================================================================
// MESSAGES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    PrecacheMedia {
        #[serde(default)]
        urls: Vec<String>,
    },
    SyncLogs,
    GetCacheStatus,
    ClearOldMedia {
        #[serde(rename = "keepUrls", default)]
        keep_urls: Vec<String>,
    },
}

impl ControlMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::PrecacheMedia { .. } => "PRECACHE_MEDIA",
            ControlMessage::SyncLogs => "SYNC_LOGS",
            ControlMessage::GetCacheStatus => "GET_CACHE_STATUS",
            ControlMessage::ClearOldMedia { .. } => "CLEAR_OLD_MEDIA",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    PrecacheComplete { urls: Vec<String> },
    SyncComplete,
    CacheStatus { status: CacheStatus },
    ClearComplete,
}

/// Connectivity signal; only the `sync-logs` tag has an effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSignal {
    pub tag: String,
}

impl SyncSignal {
    pub fn sync_logs() -> Self {
        Self {
            tag: SYNC_SIGNAL_TAG.to_string(),
        }
    }

    pub fn is_sync_logs(&self) -> bool {
        self.tag == SYNC_SIGNAL_TAG
    }
}

pub fn signal_channel(capacity: usize) -> (mpsc::Sender<SyncSignal>, mpsc::Receiver<SyncSignal>) {
    mpsc::channel(capacity)
}

// ============================================================================
// CHANNEL
// ============================================================================

#[derive(Debug)]
pub struct ControlRequest {
    pub message: ControlMessage,
    pub reply: oneshot::Sender<ControlReply>,
}

/// Sending side of the control channel.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlRequest>,
}

impl ControlHandle {
    pub async fn send(&self, message: ControlMessage) -> PlayerResult<ControlReply> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControlRequest { message, reply })
            .await
            .map_err(|_| ControlError::ServiceStopped)?;
        rx.await.map_err(|_| ControlError::ServiceStopped.into())
    }
}

// ============================================================================
// SERVICE
// ============================================================================

#[derive(Clone)]
pub struct ControlService {
    coordinator: Arc<SyncCoordinator>,
    precacher: MediaPrecacher,
}

impl ControlService {
    pub fn new(coordinator: Arc<SyncCoordinator>, precacher: MediaPrecacher) -> Self {
        Self {
            coordinator,
            precacher,
        }
    }

    /// Run one message to completion.
    ///
    /// Failures are logged and the normal reply is still produced; the
    /// display treats every reply as an acknowledgment.
    pub async fn handle(&self, message: ControlMessage) -> ControlReply {
        let kind = message.kind();
        tracing::debug!(kind, "Control message received");

        match message {
            ControlMessage::PrecacheMedia { urls } => {
                self.precacher.precache_urls(&urls).await;
                ControlReply::PrecacheComplete { urls }
            }
            ControlMessage::SyncLogs => {
                if let Err(e) = self.coordinator.drain().await {
                    tracing::error!(kind, error = %e, "Drain failed");
                }
                ControlReply::SyncComplete
            }
            ControlMessage::GetCacheStatus => {
                let status = self.coordinator.cache_status().await.unwrap_or_else(|e| {
                    tracing::error!(kind, error = %e, "Cache status failed");
                    CacheStatus::default()
                });
                ControlReply::CacheStatus { status }
            }
            ControlMessage::ClearOldMedia { keep_urls } => {
                if let Err(e) = self.coordinator.evict_media(&keep_urls).await {
                    tracing::error!(kind, error = %e, "Media eviction failed");
                }
                ControlReply::ClearComplete
            }
        }
    }

    /// Serve the control channel until shutdown.
    ///
    /// Each request runs in its own task so a long precache does not block
    /// a status query.
    pub fn spawn(
        self,
        capacity: usize,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> (ControlHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<ControlRequest>(capacity);
        let handle = tokio::spawn(async move {
            tracing::info!("Control service started");
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    request = rx.recv() => {
                        let Some(ControlRequest { message, reply }) = request else {
                            break;
                        };
                        let service = self.clone();
                        tokio::spawn(async move {
                            let answer = service.handle(message).await;
                            if reply.send(answer).is_err() {
                                tracing::debug!("Control requester went away");
                            }
                        });
                    }
                }
            }
            tracing::info!("Control service stopped");
        });
        (ControlHandle { tx }, handle)
    }
}

/// Turn `sync-logs` signals into drains until shutdown.
pub async fn signal_listener_task(
    coordinator: Arc<SyncCoordinator>,
    mut signals: mpsc::Receiver<SyncSignal>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            signal = signals.recv() => {
                let Some(signal) = signal else { break };
                if !signal.is_sync_logs() {
                    tracing::debug!(tag = %signal.tag, "Ignoring signal");
                    continue;
                }
                if let Err(e) = coordinator.drain().await {
                    tracing::error!(error = %e, "Signalled drain failed");
                }
            }
        }
    }
    tracing::info!("Signal listener stopped");
}
