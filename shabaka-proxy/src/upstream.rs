//! Upstream player server client and connectivity tracking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use shabaka_core::{
    is_hop_by_hop, InterceptedRequest, PlayerResponse, PlayerResult, Upstream, UpstreamError,
};
use tokio::sync::mpsc;

use crate::control::SyncSignal;

// ============================================================================
// HTTP UPSTREAM
// ============================================================================

/// [`Upstream`] backed by a reqwest client.
///
/// Redirects are not followed so the display sees the server's own answer.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    origin: String,
}

impl HttpUpstream {
    pub fn new(origin: impl Into<String>, timeout: Option<Duration>) -> PlayerResult<Self> {
        let origin = origin.into().trim_end_matches('/').to_string();
        let mut builder = reqwest::Client::builder().redirect(Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| UpstreamError::InvalidRequest {
            url: origin.clone(),
            reason: format!("Failed to build HTTP client: {}", e),
        })?;
        Ok(Self { client, origin })
    }

    fn url_for(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else if target.starts_with('/') {
            format!("{}{}", self.origin, target)
        } else {
            format!("{}/{}", self.origin, target)
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: &InterceptedRequest) -> Result<PlayerResponse, UpstreamError> {
        let url = self.url_for(&request.target);
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            UpstreamError::InvalidRequest {
                url: url.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut builder = self.client.request(method, &url);
        for (name, value) in request.headers.iter().filter(|(n, _)| !is_hop_by_hop(n)) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::TimedOut { url: url.clone() }
            } else if e.is_builder() {
                UpstreamError::InvalidRequest {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            } else {
                UpstreamError::Unreachable {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::TimedOut { url: url.clone() }
                } else {
                    UpstreamError::BodyRead {
                        url: url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?
            .to_vec();

        Ok(PlayerResponse::from_network(status, headers, body))
    }

    fn origin(&self) -> &str {
        &self.origin
    }
}

// ============================================================================
// CONNECTIVITY
// ============================================================================

/// Tracks whether the last upstream exchange succeeded.
///
/// An offline to online transition emits a `sync-logs` signal so queued
/// telemetry drains as soon as the server is reachable again.
#[derive(Debug)]
pub struct ConnectivityTracker {
    online: AtomicBool,
    signals: Option<mpsc::Sender<SyncSignal>>,
}

impl ConnectivityTracker {
    pub fn new(signals: Option<mpsc::Sender<SyncSignal>>) -> Self {
        Self {
            online: AtomicBool::new(true),
            signals,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn record_success(&self) {
        let was_online = self.online.swap(true, Ordering::SeqCst);
        if was_online {
            return;
        }
        tracing::info!("Upstream reachable again");
        if let Some(signals) = &self.signals {
            // Full channel means a drain is already pending.
            if signals.try_send(SyncSignal::sync_logs()).is_err() {
                tracing::debug!("Sync signal already pending");
            }
        }
    }

    pub fn record_failure(&self, error: &UpstreamError) {
        let was_online = self.online.swap(false, Ordering::SeqCst);
        if was_online {
            tracing::warn!(error = %error, "Upstream unreachable, serving offline");
        } else {
            tracing::debug!(error = %error, "Upstream still unreachable");
        }
    }
}

/// Wraps an [`Upstream`] and reports every exchange to a tracker.
pub struct ObservedUpstream {
    inner: Arc<dyn Upstream>,
    tracker: Arc<ConnectivityTracker>,
}

impl ObservedUpstream {
    pub fn new(inner: Arc<dyn Upstream>, tracker: Arc<ConnectivityTracker>) -> Self {
        Self { inner, tracker }
    }
}

#[async_trait]
impl Upstream for ObservedUpstream {
    async fn send(&self, request: &InterceptedRequest) -> Result<PlayerResponse, UpstreamError> {
        let result = self.inner.send(request).await;
        match &result {
            Ok(_) => self.tracker.record_success(),
            Err(e) => self.tracker.record_failure(e),
        }
        result
    }

    fn origin(&self) -> &str {
        self.inner.origin()
    }
}
