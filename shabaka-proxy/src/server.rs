//! HTTP surface of the proxy.
//!
//! Everything outside `/__offline` is intercepted display traffic and goes
//! through the [`RequestRouter`]. The reserved prefix carries the control
//! protocol, connectivity signals and health, and is never forwarded.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shabaka_core::{is_hop_by_hop, CacheStats, InterceptedRequest, PlayerResponse};
use tokio::sync::mpsc::{self, error::TrySendError};
use tower_http::trace::TraceLayer;

use crate::constants::RESERVED_PREFIX;
use crate::control::{ControlHandle, ControlMessage, ControlReply, SyncSignal};
use crate::error::{ProxyError, ProxyResult};
use crate::router::RequestRouter;
use crate::upstream::ConnectivityTracker;

// ============================================================================
// STATE
// ============================================================================

pub struct AppState {
    pub router: RequestRouter,
    pub control: ControlHandle,
    pub signals: mpsc::Sender<SyncSignal>,
    pub tracker: Arc<ConnectivityTracker>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        router: RequestRouter,
        control: ControlHandle,
        signals: mpsc::Sender<SyncSignal>,
        tracker: Arc<ConnectivityTracker>,
    ) -> Self {
        Self {
            router,
            control,
            signals,
            tracker,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub version: String,
    pub cache_version: String,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_events: Option<u64>,
    pub cache: CacheStats,
    pub uptime_seconds: u64,
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(app: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/__offline/control", post(control))
        .route("/__offline/signal", post(signal))
        .route("/__offline/health", get(health))
        .fallback(intercept)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /__offline/control - Run a control message and return its reply
async fn control(
    State(app): State<Arc<AppState>>,
    body: Bytes,
) -> ProxyResult<Json<ControlReply>> {
    let message: ControlMessage = serde_json::from_slice(&body)?;
    let reply = app.control.send(message).await?;
    Ok(Json(reply))
}

/// POST /__offline/signal - Queue a connectivity signal
async fn signal(State(app): State<Arc<AppState>>, body: Bytes) -> ProxyResult<StatusCode> {
    let signal: SyncSignal = serde_json::from_slice(&body)?;
    match app.signals.try_send(signal) {
        // A full channel already holds a pending drain.
        Ok(()) | Err(TrySendError::Full(_)) => Ok(StatusCode::ACCEPTED),
        Err(TrySendError::Closed(_)) => Err(ProxyError::service_unavailable(
            "Signal listener is not running",
        )),
    }
}

/// GET /__offline/health - Version, connectivity and cache counters
async fn health(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    let state = app.router.state();
    let pending_events = match state.queue.len().await {
        Ok(len) => Some(len),
        Err(e) => {
            tracing::warn!(error = %e, "Queue length unavailable");
            None
        }
    };

    let response = HealthResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache_version: state.partitions.current().version().to_string(),
        online: app.tracker.is_online(),
        pending_events,
        cache: state.cache.stats(),
        uptime_seconds: app.start_time.elapsed().as_secs(),
    };
    (StatusCode::OK, Json(response))
}

/// Every other path: intercepted display traffic.
async fn intercept(
    State(app): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if uri.path().starts_with(RESERVED_PREFIX) {
        return ProxyError::not_found(format!("No endpoint at {}", uri.path())).into_response();
    }

    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let mut request = InterceptedRequest::new(method.as_str(), target).with_body(body.to_vec());
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            request.headers.push((name.as_str().to_string(), value.to_string()));
        }
    }

    let response = app.router.dispatch(request).await;
    into_http(response)
}

fn into_http(response: PlayerResponse) -> Response {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in response.headers.iter().filter(|(n, _)| !is_hop_by_hop(n)) {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(Body::from(response.body)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid response from router");
        StatusCode::BAD_GATEWAY.into_response()
    })
}
