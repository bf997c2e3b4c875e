//! Handling strategies for intercepted requests.
//!
//! One module per [`RouteKind`](crate::router::RouteKind). Each handler
//! always produces a response: upstream, cached, or synthetic.

pub mod media;
pub mod playlist;
pub mod shell;
pub mod telemetry;

use shabaka_core::{normalize_key, CacheEntry, InterceptedRequest, PlayerResponse};

use crate::state::ProxyState;

/// Cache key of an intercepted request.
pub(crate) fn request_key(state: &ProxyState, request: &InterceptedRequest) -> String {
    normalize_key(&request.target, state.upstream.origin())
        .unwrap_or_else(|| request.target.clone())
}

/// Look up `key`, treating a storage failure as a miss.
pub(crate) async fn cached_entry(
    state: &ProxyState,
    partition: &str,
    key: &str,
) -> Option<CacheEntry> {
    match state.cache.get(partition, key).await {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!(partition, url = %key, error = %e, "Cache read failed, treating as miss");
            None
        }
    }
}

/// Store a complete 200 response. Returns whether it was written.
pub(crate) async fn store_response(
    state: &ProxyState,
    partition: &str,
    key: &str,
    response: &PlayerResponse,
) -> bool {
    if !response.is_cacheable() {
        return false;
    }
    let entry = CacheEntry::from_response(key, response);
    match state.cache.put(partition, &entry).await {
        Ok(()) => {
            tracing::debug!(partition, url = %key, bytes = entry.size_bytes(), "Cached response");
            true
        }
        Err(e) => {
            tracing::warn!(partition, url = %key, error = %e, "Cache write failed");
            false
        }
    }
}
