//! Media: cache-first with background refresh.

use shabaka_core::{InterceptedRequest, PlayerResponse};

use super::{cached_entry, request_key, store_response};
use crate::constants::MEDIA_OFFLINE_MESSAGE;
use crate::state::ProxyState;

pub async fn handle(state: &ProxyState, request: &InterceptedRequest) -> PlayerResponse {
    if !request.is_get() {
        return match state.upstream.send(request).await {
            Ok(response) => response,
            Err(_) => PlayerResponse::offline_error(503, MEDIA_OFFLINE_MESSAGE),
        };
    }

    let partition = state.partitions.current().media();
    let key = request_key(state, request);

    if let Some(entry) = cached_entry(state, &partition, &key).await {
        spawn_refresh(state, request.clone(), partition, key);
        return entry.to_response();
    }

    match state.upstream.send(request).await {
        Ok(response) => {
            store_response(state, &partition, &key, &response).await;
            response
        }
        Err(e) => {
            tracing::debug!(url = %key, error = %e, "Media miss while offline");
            PlayerResponse::offline_error(503, MEDIA_OFFLINE_MESSAGE)
        }
    }
}

/// Re-fetch a served entry and overwrite it on success. Failures are dropped.
fn spawn_refresh(state: &ProxyState, request: InterceptedRequest, partition: String, key: String) {
    let refresh_state = state.clone();
    state.background.spawn("media-refresh", async move {
        match refresh_state.upstream.send(&request).await {
            Ok(response) => {
                store_response(&refresh_state, &partition, &key, &response).await;
            }
            Err(e) => tracing::debug!(url = %key, error = %e, "Media refresh skipped"),
        }
    });
}
