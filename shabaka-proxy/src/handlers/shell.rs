//! Shell: installed assets first, then the network.
//!
//! The shell partition is written only by the lifecycle install, so a
//! version's assets never change while it is active.

use shabaka_core::{InterceptedRequest, PlayerResponse};

use super::{cached_entry, request_key};
use crate::constants::SHELL_OFFLINE_MESSAGE;
use crate::state::ProxyState;

pub async fn handle(state: &ProxyState, request: &InterceptedRequest) -> PlayerResponse {
    if request.is_get() {
        let partition = state.partitions.current().shell();
        let key = request_key(state, request);
        if let Some(entry) = cached_entry(state, &partition, &key).await {
            return entry.to_response();
        }
    }

    match state.upstream.send(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(target_url = %request.target, error = %e, "Shell request failed offline");
            PlayerResponse::offline_error(503, SHELL_OFFLINE_MESSAGE)
        }
    }
}
