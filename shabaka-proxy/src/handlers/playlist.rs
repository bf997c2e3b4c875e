//! Playlist: network-first with cache fallback.

use shabaka_core::{InterceptedRequest, PlayerResponse, PlaylistDescription};

use super::{cached_entry, request_key, store_response};
use crate::constants::PLAYLIST_OFFLINE_MESSAGE;
use crate::precache::MediaPrecacher;
use crate::state::ProxyState;

pub async fn handle(state: &ProxyState, request: &InterceptedRequest) -> PlayerResponse {
    let partition = state.partitions.current().api();
    let key = request_key(state, request);

    match state.upstream.send(request).await {
        Ok(response) => {
            if request.is_get() && response.is_success() {
                // The api entry must be current before any precache reads it.
                store_response(state, &partition, &key, &response).await;
                if let Some(playlist) = PlaylistDescription::from_slice(&response.body) {
                    spawn_precache(state, playlist);
                }
            }
            response
        }
        Err(e) => {
            if request.is_get() {
                if let Some(entry) = cached_entry(state, &partition, &key).await {
                    tracing::info!(url = %key, error = %e, "Serving cached playlist");
                    return entry.to_response();
                }
            }
            tracing::warn!(url = %key, error = %e, "Playlist unavailable offline");
            PlayerResponse::offline_error(200, PLAYLIST_OFFLINE_MESSAGE)
        }
    }
}

fn spawn_precache(state: &ProxyState, playlist: PlaylistDescription) {
    let precacher = MediaPrecacher::new(state.clone());
    state.background.spawn("playlist-precache", async move {
        precacher.precache_playlist(&playlist).await;
    });
}
