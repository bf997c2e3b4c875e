//! Request classification and dispatch.

use shabaka_core::{InterceptedRequest, PlayerResponse, SOURCE_HEADER};

use crate::constants::{HEARTBEAT_MARKER, LOG_PLAY_PATH, MEDIA_MARKER, PLAYLIST_MARKER};
use crate::handlers;
use crate::state::ProxyState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryKind {
    Heartbeat,
    PlayLog,
}

/// Handling strategy of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Media,
    Playlist,
    Telemetry(TelemetryKind),
    Shell,
}

impl RouteKind {
    /// Classify by literal substring, first match wins:
    /// media, then playlist, then telemetry, then shell.
    pub fn classify(target: &str) -> Self {
        if target.contains(MEDIA_MARKER) {
            RouteKind::Media
        } else if target.contains(PLAYLIST_MARKER) {
            RouteKind::Playlist
        } else if target.contains(HEARTBEAT_MARKER) {
            RouteKind::Telemetry(TelemetryKind::Heartbeat)
        } else if target.contains(LOG_PLAY_PATH) {
            RouteKind::Telemetry(TelemetryKind::PlayLog)
        } else {
            RouteKind::Shell
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::Media => "media",
            RouteKind::Playlist => "playlist",
            RouteKind::Telemetry(TelemetryKind::Heartbeat) => "heartbeat",
            RouteKind::Telemetry(TelemetryKind::PlayLog) => "log-play",
            RouteKind::Shell => "shell",
        }
    }
}

/// Entry point for every intercepted display request.
#[derive(Clone)]
pub struct RequestRouter {
    state: ProxyState,
}

impl RequestRouter {
    pub fn new(state: ProxyState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ProxyState {
        &self.state
    }

    pub async fn dispatch(&self, request: InterceptedRequest) -> PlayerResponse {
        self.state.session.observe(&request);

        let route = RouteKind::classify(&request.target);
        let mut response = match route {
            RouteKind::Media => handlers::media::handle(&self.state, &request).await,
            RouteKind::Playlist => handlers::playlist::handle(&self.state, &request).await,
            RouteKind::Telemetry(kind) => {
                handlers::telemetry::handle(&self.state, kind, &request).await
            }
            RouteKind::Shell => handlers::shell::handle(&self.state, &request).await,
        };

        response.headers.retain(|(name, _)| !name.eq_ignore_ascii_case(SOURCE_HEADER));
        response
            .headers
            .push((SOURCE_HEADER.to_string(), response.source.as_str().to_string()));

        tracing::debug!(
            method = %request.method,
            url = %request.target,
            route = route.as_str(),
            status = response.status,
            source = response.source.as_str(),
            "Request dispatched"
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shabaka_test_utils::fixtures::{frozen_queue, memory_cache, test_config};
    use shabaka_test_utils::generators::{arb_local_media_url, arb_remote_url};
    use shabaka_test_utils::MockUpstream;
    use std::sync::Arc;

    #[test]
    fn test_classification_precedence() {
        assert_eq!(RouteKind::classify("/static/uploads/a.mp4"), RouteKind::Media);
        assert_eq!(
            RouteKind::classify("/player/api/playlist?screen=3"),
            RouteKind::Playlist
        );
        assert_eq!(
            RouteKind::classify("/player/api/heartbeat"),
            RouteKind::Telemetry(TelemetryKind::Heartbeat)
        );
        assert_eq!(
            RouteKind::classify("/player/api/log-play"),
            RouteKind::Telemetry(TelemetryKind::PlayLog)
        );
        assert_eq!(RouteKind::classify("/player/display"), RouteKind::Shell);
        // Media wins even when another marker also appears.
        assert_eq!(
            RouteKind::classify("/static/uploads/player/api/playlist.json"),
            RouteKind::Media
        );
    }

    proptest! {
        #[test]
        fn prop_uploads_always_media(url in arb_local_media_url()) {
            prop_assert_eq!(RouteKind::classify(&url), RouteKind::Media);
        }

        #[test]
        fn prop_unmarked_urls_fall_to_shell(url in arb_remote_url()) {
            prop_assert_eq!(RouteKind::classify(&url), RouteKind::Shell);
        }
    }

    #[tokio::test]
    async fn test_dispatch_stamps_source_header() {
        let mock = Arc::new(MockUpstream::new());
        mock.set_offline(true);
        let router = RequestRouter::new(ProxyState::new(
            memory_cache(),
            frozen_queue(10),
            mock,
            test_config(),
        ));

        let response = router
            .dispatch(InterceptedRequest::get("/static/uploads/a.mp4"))
            .await;
        assert_eq!(response.header(SOURCE_HEADER), Some("synthetic"));
    }
}
