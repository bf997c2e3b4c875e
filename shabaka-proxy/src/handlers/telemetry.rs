//! Telemetry: deliver now, or queue play logs for later.
//!
//! Heartbeats are only meaningful when fresh, so a failed heartbeat is
//! acknowledged and dropped. Play logs are queued and acknowledged as queued
//! so the display never retries and duplicates them.

use shabaka_core::{InterceptedRequest, PlayerResponse};

use crate::constants::{INVALID_PLAY_LOG_MESSAGE, QUEUE_FAILED_MESSAGE};
use crate::router::TelemetryKind;
use crate::state::ProxyState;

pub async fn handle(
    state: &ProxyState,
    kind: TelemetryKind,
    request: &InterceptedRequest,
) -> PlayerResponse {
    let error = match state.upstream.send(request).await {
        Ok(response) => return response,
        Err(e) => e,
    };

    match kind {
        TelemetryKind::Heartbeat => {
            tracing::debug!(error = %error, "Heartbeat dropped while offline");
            PlayerResponse::offline()
        }
        TelemetryKind::PlayLog => queue_play_log(state, request).await,
    }
}

async fn queue_play_log(state: &ProxyState, request: &InterceptedRequest) -> PlayerResponse {
    let Some(payload) = request.json_body() else {
        tracing::warn!(
            bytes = request.body.len(),
            "Play log body is not JSON, not queued"
        );
        return PlayerResponse::offline_error(200, INVALID_PLAY_LOG_MESSAGE);
    };

    match state.queue.enqueue(payload).await {
        Ok(enqueued) => {
            if enqueued.evicted > 0 {
                tracing::warn!(
                    evicted = enqueued.evicted,
                    "Queue full, oldest play logs dropped"
                );
            }
            tracing::info!(
                timestamp = %enqueued.event.timestamp,
                evicted = enqueued.evicted,
                "Play log queued for later delivery"
            );
            PlayerResponse::queued_offline()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to queue play log");
            PlayerResponse::offline_error(200, QUEUE_FAILED_MESSAGE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shabaka_test_utils::fixtures::{frozen_queue, heartbeat, memory_cache, play_log, test_config};
    use shabaka_test_utils::{EventQueue, MockReply, MockUpstream};
    use std::sync::Arc;

    const HEARTBEAT: &str = "/player/api/heartbeat";
    const LOG_PLAY: &str = "/player/api/log-play";

    fn offline_state() -> ProxyState {
        let mock = Arc::new(MockUpstream::new());
        mock.set_offline(true);
        ProxyState::new(memory_cache(), frozen_queue(10), mock, test_config())
    }

    #[tokio::test]
    async fn test_heartbeat_failure_is_not_queued() {
        let state = offline_state();
        let request = InterceptedRequest::post_json(HEARTBEAT, &heartbeat());

        let response = handle(&state, TelemetryKind::Heartbeat, &request).await;
        assert_eq!(response.json_body(), Some(json!({"offline": true})));
        assert_eq!(state.queue.len().await.expect("len"), 0);
    }

    #[tokio::test]
    async fn test_play_log_failures_get_distinct_keys() {
        let state = offline_state();
        for id in [1, 2] {
            let request = InterceptedRequest::post_json(LOG_PLAY, &play_log(id));
            let response = handle(&state, TelemetryKind::PlayLog, &request).await;
            assert_eq!(
                response.json_body(),
                Some(json!({"queued": true, "offline": true}))
            );
        }

        let events = state.queue.peek_batch(10).await.expect("peek");
        assert_eq!(events.len(), 2);
        assert!(events[0].timestamp < events[1].timestamp);
        assert_eq!(events[0].payload, play_log(1));
    }

    #[tokio::test]
    async fn test_invalid_play_log_body_not_queued() {
        let state = offline_state();
        let request = InterceptedRequest::new("POST", LOG_PLAY).with_body("not json");

        let response = handle(&state, TelemetryKind::PlayLog, &request).await;
        assert!(response.is_offline());
        assert_eq!(state.queue.len().await.expect("len"), 0);
    }

    #[tokio::test]
    async fn test_upstream_error_status_passes_through() {
        let mock = Arc::new(MockUpstream::new());
        mock.route(LOG_PLAY, MockReply::status(500));
        let state = ProxyState::new(memory_cache(), frozen_queue(10), mock, test_config());

        let request = InterceptedRequest::post_json(LOG_PLAY, &play_log(3));
        let response = handle(&state, TelemetryKind::PlayLog, &request).await;
        assert_eq!(response.status, 500);
        assert_eq!(state.queue.len().await.expect("len"), 0);
    }
}
