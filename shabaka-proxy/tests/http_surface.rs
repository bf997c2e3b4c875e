//! HTTP surface tests: reserved endpoints and intercepted traffic.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
};
use serde_json::{json, Value};
use shabaka_core::SOURCE_HEADER;
use shabaka_storage::{CacheStore, EventQueue};
use shabaka_test_utils::fixtures::{cached, play_log};
use shabaka_test_utils::MockReply;
use tower::ServiceExt;

#[path = "support/harness.rs"]
mod harness;
use harness::{Harness, MAX_BODY_BYTES};

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), MAX_BODY_BYTES)
        .await
        .expect("body should read");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

// ============================================================================
// CONTROL ENDPOINT
// ============================================================================

#[tokio::test]
async fn test_control_cache_status_reports_media() {
    let h = Harness::new();
    h.state
        .cache
        .put(&h.media(), &cached("/static/uploads/a.mp4", &[0u8; 2048]))
        .await
        .expect("seed should succeed");
    let (app, _shutdown) = h.app();

    let response = app
        .oneshot(post_json(
            "/__offline/control",
            &json!({"type": "GET_CACHE_STATUS"}),
        ))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["type"], "CACHE_STATUS");
    assert_eq!(body["status"]["mediaCount"], 1);
    assert_eq!(body["status"]["totalSize"], 2048);
    assert_eq!(body["status"]["cachedUrls"], json!(["/static/uploads/a.mp4"]));
}

#[tokio::test]
async fn test_control_precache_and_clear() {
    let h = Harness::new();
    h.mock.route("/static/uploads/a.mp4", MockReply::ok("a"));
    h.mock.route("/static/uploads/b.mp4", MockReply::ok("b"));
    let (app, _shutdown) = h.app();

    let urls = json!(["/static/uploads/a.mp4", "/static/uploads/b.mp4"]);
    let response = app
        .clone()
        .oneshot(post_json(
            "/__offline/control",
            &json!({"type": "PRECACHE_MEDIA", "urls": urls}),
        ))
        .await
        .expect("request should complete");
    let body = json_body(response).await;
    assert_eq!(body, json!({"type": "PRECACHE_COMPLETE", "urls": urls}));
    assert_eq!(h.state.cache.list(&h.media()).await.expect("list").len(), 2);

    let response = app
        .oneshot(post_json(
            "/__offline/control",
            &json!({"type": "CLEAR_OLD_MEDIA", "keepUrls": ["/static/uploads/b.mp4"]}),
        ))
        .await
        .expect("request should complete");
    assert_eq!(json_body(response).await, json!({"type": "CLEAR_COMPLETE"}));

    let remaining = h.state.cache.list(&h.media()).await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].key, "/static/uploads/b.mp4");
}

#[tokio::test]
async fn test_control_sync_logs_drains_queue() {
    let h = Harness::new();
    h.mock.route("/player/api/log-play", MockReply::status(200));
    h.state.queue.enqueue(play_log(7)).await.expect("enqueue");
    let (app, _shutdown) = h.app();

    let response = app
        .oneshot(post_json("/__offline/control", &json!({"type": "SYNC_LOGS"})))
        .await
        .expect("request should complete");
    assert_eq!(json_body(response).await, json!({"type": "SYNC_COMPLETE"}));
    assert!(h.state.queue.is_empty().await.expect("is_empty"));
}

#[tokio::test]
async fn test_control_rejects_unknown_type() {
    let h = Harness::new();
    let (app, _shutdown) = h.app();

    let response = app
        .oneshot(post_json("/__offline/control", &json!({"type": "REBOOT"})))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "INVALID_INPUT");
}

// ============================================================================
// SIGNAL AND HEALTH
// ============================================================================

#[tokio::test]
async fn test_signal_is_accepted_and_forwarded() {
    let mut h = Harness::new();
    let (app, _shutdown) = h.app();

    let response = app
        .oneshot(post_json("/__offline/signal", &json!({"tag": "sync-logs"})))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let signal = h.signals.recv().await.expect("signal should arrive");
    assert!(signal.is_sync_logs());
}

#[tokio::test]
async fn test_health_reports_version_and_queue() {
    let h = Harness::new();
    h.state.queue.enqueue(play_log(1)).await.expect("enqueue");
    let (app, _shutdown) = h.app();

    let response = app
        .oneshot(get("/__offline/health"))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["cache_version"], "v1");
    assert_eq!(body["online"], true);
    assert_eq!(body["pending_events"], 1);
}

#[tokio::test]
async fn test_reserved_prefix_is_never_forwarded() {
    let h = Harness::new();
    let (app, _shutdown) = h.app();

    let response = app
        .oneshot(get("/__offline/unknown"))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(h.mock.calls().is_empty());
}

// ============================================================================
// INTERCEPTED TRAFFIC
// ============================================================================

#[tokio::test]
async fn test_intercepted_request_forwards_query_and_headers() {
    let h = Harness::new();
    h.mock.route(
        "/player/api/playlist?screen=4",
        MockReply::json(200, &json!({"playlist": []})),
    );
    let (app, _shutdown) = h.app();

    let request = Request::builder()
        .uri("/player/api/playlist?screen=4")
        .header("cookie", "session=abc")
        .body(Body::empty())
        .expect("request should build");
    let response = app.oneshot(request).await.expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(SOURCE_HEADER)
            .and_then(|v| v.to_str().ok()),
        Some("network")
    );
    let calls = h.mock.calls_to("/player/api/playlist?screen=4");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].header("cookie"), Some("session=abc"));
}

#[tokio::test]
async fn test_intercepted_play_log_queues_when_offline() {
    let h = Harness::new();
    h.mock.set_offline(true);
    let (app, _shutdown) = h.app();

    let response = app
        .oneshot(post_json("/player/api/log-play", &play_log(42)))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"queued": true, "offline": true})
    );

    let events = h.state.queue.peek_batch(10).await.expect("peek");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload, play_log(42));
}
