//! Restart behavior over the LMDB backends.

use std::sync::Arc;

use shabaka_core::{InterceptedRequest, ResponseSource, TimestampSequencer};
use shabaka_storage::{EventQueue, LmdbCacheStore, LmdbEventQueue};
use shabaka_test_utils::fixtures::{play_log, test_config, upstream_with_shell};
use shabaka_test_utils::{FixedClock, MockReply};
use tempfile::TempDir;

#[path = "support/harness.rs"]
mod harness;
use harness::Harness;

const LOG_PLAY: &str = "/player/api/log-play";

fn open_harness(dir: &TempDir, clock_micros: i64) -> Harness {
    let config = test_config();
    let cache = LmdbCacheStore::open(dir.path().join("cache"), 64)
        .expect("cache should open");
    let queue = LmdbEventQueue::open(
        dir.path().join("queue"),
        16,
        config.max_pending_events,
        TimestampSequencer::new(Arc::new(FixedClock(clock_micros))),
    )
    .expect("queue should open");
    Harness::with_stores(
        Arc::new(upstream_with_shell(&config)),
        Arc::new(cache),
        Arc::new(queue),
        config,
    )
}

#[tokio::test]
async fn test_queued_logs_survive_restart_and_drain() {
    let dir = TempDir::new().expect("TempDir creation should succeed");

    let first_key = {
        let h = open_harness(&dir, 5_000_000);
        h.mock.set_offline(true);
        h.router
            .dispatch(InterceptedRequest::post_json(LOG_PLAY, &play_log(1)))
            .await;
        let events = h.state.queue.peek_batch(10).await.expect("peek");
        events[0].timestamp
    };

    // Clock moved backwards across the restart.
    let h = open_harness(&dir, 1_000);
    h.mock.set_offline(true);
    h.router
        .dispatch(InterceptedRequest::post_json(LOG_PLAY, &play_log(2)))
        .await;

    let events = h.state.queue.peek_batch(10).await.expect("peek");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].timestamp, first_key);
    assert!(events[1].timestamp > first_key);
    assert_eq!(events[1].payload, play_log(2));

    h.mock.set_offline(false);
    h.mock.route(LOG_PLAY, MockReply::status(200));
    let report = h.coordinator.drain().await.expect("drain should succeed");
    assert_eq!(report.delivered, 2);
    assert_eq!(report.remaining, 0);
}

#[tokio::test]
async fn test_installed_shell_survives_restart() {
    let dir = TempDir::new().expect("TempDir creation should succeed");

    {
        let h = open_harness(&dir, 1);
        h.lifecycle.bootstrap().await.expect("bootstrap should succeed");
    }

    let h = open_harness(&dir, 2);
    let outcome = h.lifecycle.bootstrap().await.expect("bootstrap should succeed");
    assert!(matches!(outcome, shabaka_proxy::BootstrapOutcome::Activated { .. }));

    h.mock.set_offline(true);
    let response = h
        .router
        .dispatch(InterceptedRequest::get("/static/js/hls.min.js"))
        .await;
    assert_eq!(response.source, ResponseSource::Cache);
    assert_eq!(response.body, b"asset /static/js/hls.min.js");
}
