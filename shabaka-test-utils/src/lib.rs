//! Shabaka Test Utilities
//!
//! Shared test infrastructure for the Shabaka workspace:
//! - A scripted upstream player server
//! - Deterministic clocks for the event sequencer
//! - Test fixtures for playlists, play logs and stores
//! - Proptest generators for URLs, playlists and payloads

pub use shabaka_storage::{CacheStore, EventQueue, InMemoryCacheStore, InMemoryEventQueue};

pub use shabaka_core::{
    CacheEntry, Clock, EventTimestamp, InterceptedRequest, OfflineConfig, PlayerResponse,
    PlaylistDescription, PlaylistItem, QueuedEvent, TimestampSequencer, Upstream, UpstreamError,
};

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

// ============================================================================
// MOCK UPSTREAM
// ============================================================================

/// One scripted upstream outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Answer with a response.
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
    /// Transport failure: no response at all.
    Fail,
}

impl MockReply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        MockReply::Respond {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        MockReply::Respond {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: value.to_string().into_bytes(),
        }
    }

    pub fn status(status: u16) -> Self {
        MockReply::Respond {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

/// Scripted stand-in for the player server.
///
/// Each path has a queue of replies. Replies are consumed in order and the
/// last one repeats forever. Unknown paths answer 404. While offline, every
/// request fails at the transport level. Every request is recorded, including
/// failed ones.
#[derive(Debug)]
pub struct MockUpstream {
    origin: String,
    routes: Mutex<HashMap<String, VecDeque<MockReply>>>,
    offline: AtomicBool,
    calls: Mutex<Vec<InterceptedRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::with_origin("http://player.test")
    }

    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            routes: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replace the replies for `target` with a single repeating reply.
    pub fn route(&self, target: &str, reply: MockReply) -> &Self {
        self.script(target, vec![reply])
    }

    /// Replace the replies for `target` with a sequence.
    pub fn script(&self, target: &str, replies: Vec<MockReply>) -> &Self {
        lock(&self.routes).insert(target.to_string(), replies.into());
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<InterceptedRequest> {
        lock(&self.calls).clone()
    }

    /// Requests received for one target.
    pub fn calls_to(&self, target: &str) -> Vec<InterceptedRequest> {
        lock(&self.calls)
            .iter()
            .filter(|request| request.target == target)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, target: &str) -> usize {
        self.calls_to(target).len()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn next_reply(&self, target: &str) -> MockReply {
        let mut routes = lock(&self.routes);
        match routes.get_mut(target) {
            Some(replies) if replies.len() > 1 => replies.pop_front().unwrap_or(MockReply::Fail),
            Some(replies) => replies.front().cloned().unwrap_or(MockReply::Fail),
            None => MockReply::status(404),
        }
    }
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn send(&self, request: &InterceptedRequest) -> Result<PlayerResponse, UpstreamError> {
        lock(&self.calls).push(request.clone());

        if self.is_offline() {
            return Err(UpstreamError::Unreachable {
                url: request.target.clone(),
                reason: "mock upstream is offline".to_string(),
            });
        }

        match self.next_reply(&request.target) {
            MockReply::Respond {
                status,
                headers,
                body,
            } => Ok(PlayerResponse::from_network(status, headers, body)),
            MockReply::Fail => Err(UpstreamError::Unreachable {
                url: request.target.clone(),
                reason: "scripted transport failure".to_string(),
            }),
        }
    }

    fn origin(&self) -> &str {
        &self.origin
    }
}

// ============================================================================
// CLOCKS
// ============================================================================

/// A clock stuck at one instant, for forcing timestamp collisions.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_micros(&self) -> i64 {
        self.0
    }
}

/// A clock that advances by `step` microseconds on every reading.
#[derive(Debug)]
pub struct SteppingClock {
    next: AtomicI64,
    step: i64,
}

impl SteppingClock {
    pub fn new(start: i64, step: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now_micros(&self) -> i64 {
        self.next.fetch_add(self.step, Ordering::SeqCst)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for proxy inputs.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    /// A file name with a media extension.
    pub fn arb_media_name() -> impl Strategy<Value = String> {
        ("[a-z0-9_]{1,16}", prop_oneof![Just("mp4"), Just("png"), Just("jpg"), Just("webm")])
            .prop_map(|(stem, ext)| format!("{}.{}", stem, ext))
    }

    /// Origin-relative upload URL, e.g. `/static/uploads/clip.mp4`.
    pub fn arb_local_media_url() -> impl Strategy<Value = String> {
        arb_media_name().prop_map(|name| format!("/static/uploads/{}", name))
    }

    /// Absolute URL on a third-party origin.
    pub fn arb_remote_url() -> impl Strategy<Value = String> {
        (prop_oneof![Just("http"), Just("https")], "[a-z]{3,10}", arb_media_name())
            .prop_map(|(scheme, host, name)| format!("{}://{}.example.com/{}", scheme, host, name))
    }

    pub fn arb_playlist_item() -> impl Strategy<Value = PlaylistItem> {
        prop_oneof![
            3 => arb_local_media_url().prop_map(PlaylistItem::new),
            1 => arb_remote_url().prop_map(PlaylistItem::new),
        ]
    }

    pub fn arb_playlist() -> impl Strategy<Value = PlaylistDescription> {
        prop::collection::vec(arb_playlist_item(), 0..12)
            .prop_map(|items| PlaylistDescription { items })
    }

    /// A play-log record as the display sends it.
    pub fn arb_play_log() -> impl Strategy<Value = Value> {
        (1u32..10_000, prop_oneof![Just("video"), Just("image")], 1u32..600).prop_map(
            |(content_id, kind, duration)| {
                json!({
                    "content_id": content_id,
                    "content_type": kind,
                    "duration": duration,
                })
            },
        )
    }

    pub fn arb_cache_version() -> impl Strategy<Value = String> {
        "v[0-9]{1,3}(\\.[0-9]{1,2})?"
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use serde_json::{json, Value};
    use std::sync::Arc;

    /// Policy config with a small batch size so paging is exercised.
    pub fn test_config() -> OfflineConfig {
        OfflineConfig {
            drain_batch_size: 2,
            ..OfflineConfig::default()
        }
    }

    /// Server playlist body referencing `urls` in order.
    pub fn playlist_body(urls: &[&str]) -> Value {
        let items: Vec<Value> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| json!({"id": i + 1, "type": "video", "url": url, "duration": 10}))
            .collect();
        json!({"mode": "playlist", "playlist": items})
    }

    pub fn play_log(content_id: u32) -> Value {
        json!({"content_id": content_id, "content_type": "video", "duration": 30})
    }

    pub fn heartbeat() -> Value {
        json!({"status": "playing"})
    }

    /// An upstream that serves every default shell asset with 200.
    pub fn upstream_with_shell(config: &OfflineConfig) -> MockUpstream {
        let upstream = MockUpstream::new();
        for asset in &config.shell_assets {
            upstream.route(asset, MockReply::ok(format!("asset {}", asset)));
        }
        upstream
    }

    pub fn memory_cache() -> Arc<InMemoryCacheStore> {
        Arc::new(InMemoryCacheStore::new())
    }

    /// In-memory queue whose clock never advances.
    pub fn frozen_queue(capacity: usize) -> Arc<InMemoryEventQueue> {
        Arc::new(InMemoryEventQueue::new(
            capacity,
            TimestampSequencer::new(Arc::new(FixedClock(1_700_000_000_000_000))),
        ))
    }

    /// A successful network response captured as a cache entry.
    pub fn cached(key: &str, body: &[u8]) -> CacheEntry {
        CacheEntry::from_response(key, &PlayerResponse::from_network(200, Vec::new(), body.to_vec()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
