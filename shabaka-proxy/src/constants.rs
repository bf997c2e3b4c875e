//! Constants for the Shabaka offline proxy
//!
//! URL markers the router classifies on, synthetic response messages, and the
//! defaults behind every `SHABAKA_*` environment variable.

// ============================================================================
// ROUTE MARKERS
// ============================================================================

/// Substring identifying playlist media assets.
pub const MEDIA_MARKER: &str = "/static/uploads/";

/// Substring identifying the playlist API.
pub const PLAYLIST_MARKER: &str = "/player/api/playlist";

/// Substring identifying heartbeat telemetry.
pub const HEARTBEAT_MARKER: &str = "/player/api/heartbeat";

/// Substring identifying play-log telemetry; also the drain target.
pub const LOG_PLAY_PATH: &str = "/player/api/log-play";

/// Reserved prefix for the proxy's own endpoints. Never forwarded upstream.
pub const RESERVED_PREFIX: &str = "/__offline";

// ============================================================================
// SYNTHETIC RESPONSES
// ============================================================================

pub const MEDIA_OFFLINE_MESSAGE: &str = "Media not available offline";

pub const PLAYLIST_OFFLINE_MESSAGE: &str = "Offline - no cached playlist";

pub const SHELL_OFFLINE_MESSAGE: &str = "Offline";

pub const INVALID_PLAY_LOG_MESSAGE: &str = "Invalid play log body";

pub const QUEUE_FAILED_MESSAGE: &str = "Play log could not be queued";

// ============================================================================
// SIGNALS AND CHANNELS
// ============================================================================

/// Tag of the connectivity-restoration signal that triggers a drain.
pub const SYNC_SIGNAL_TAG: &str = "sync-logs";

/// Pending control requests before senders wait.
pub const CONTROL_CHANNEL_CAPACITY: usize = 32;

/// Pending sync signals; extra signals are dropped since one drain covers
/// them all.
pub const SIGNAL_CHANNEL_CAPACITY: usize = 4;

// ============================================================================
// CONFIGURATION DEFAULTS
// ============================================================================

pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:5000";

pub const DEFAULT_BIND: &str = "127.0.0.1";

pub const DEFAULT_PORT: u16 = 8787;

pub const DEFAULT_DATA_DIR: &str = "./shabaka-data";

/// LMDB map size of the cache environment.
pub const DEFAULT_CACHE_MAX_SIZE_MB: usize = 4096;

/// LMDB map size of the queue environment.
pub const DEFAULT_QUEUE_MAX_SIZE_MB: usize = 64;

/// Largest request body accepted from the display (256 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

pub const DEFAULT_LOG_FILTER: &str =
    "shabaka_proxy=debug,shabaka_storage=info,tower_http=info,info";
