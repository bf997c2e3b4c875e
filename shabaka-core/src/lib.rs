//! Shabaka Core - Offline Proxy Data Types
//!
//! Data model shared by the storage backends and the proxy: cache entries,
//! queued telemetry events, partition naming, request/response exchange
//! types, the error taxonomy and the upstream seam.

pub mod config;
pub mod entry;
pub mod error;
pub mod event;
pub mod exchange;
pub mod partition;
pub mod playlist;
pub mod upstream;

pub use config::{OfflineConfig, DEFAULT_SHELL_ASSETS};
pub use entry::{CacheEntry, CacheStats, CacheStatus, EntryMeta};
pub use error::{
    ConfigError, ControlError, LifecycleError, PlayerError, PlayerResult, StorageError,
    UpstreamError,
};
pub use event::{Clock, EventTimestamp, QueuedEvent, SystemClock, TimestampSequencer};
pub use exchange::{
    is_hop_by_hop, is_remote_url, normalize_key, HeaderList, InterceptedRequest, PlayerResponse,
    ResponseSource, SOURCE_HEADER,
};
pub use partition::{PartitionKind, PartitionSet, PARTITION_PREFIX};
pub use playlist::{PlaylistDescription, PlaylistItem};
pub use upstream::Upstream;
