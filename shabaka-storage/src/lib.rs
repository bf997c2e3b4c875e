//! Shabaka Storage - Cache Partitions and Durable Queue
//!
//! Persistence for the offline proxy: versioned cache partitions holding
//! captured responses, and the queue of telemetry events awaiting delivery.
//! Each has an LMDB backend for production and an in-memory backend for
//! tests.

pub mod cache;
mod lmdb;
pub mod queue;

pub use cache::{CacheStore, InMemoryCacheStore, LmdbCacheStore, PartitionScopedKey};
pub use lmdb::LmdbStoreError;
pub use queue::{Enqueued, EventQueue, InMemoryEventQueue, LmdbEventQueue};
