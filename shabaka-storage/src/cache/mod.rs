//! Versioned cache partitions.
//!
//! Partitions are named key-value spaces (`shabaka-media-v1`, ...). Keys are
//! scoped to their partition by [`PartitionScopedKey`], which makes garbage
//! collection of a whole partition a prefix delete.

pub mod lmdb_backend;
pub mod memory;
pub mod partition_key;
pub mod traits;

pub use lmdb_backend::LmdbCacheStore;
pub use memory::InMemoryCacheStore;
pub use partition_key::PartitionScopedKey;
pub use traits::CacheStore;
