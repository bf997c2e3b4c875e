//! Durable telemetry queue.

pub mod lmdb_queue;
pub mod memory;
pub mod traits;

pub use lmdb_queue::LmdbEventQueue;
pub use memory::InMemoryEventQueue;
pub use traits::{Enqueued, EventQueue};
