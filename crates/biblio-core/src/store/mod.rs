//! Flat-file persistence: atomic JSON I/O and the TTL read-through cache.

pub mod atomic;
pub mod cache;

pub use atomic::{atomic_read_json, atomic_write_json};
pub use cache::JsonFileCache;
