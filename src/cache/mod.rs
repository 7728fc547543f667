//!
//! Key/value caches with a per-entry TTL, used for slowly changing reference data.
//!
use crate::Result;
use std::time::Duration;

mod file;
mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

/// A key/value store with per entry time to live.
///
/// [`Cache::get`] returns `None` when the key is absent or expired. A stored
/// [`serde_json::Value::Null`] is returned as `Some(Value::Null)`, callers should
/// treat that the same as a miss.
pub trait Cache: Send + Sync {
    /// Returns true if a live entry exists for `key`
    fn has(&self, key: &str) -> bool;

    /// Get a live entry
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Store `value` under `key` for `ttl`
    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()>;
}
