//! Graph store capability
//!
//! The shared, eventually-consistent store is an external collaborator. The
//! data layer only needs the four primitives of [`GraphStore`]; everything
//! else (conflict resolution, replication) stays inside the store.
//!
//! Values are JSON. Two shapes carry meaning beyond plain data:
//! - an object with a `"#"` key is a reference; when its target has not
//!   replicated locally it is an *unresolved reference marker*
//! - `null` is a tombstone left by a deletion

mod memory;

pub use memory::MemoryGraphStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

/// Key of a reference inside a stored object
pub const REFERENCE_KEY: &str = "#";

/// Key the store uses for its own bookkeeping
pub const META_KEY: &str = "_";

/// Options for a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Settle window: how long the store may wait for nested data to arrive
    pub wait: Duration,
    /// Stop listening after the first value (single-shot subscription)
    pub detach_after_first: bool,
}

impl ReadOptions {
    pub fn settle(wait: Duration) -> Self {
        Self {
            wait,
            detach_after_first: true,
        }
    }
}

/// Write acknowledgement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    pub err: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self { err: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            err: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }
}

/// The four store primitives the data layer is built on
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Write (merge) a value at a path
    async fn put_at(&self, path: &str, value: Value) -> Ack;

    /// Read a value once; nested references come back as markers
    async fn read_once_at(&self, path: &str, opts: ReadOptions) -> Option<Value>;

    /// Read a value with references followed as far as they have replicated
    async fn read_live_at(&self, path: &str, opts: ReadOptions) -> Option<Value>;

    /// Tombstone one key of the record at `path`
    async fn erase_key_at(&self, path: &str, key: &str) -> Ack;
}

/// Build a reference to another record
pub fn reference(path: &str) -> Value {
    let mut map = Map::new();
    map.insert(REFERENCE_KEY.to_string(), Value::String(path.to_string()));
    Value::Object(map)
}

/// Target path of a reference value
pub fn reference_target(value: &Value) -> Option<&str> {
    value.as_object()?.get(REFERENCE_KEY)?.as_str()
}

/// Whether a value is a reference that has not been replaced by its target
pub fn is_unresolved_marker(value: &Value) -> bool {
    value
        .as_object()
        .map(|map| map.contains_key(REFERENCE_KEY))
        .unwrap_or(false)
}

/// Whether a value is an object with no keys besides store metadata
pub fn is_empty_object(value: &Value) -> bool {
    value
        .as_object()
        .map(|map| map.keys().all(|k| k == META_KEY))
        .unwrap_or(false)
}

/// Live entries of a keyed set, in insertion order: metadata and
/// tombstones dropped
pub fn live_entries(set: &Value) -> impl Iterator<Item = (&String, &Value)> {
    set.as_object()
        .into_iter()
        .flat_map(|map| map.iter())
        .filter(|(k, v)| k.as_str() != META_KEY && !v.is_null())
}

/// Keys of the live entries of a keyed set
pub fn live_keys(set: &Value) -> Vec<String> {
    live_entries(set).map(|(k, _)| k.clone()).collect()
}
