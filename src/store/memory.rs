//! In-process graph store
//!
//! Reproduces the read semantics the data layer has to cope with: references
//! that have not replicated yet come back as markers, deletions leave
//! tombstones, keyed sets keep insertion order. Replication lag and write
//! failures can be injected per path.

use super::{reference_target, Ack, GraphStore, ReadOptions, REFERENCE_KEY};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

/// Upper bound on reference hops and nesting followed during one read
const MAX_HOPS: usize = 16;

/// Tracks which references a single read is not allowed to follow
struct Gate {
    withheld: HashSet<String>,
    touched: HashSet<String>,
}

impl Gate {
    fn blocks(&mut self, target: &str) -> bool {
        if self.withheld.contains(target) {
            self.touched.insert(target.to_string());
            true
        } else {
            false
        }
    }
}

/// In-memory [`GraphStore`]
///
/// # Example
///
/// ```rust,ignore
/// let store = MemoryGraphStore::new();
/// store.put_at("profiles.bob", json!({"alias": "bob"})).await;
///
/// // Simulate bob's profile still replicating for the next two reads
/// store.withhold("profiles.bob", 2).await;
/// ```
#[derive(Default)]
pub struct MemoryGraphStore {
    root: RwLock<Value>,
    /// Reference target -> number of reads it stays unresolved for
    withheld: Mutex<HashMap<String, usize>>,
    /// Path prefixes whose writes are acknowledged with an error
    failing: Mutex<Vec<String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
            ..Default::default()
        }
    }

    /// Keep references to `path` unresolved for the next `reads` reads
    pub async fn withhold(&self, path: impl Into<String>, reads: usize) {
        self.withheld.lock().await.insert(path.into(), reads);
    }

    /// Acknowledge every write at or under `prefix` with an error
    pub async fn fail_writes_under(&self, prefix: impl Into<String>) {
        self.failing.lock().await.push(prefix.into());
    }

    pub async fn clear_write_failures(&self) {
        self.failing.lock().await.clear();
    }

    /// Raw stored value, without following references
    pub async fn snapshot(&self, path: &str) -> Option<Value> {
        let root = self.root.read().await;
        let mut current = &*root;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    async fn open_gate(&self) -> Gate {
        let withheld = self
            .withheld
            .lock()
            .await
            .iter()
            .filter(|(_, remaining)| **remaining > 0)
            .map(|(path, _)| path.clone())
            .collect();
        Gate {
            withheld,
            touched: HashSet::new(),
        }
    }

    async fn close_gate(&self, gate: Gate) {
        if gate.touched.is_empty() {
            return;
        }
        let mut withheld = self.withheld.lock().await;
        for path in gate.touched {
            if let Some(remaining) = withheld.get_mut(&path) {
                *remaining = remaining.saturating_sub(1);
                trace!(path = %path, remaining = *remaining, "Withheld reference observed");
            }
        }
        withheld.retain(|_, remaining| *remaining > 0);
    }

    async fn write_rejected(&self, path: &str) -> Option<Ack> {
        let failing = self.failing.lock().await;
        failing
            .iter()
            .find(|prefix| path == prefix.as_str() || path.starts_with(&format!("{}.", prefix)))
            .map(|prefix| Ack::error(format!("write rejected under {}", prefix)))
    }

    async fn read(&self, path: &str, deep: bool) -> Option<Value> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        tokio::task::yield_now().await;

        let mut gate = self.open_gate().await;
        let value = {
            let root = self.root.read().await;
            lookup(&root, path, &mut gate, 0).and_then(|found| {
                let target = if reference_target(found).is_some() {
                    follow(&root, found, &mut gate, 0).unwrap_or(found)
                } else {
                    found
                };
                if target.is_null() {
                    return None;
                }
                if deep {
                    let mut chain = vec![path.to_string()];
                    Some(resolve_deep(&root, target, &mut chain, &mut gate, 0))
                } else {
                    Some(target.clone())
                }
            })
        };
        self.close_gate(gate).await;
        value
    }

    async fn write(&self, path: &str, value: Value) -> Ack {
        if let Some(ack) = self.write_rejected(path).await {
            debug!(path = %path, "Injected write failure");
            return ack;
        }
        self.writes.fetch_add(1, Ordering::Relaxed);

        let mut root = self.root.write().await;
        let canonical = canonical_path(&root, path);
        let segments: Vec<&str> = canonical.split('.').collect();
        let slot = node_mut(&mut root, &segments);
        merge(slot, value);
        Ack::ok()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn put_at(&self, path: &str, value: Value) -> Ack {
        self.write(path, value).await
    }

    async fn read_once_at(&self, path: &str, _opts: ReadOptions) -> Option<Value> {
        self.read(path, false).await
    }

    async fn read_live_at(&self, path: &str, _opts: ReadOptions) -> Option<Value> {
        self.read(path, true).await
    }

    async fn erase_key_at(&self, path: &str, key: &str) -> Ack {
        self.write(&format!("{}.{}", path, key), Value::Null).await
    }
}

/// Walk `path`, following references at intermediate nodes
fn lookup<'a>(root: &'a Value, path: &str, gate: &mut Gate, hops: usize) -> Option<&'a Value> {
    if hops > MAX_HOPS {
        return None;
    }
    let mut current = root;
    for segment in path.split('.') {
        current = follow(root, current, gate, hops)?;
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Replace a reference by its target, if the target has replicated
fn follow<'a>(root: &'a Value, value: &'a Value, gate: &mut Gate, hops: usize) -> Option<&'a Value> {
    match reference_target(value) {
        Some(target) => {
            if hops > MAX_HOPS || gate.blocks(target) {
                return None;
            }
            let next = lookup(root, target, gate, hops + 1)?;
            follow(root, next, gate, hops + 1)
        }
        None => Some(value),
    }
}

fn resolve_deep(
    root: &Value,
    value: &Value,
    chain: &mut Vec<String>,
    gate: &mut Gate,
    depth: usize,
) -> Value {
    match value {
        Value::Object(map) if map.contains_key(REFERENCE_KEY) => {
            let Some(target) = reference_target(value) else {
                return value.clone();
            };
            if depth > MAX_HOPS || chain.iter().any(|p| p == target) {
                return value.clone();
            }
            let target = target.to_string();
            match follow(root, value, gate, 0) {
                Some(resolved) if !resolved.is_null() => {
                    chain.push(target);
                    let out = resolve_deep(root, resolved, chain, gate, depth + 1);
                    chain.pop();
                    out
                }
                _ => value.clone(),
            }
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_deep(root, v, chain, gate, depth + 1)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Rewrite a path so that it does not pass through references
fn canonical_path(root: &Value, path: &str) -> String {
    let segments: Vec<&str> = path.split('.').collect();
    let mut prefix = String::new();
    let mut current = Some(root);

    for (i, segment) in segments.iter().enumerate() {
        if !prefix.is_empty() {
            prefix.push('.');
        }
        prefix.push_str(segment);
        current = current
            .and_then(Value::as_object)
            .and_then(|map| map.get(*segment));

        let is_last = i + 1 == segments.len();
        if let (false, Some(target)) = (is_last, current.and_then(reference_target)) {
            let rest = segments[i + 1..].join(".");
            return canonical_path(root, &format!("{}.{}", target, rest));
        }
    }
    prefix
}

fn node_mut<'a>(root: &'a mut Value, segments: &[&str]) -> &'a mut Value {
    let mut current = root;
    for segment in segments {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            unreachable!("node was just replaced with an object");
        };
        current = map.entry(segment.to_string()).or_insert(Value::Null);
    }
    current
}

/// Store merge rule: objects merge key by key, everything else replaces
fn merge(slot: &mut Value, incoming: Value) {
    match (slot, incoming) {
        (Value::Object(existing), Value::Object(incoming))
            if !existing.contains_key(REFERENCE_KEY) && !incoming.contains_key(REFERENCE_KEY) =>
        {
            for (key, value) in incoming {
                merge(existing.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}
