//! Feed pagination over the composite timestamp index
//!
//! The index is a keyed set whose keys are `timestamp|postId|owner`. A page
//! is computed from a snapshot of that set:
//!
//! 1. parse keys, skipping tombstones and malformed keys
//! 2. keep the entries in scope (owned by a friend, or not)
//! 3. sort by `(timestamp, postId)`
//! 4. start after the token's entry, or at the beginning
//! 5. take `limit` entries; the new token encodes the last one taken
//!
//! Resuming by sort key rather than by identity means a token whose entry
//! has since been deleted still resumes at the right place.

mod cursor;

pub use cursor::FeedCursor;

use crate::error::{ApiError, Result};
use crate::paths::TimestampKey;
use crate::store::live_entries;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::trace;

/// Which owners a feed shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedScope {
    /// Posts by the current user's friends
    Friends,
    /// Everyone else, the current user included
    NonFriends,
}

impl FeedScope {
    fn admits(self, owner: &str, friends: &HashSet<String>) -> bool {
        match self {
            FeedScope::Friends => friends.contains(owner),
            FeedScope::NonFriends => !friends.contains(owner),
        }
    }
}

/// One page of post ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    /// Token for the following page; `None` only for an empty first page
    pub next_token: Option<String>,
    pub post_ids: Vec<String>,
    pub can_load_more: bool,
}

/// Request for one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub token: Option<String>,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { token: None, limit }
    }

    pub fn after(token: impl Into<String>, limit: usize) -> Self {
        Self {
            token: Some(token.into()),
            limit,
        }
    }
}

/// Live, well-formed entries of the timestamp index, in feed order
pub fn index_entries(index: &Value) -> Vec<TimestampKey> {
    let mut entries: Vec<TimestampKey> = live_entries(index)
        .filter_map(|(key, _)| {
            let parsed = TimestampKey::parse(key);
            if parsed.is_none() {
                trace!(key = %key, "Skipping malformed index key");
            }
            parsed
        })
        .collect();
    entries.sort_by(|a, b| {
        (a.timestamp, a.post_id.as_str()).cmp(&(b.timestamp, b.post_id.as_str()))
    });
    entries
}

/// Compute one page from sorted index entries
pub fn paginate(
    entries: &[TimestampKey],
    request: &PageRequest,
    scope: FeedScope,
    friends: &HashSet<String>,
) -> Result<FeedPage> {
    if request.limit == 0 {
        return Err(ApiError::validation("page limit must be at least 1"));
    }
    let cursor = request.token.as_deref().map(FeedCursor::decode).transpose()?;

    let in_scope: Vec<&TimestampKey> = entries
        .iter()
        .filter(|entry| scope.admits(&entry.owner, friends))
        .collect();

    let start = match &cursor {
        None => 0,
        Some(cursor) => in_scope
            .iter()
            .position(|entry| (entry.timestamp, entry.post_id.as_str()) > cursor.sort_key())
            .unwrap_or(in_scope.len()),
    };

    let end = (start + request.limit).min(in_scope.len());
    let page = &in_scope[start..end];

    let next_token = match page.last() {
        Some(last) => Some(FeedCursor::from(*last).encode()?),
        None => request.token.clone(),
    };

    Ok(FeedPage {
        next_token,
        post_ids: page.iter().map(|entry| entry.post_id.clone()).collect(),
        can_load_more: end < in_scope.len(),
    })
}
