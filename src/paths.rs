//! Canonical record paths
//!
//! Every record the data layer touches is addressed by a dotted path. This
//! module is the single place those paths are spelled out.
//!
//! ```text
//! accounts.<alias>.profile                      private profile
//! accounts.<alias>.profile.friends.<target>     friend edge (reference)
//! profiles.<alias>                              public profile (reference)
//! notifications.friendRequests.<to>.<from>      friend request
//! notifications.friendResponses.<to>.<from>     friend response
//! notifications.byUser.<to>.<id>                notification
//! posts.<yyyy>.<m>.<d>.public.<owner>.<postId>  post
//! postMetaById.<postId>                         post meta
//! postMetasByUser.<owner>.<postId>              post meta by owner
//! postMetaByIdTimestamp.<ts>|<postId>|<owner>   composite timestamp index
//! ```

use crate::error::{ApiError, Result};
use chrono::{DateTime, Datelike, Utc};

pub const ACCOUNTS: &str = "accounts";
pub const PROFILE: &str = "profile";
pub const PROFILES: &str = "profiles";
pub const FRIENDS: &str = "friends";
pub const NOTIFICATIONS: &str = "notifications";
pub const FRIEND_REQUESTS: &str = "friendRequests";
pub const FRIEND_RESPONSES: &str = "friendResponses";
pub const BY_USER: &str = "byUser";
pub const POSTS: &str = "posts";
pub const PUBLIC: &str = "public";
pub const LIKES: &str = "likes";
pub const COMMENTS: &str = "comments";
pub const MEDIA: &str = "media";
pub const POST_META_BY_ID: &str = "postMetaById";
pub const POST_METAS_BY_USER: &str = "postMetasByUser";
pub const POST_META_BY_ID_TIMESTAMP: &str = "postMetaByIdTimestamp";

/// Separator between the parts of a composite index key
pub const INDEX_SEPARATOR: char = '|';

/// Reject segments that would change the shape of a path or index key
pub fn validate_segment(what: &str, segment: &str) -> Result<()> {
    if segment.trim().is_empty() {
        return Err(ApiError::validation(format!("{} must not be empty", what)));
    }
    if segment.contains(['.', INDEX_SEPARATOR, '#']) {
        return Err(ApiError::validation(format!(
            "{} must not contain '.', '|' or '#': {}",
            what, segment
        )));
    }
    Ok(())
}

/// Join path segments with `.`
pub fn join(segments: &[&str]) -> String {
    segments.join(".")
}

/// Split `a.b.c` into (`a.b`, `c`)
pub fn split_last(path: &str) -> Option<(&str, &str)> {
    path.rsplit_once('.')
}

pub fn private_profile(alias: &str) -> String {
    join(&[ACCOUNTS, alias, PROFILE])
}

pub fn public_profile(alias: &str) -> String {
    join(&[PROFILES, alias])
}

pub fn friends(owner: &str) -> String {
    join(&[ACCOUNTS, owner, PROFILE, FRIENDS])
}

pub fn friend_edge(owner: &str, target: &str) -> String {
    join(&[ACCOUNTS, owner, PROFILE, FRIENDS, target])
}

pub fn friend_requests_to(to: &str) -> String {
    join(&[NOTIFICATIONS, FRIEND_REQUESTS, to])
}

pub fn friend_request(to: &str, from: &str) -> String {
    join(&[NOTIFICATIONS, FRIEND_REQUESTS, to, from])
}

pub fn friend_responses_to(to: &str) -> String {
    join(&[NOTIFICATIONS, FRIEND_RESPONSES, to])
}

pub fn friend_response(to: &str, from: &str) -> String {
    join(&[NOTIFICATIONS, FRIEND_RESPONSES, to, from])
}

pub fn notifications_for(to: &str) -> String {
    join(&[NOTIFICATIONS, BY_USER, to])
}

pub fn notification(to: &str, id: &str) -> String {
    join(&[NOTIFICATIONS, BY_USER, to, id])
}

/// Date bucket of a post path, e.g. `2024.3.7`
pub fn date_bucket(date: DateTime<Utc>) -> String {
    format!("{}.{}.{}", date.year(), date.month(), date.day())
}

/// Post path relative to `posts`
pub fn new_post_path(date: DateTime<Utc>, owner: &str, post_id: &str) -> String {
    join(&[&date_bucket(date), PUBLIC, owner, post_id])
}

/// Stable post id: the final segment of the post path
pub fn post_id_from_path(post_path: &str) -> &str {
    post_path.rsplit('.').next().unwrap_or(post_path)
}

pub fn post(post_path: &str) -> String {
    join(&[POSTS, post_path])
}

pub fn post_likes(post_path: &str) -> String {
    join(&[POSTS, post_path, LIKES])
}

pub fn post_like(post_path: &str, alias: &str) -> String {
    join(&[POSTS, post_path, LIKES, alias])
}

pub fn post_comment(post_path: &str, comment_id: &str) -> String {
    join(&[POSTS, post_path, COMMENTS, comment_id])
}

pub fn post_meta_by_id(post_id: &str) -> String {
    join(&[POST_META_BY_ID, post_id])
}

pub fn post_metas_by_user(owner: &str) -> String {
    join(&[POST_METAS_BY_USER, owner])
}

pub fn post_meta_by_user(owner: &str, post_id: &str) -> String {
    join(&[POST_METAS_BY_USER, owner, post_id])
}

pub fn timestamp_index() -> String {
    POST_META_BY_ID_TIMESTAMP.to_string()
}

/// One decoded key of the composite timestamp index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimestampKey {
    pub timestamp: i64,
    pub post_id: String,
    pub owner: String,
}

impl TimestampKey {
    pub fn new(timestamp: i64, post_id: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            timestamp,
            post_id: post_id.into(),
            owner: owner.into(),
        }
    }

    /// Parse `timestamp|postId|owner`; anything else is `None`
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.split(INDEX_SEPARATOR);
        let timestamp = parts.next()?.parse::<i64>().ok()?;
        let post_id = parts.next().filter(|s| !s.is_empty())?;
        let owner = parts.next().filter(|s| !s.is_empty())?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(timestamp, post_id, owner))
    }

    pub fn to_key(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.timestamp,
            self.post_id,
            self.owner,
            sep = INDEX_SEPARATOR
        )
    }

    /// Full store path of this index entry
    pub fn path(&self) -> String {
        join(&[POST_META_BY_ID_TIMESTAMP, &self.to_key()])
    }
}
