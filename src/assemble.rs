//! Keyed sets to application arrays
//!
//! The store has no arrays; likes, comments and media are keyed sets whose
//! elements may be tombstones or still-replicating reference markers. The
//! assembler keeps only elements that carry data, in the set's insertion
//! order. Callers that need chronological order sort by timestamp.

use crate::error::{ApiError, Result};
use crate::model::{Comment, Like, Media, Post};
use crate::paths;
use crate::store::{is_empty_object, is_unresolved_marker, live_entries, META_KEY};
use serde_json::{Map, Value};
use tracing::trace;

/// Alias carried by an `owner` attribute: either a plain alias or an
/// `{alias, pub}` identity
pub fn owner_alias(owner: &Value) -> Option<String> {
    match owner {
        Value::String(alias) if !alias.is_empty() => Some(alias.clone()),
        Value::Object(map) if !map.contains_key("#") => map
            .get("alias")
            .and_then(Value::as_str)
            .filter(|alias| !alias.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Elements of a set that are real, owned records
fn owned_elements<'a>(
    set: Option<&'a Value>,
) -> impl Iterator<Item = (&'a String, &'a Map<String, Value>, String)> + 'a {
    set.into_iter()
        .flat_map(live_entries)
        .filter(|(_, value)| !is_unresolved_marker(value))
        .filter_map(|(key, value)| {
            let record = value.as_object()?;
            let owner = record.get("owner").and_then(owner_alias)?;
            Some((key, record, owner))
        })
}

pub fn likes_from_set(set: Option<&Value>) -> Vec<Like> {
    owned_elements(set)
        .map(|(_, record, owner)| Like {
            owner,
            timestamp: record.get("timestamp").and_then(Value::as_i64),
        })
        .collect()
}

pub fn comments_from_set(set: Option<&Value>) -> Vec<Comment> {
    owned_elements(set)
        .map(|(key, record, owner)| Comment {
            comment_id: key.clone(),
            owner,
            text: record
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            timestamp: record.get("timestamp").and_then(Value::as_i64),
            likes: likes_from_set(record.get("likes")),
        })
        .collect()
}

pub fn media_from_set(set: Option<&Value>) -> Vec<Media> {
    let elements: Vec<&Value> = match set {
        Some(Value::Array(items)) => items.iter().collect(),
        other => other
            .into_iter()
            .flat_map(live_entries)
            .map(|(_, value)| value)
            .collect(),
    };

    elements
        .into_iter()
        .filter(|value| value.is_object() && !is_unresolved_marker(value) && !is_empty_object(value))
        .filter_map(|value| match serde_json::from_value::<Media>(value.clone()) {
            Ok(media) => Some(media),
            Err(err) => {
                trace!(error = %err, "Skipping malformed media element");
                None
            }
        })
        .map(|mut media| {
            media.extra.remove(META_KEY);
            media
        })
        .collect()
}

const POST_FIELDS: [&str; 8] = [
    "likes",
    "comments",
    "media",
    "owner",
    "timestamp",
    "text",
    "location",
    META_KEY,
];

/// Assemble a post from the record read at `posts.<post_path>`
pub fn assemble_post(post_path: &str, record: &Value) -> Result<Post> {
    let map = record
        .as_object()
        .ok_or_else(|| ApiError::Serialization(format!("post {} is not a record", post_path)))?;

    let owner = map
        .get("owner")
        .and_then(owner_alias)
        .ok_or_else(|| ApiError::Serialization(format!("post {} has no owner", post_path)))?;

    let extra = map
        .iter()
        .filter(|(key, value)| !POST_FIELDS.contains(&key.as_str()) && !is_unresolved_marker(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(Post {
        post_id: paths::post_id_from_path(post_path).to_string(),
        post_path: post_path.to_string(),
        owner,
        timestamp: map.get("timestamp").and_then(Value::as_i64).unwrap_or_default(),
        text: map.get("text").and_then(Value::as_str).map(str::to_string),
        location: map.get("location").and_then(Value::as_str).map(str::to_string),
        likes: likes_from_set(map.get("likes")),
        comments: comments_from_set(map.get("comments")),
        media: media_from_set(map.get("media")),
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_likes_skip_markers_tombstones_and_ownerless() {
        let set = json!({
            "_": {"#": "soul"},
            "a": {"#": "likes.a"},
            "b": {"owner": "b", "timestamp": 5},
            "c": null,
            "d": {"timestamp": 7},
            "e": {"owner": {"alias": "e", "pub": "pk"}},
            "f": {"owner": ""}
        });
        let likes = likes_from_set(Some(&set));
        assert_eq!(
            likes,
            vec![
                Like { owner: "b".into(), timestamp: Some(5) },
                Like { owner: "e".into(), timestamp: None },
            ]
        );
    }

    #[test]
    fn test_all_markers_yield_empty() {
        let set = json!({"a": {"#": "x"}, "b": {"#": "y"}, "c": {"#": "z"}});
        assert!(likes_from_set(Some(&set)).is_empty());
        assert!(comments_from_set(Some(&set)).is_empty());
        assert!(media_from_set(Some(&set)).is_empty());
        assert!(likes_from_set(None).is_empty());
    }

    #[test]
    fn test_comments_recurse_into_likes_and_keep_key() {
        let set = json!({
            "c1": {
                "owner": "bob",
                "text": "nice",
                "likes": {"x": {"#": "m"}, "alice": {"owner": "alice"}}
            },
            "c2": {"owner": {"#": "profiles.carol"}, "text": "pending"}
        });
        let comments = comments_from_set(Some(&set));
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].comment_id, "c1");
        assert_eq!(comments[0].likes, vec![Like { owner: "alice".into(), timestamp: None }]);
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let set = json!({"z": {"owner": "z"}, "a": {"owner": "a"}, "m": {"owner": "m"}});
        let owners: Vec<String> = likes_from_set(Some(&set)).into_iter().map(|l| l.owner).collect();
        assert_eq!(owners, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_media_filters_empty_and_markers() {
        let set = json!({
            "0": {"hash": "h0", "type": "image/png"},
            "1": {},
            "2": {"#": "media.2"},
            "3": {"hash": "h3", "caption": "sunset"}
        });
        let media = media_from_set(Some(&set));
        assert_eq!(media.len(), 2);
        assert_eq!(media[0].kind.as_deref(), Some("image/png"));
        assert_eq!(media[1].extra.get("caption"), Some(&json!("sunset")));
    }

    #[test]
    fn test_assemble_post() {
        let record = json!({
            "owner": {"alias": "alice", "pub": "pk"},
            "timestamp": 1700,
            "text": "hello",
            "privatePost": false,
            "likes": {"bob": {"owner": "bob"}}
        });
        let post = assemble_post("2024.3.7.public.alice.p-1", &record).unwrap();
        assert_eq!(post.post_id, "p-1");
        assert_eq!(post.owner, "alice");
        assert_eq!(post.likes.len(), 1);
        assert!(post.comments.is_empty());
        assert_eq!(post.extra.get("privatePost"), Some(&json!(false)));
    }

    #[test]
    fn test_assemble_post_requires_owner() {
        let err = assemble_post("p", &json!({"owner": {}})).unwrap_err();
        assert!(matches!(err, ApiError::Serialization(_)));
    }
}
