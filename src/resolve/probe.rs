//! Retry predicate: which parts of a record must be materialized

use crate::store::{is_empty_object, is_unresolved_marker, live_entries};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CollectionProbe {
    field: String,
    nested: Vec<String>,
}

/// Describes the depth a caller needs a record materialized to.
///
/// A record that is itself a marker never passes. Otherwise it passes when
/// none of the listed collections holds a reference marker (as an element,
/// or as an element's `owner`), no nested collection of those elements
/// does, and none of the listed scalars is a marker or an empty object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionProbe {
    collections: Vec<CollectionProbe>,
    scalars: Vec<String>,
}

impl ResolutionProbe {
    /// Probe that only requires the root to exist
    pub fn root() -> Self {
        Self::default()
    }

    /// Probe used for posts: likes, comments and their likes, media, owner
    pub fn post() -> Self {
        Self::root()
            .collection("likes")
            .nested("comments", "likes")
            .collection("media")
            .scalar("owner")
    }

    pub fn collection(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.collections.iter().any(|c| c.field == field) {
            self.collections.push(CollectionProbe {
                field,
                nested: Vec::new(),
            });
        }
        self
    }

    /// Also inspect `nested` inside every element of `field`
    pub fn nested(mut self, field: impl Into<String>, nested: impl Into<String>) -> Self {
        let field = field.into();
        let nested = nested.into();
        match self.collections.iter_mut().find(|c| c.field == field) {
            Some(probe) => probe.nested.push(nested),
            None => self.collections.push(CollectionProbe {
                field,
                nested: vec![nested],
            }),
        }
        self
    }

    pub fn scalar(mut self, field: impl Into<String>) -> Self {
        self.scalars.push(field.into());
        self
    }

    /// Number of places in `record` that are still replicating
    pub fn unresolved(&self, record: &Value) -> usize {
        if is_unresolved_marker(record) {
            return 1;
        }
        let collections: usize = self
            .collections
            .iter()
            .map(|probe| match record.get(&probe.field) {
                Some(set) if is_unresolved_marker(set) => 1,
                Some(set) => live_entries(set)
                    .map(|(_, element)| unresolved_element(element, &probe.nested))
                    .sum(),
                None => 0,
            })
            .sum();

        let scalars = self
            .scalars
            .iter()
            .filter(|field| {
                record
                    .get(field.as_str())
                    .map(|value| is_unresolved_marker(value) || is_empty_object(value))
                    .unwrap_or(false)
            })
            .count();

        collections + scalars
    }

    pub fn is_settled(&self, record: &Value) -> bool {
        self.unresolved(record) == 0
    }
}

fn unresolved_element(element: &Value, nested: &[String]) -> usize {
    if is_unresolved_marker(element) {
        return 1;
    }
    let owner = element
        .get("owner")
        .map(|owner| usize::from(is_unresolved_marker(owner)))
        .unwrap_or(0);
    let inner: usize = nested
        .iter()
        .filter_map(|field| element.get(field.as_str()))
        .map(|set| {
            if is_unresolved_marker(set) {
                1
            } else {
                live_entries(set)
                    .filter(|(_, value)| is_unresolved_marker(value))
                    .count()
            }
        })
        .sum();
    owner + inner
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_probe_counts_every_marker() {
        let record = json!({
            "owner": {"alias": "alice"},
            "likes": {"a": {"#": "x"}, "b": {"owner": "b"}},
            "comments": {
                "c1": {"owner": {"#": "profiles.bob"}, "likes": {"z": {"#": "y"}}},
                "c2": {"#": "comments.c2"}
            },
            "media": {"0": {"#": "m0"}}
        });
        // a, c1.owner, c1.likes.z, c2, media 0
        assert_eq!(ResolutionProbe::post().unresolved(&record), 5);
    }

    #[test]
    fn test_empty_owner_needs_retry() {
        let probe = ResolutionProbe::post();
        assert_eq!(probe.unresolved(&json!({"owner": {}})), 1);
        assert!(probe.is_settled(&json!({"owner": "alice"})));
    }

    #[test]
    fn test_tombstones_are_settled() {
        let record = json!({"owner": "a", "likes": {"a": null, "b": {"owner": "b"}}});
        assert!(ResolutionProbe::post().is_settled(&record));
    }

    #[test]
    fn test_root_probe_ignores_nested_markers() {
        assert!(ResolutionProbe::root().is_settled(&json!({"likes": {"a": {"#": "x"}}})));
    }

    #[test]
    fn test_marker_root_is_unsettled() {
        assert_eq!(ResolutionProbe::root().unresolved(&json!({"#": "accounts.bob.profile"})), 1);
    }

    #[test]
    fn test_whole_collection_marker() {
        assert_eq!(ResolutionProbe::post().unresolved(&json!({"owner": "a", "likes": {"#": "l"}})), 1);
    }
}
