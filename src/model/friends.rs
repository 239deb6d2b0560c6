//! Friend request, friend response and notification records

use crate::context::OwnerIdentity;
use serde::{Deserialize, Serialize};

/// Pending request, stored under `(to, from)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    /// Correlation id
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// The requester
    pub owner: OwnerIdentity,
    pub timestamp: i64,
    #[serde(default)]
    pub read: bool,
}

/// Outcome tag of a friend response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendResponseKind {
    Accepted,
    Rejected,
}

/// Answer to a request, stored under `(to = requester, from = responder)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// The responder
    pub owner: OwnerIdentity,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: FriendResponseKind,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    FriendRequest,
}

/// Notification addressed to one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub to: String,
    pub from: OwnerIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub timestamp: i64,
    #[serde(default)]
    pub read: bool,
}

/// Input naming a single counterpart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameInput {
    pub username: String,
}

impl UsernameInput {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Input naming a batch of counterparts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernamesInput {
    pub usernames: Vec<String>,
}

impl UsernamesInput {
    pub fn new<I, S>(usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            usernames: usernames.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_wire_shape() {
        let response = FriendResponse {
            id: "c-1".into(),
            full_name: Some("Bob B".into()),
            avatar: None,
            owner: OwnerIdentity {
                alias: "bob".into(),
                pub_key: "pk-bob".into(),
            },
            timestamp: 42,
            kind: FriendResponseKind::Accepted,
            read: false,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "c-1",
                "fullName": "Bob B",
                "owner": {"alias": "bob", "pub": "pk-bob"},
                "timestamp": 42,
                "type": "accepted",
                "read": false
            })
        );
    }
}
