//! Notification merge reducer
//!
//! Incoming friend requests and responses are synced in batches. State keeps
//! at most one entry per counterpart owner: an incoming entry replaces any
//! existing entry of the same owner and is appended at the end.

use crate::model::{FriendRequest, FriendResponse};
use serde::{Deserialize, Serialize};

/// Records keyed by their counterpart
pub trait HasOwner {
    fn owner_alias(&self) -> &str;
}

impl HasOwner for FriendRequest {
    fn owner_alias(&self) -> &str {
        &self.owner.alias
    }
}

impl HasOwner for FriendResponse {
    fn owner_alias(&self) -> &str {
        &self.owner.alias
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationState {
    pub friend_requests: Vec<FriendRequest>,
    pub friend_responses: Vec<FriendResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    SyncFriendRequests(Vec<FriendRequest>),
    SyncFriendResponses(Vec<FriendResponse>),
    Reset,
}

/// Merge a batch into `existing`, last write per owner wins
pub fn merge_by_owner<T: HasOwner>(existing: Vec<T>, incoming: Vec<T>) -> Vec<T> {
    incoming.into_iter().fold(existing, |mut merged, entry| {
        merged.retain(|current| current.owner_alias() != entry.owner_alias());
        merged.push(entry);
        merged
    })
}

pub fn merge_friend_requests(
    existing: Vec<FriendRequest>,
    incoming: Vec<FriendRequest>,
) -> Vec<FriendRequest> {
    merge_by_owner(existing, incoming)
}

pub fn merge_friend_responses(
    existing: Vec<FriendResponse>,
    incoming: Vec<FriendResponse>,
) -> Vec<FriendResponse> {
    merge_by_owner(existing, incoming)
}

/// Apply one event to the state
pub fn reduce(state: NotificationState, event: NotificationEvent) -> NotificationState {
    match event {
        NotificationEvent::SyncFriendRequests(incoming) => NotificationState {
            friend_requests: merge_friend_requests(state.friend_requests, incoming),
            ..state
        },
        NotificationEvent::SyncFriendResponses(incoming) => NotificationState {
            friend_responses: merge_friend_responses(state.friend_responses, incoming),
            ..state
        },
        NotificationEvent::Reset => NotificationState::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OwnerIdentity;
    use crate::model::FriendResponseKind;

    fn request(owner: &str, id: &str) -> FriendRequest {
        FriendRequest {
            id: id.into(),
            full_name: None,
            avatar: None,
            owner: OwnerIdentity {
                alias: owner.into(),
                pub_key: format!("pk-{}", owner),
            },
            timestamp: 1,
            read: false,
        }
    }

    fn response(owner: &str, kind: FriendResponseKind) -> FriendResponse {
        FriendResponse {
            id: format!("r-{}", owner),
            full_name: None,
            avatar: None,
            owner: OwnerIdentity {
                alias: owner.into(),
                pub_key: format!("pk-{}", owner),
            },
            timestamp: 1,
            kind,
            read: false,
        }
    }

    #[test]
    fn test_last_write_per_owner_wins() {
        let state = reduce(
            NotificationState::default(),
            NotificationEvent::SyncFriendRequests(vec![request("bob", "1"), request("carol", "2")]),
        );
        let state = reduce(
            state,
            NotificationEvent::SyncFriendRequests(vec![request("bob", "3")]),
        );
        let ids: Vec<&str> = state.friend_requests.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn test_duplicates_within_a_batch() {
        let merged = merge_by_owner(Vec::new(), vec![request("bob", "1"), request("bob", "2")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "2");
    }

    #[test]
    fn test_kinds_are_independent_and_reset_clears() {
        let state = reduce(
            NotificationState::default(),
            NotificationEvent::SyncFriendRequests(vec![request("bob", "1")]),
        );
        let state = reduce(
            state,
            NotificationEvent::SyncFriendResponses(vec![
                response("bob", FriendResponseKind::Accepted),
                response("dave", FriendResponseKind::Rejected),
            ]),
        );
        assert_eq!(state.friend_requests.len(), 1);
        assert_eq!(state.friend_responses.len(), 2);

        assert_eq!(reduce(state, NotificationEvent::Reset), NotificationState::default());
    }
}
