//! Relationship state between the current user and one target

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendshipState {
    NotFriend,
    /// The current user asked, the target has not answered
    PendingOutgoing,
    /// The target asked, the current user has not answered
    PendingIncoming,
    Mutual,
    /// The current user removed their edge
    Removed,
}

/// Presence of one directed friend edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeState {
    #[default]
    Absent,
    Live,
    /// Deleted; the key is left as a tombstone
    Tombstoned,
}

/// Everything the state is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelationshipFacts {
    /// Current user -> target
    pub local_edge: EdgeState,
    /// Target -> current user
    pub reverse_edge: EdgeState,
    /// Request from the target to the current user
    pub incoming_request: bool,
    /// Request from the current user to the target
    pub outgoing_request: bool,
}

impl RelationshipFacts {
    pub fn state(&self) -> FriendshipState {
        let local = self.local_edge == EdgeState::Live;
        let reverse = self.reverse_edge == EdgeState::Live;

        if local && reverse {
            FriendshipState::Mutual
        } else if self.incoming_request {
            FriendshipState::PendingIncoming
        } else if self.outgoing_request || local {
            FriendshipState::PendingOutgoing
        } else if self.local_edge == EdgeState::Tombstoned {
            FriendshipState::Removed
        } else {
            FriendshipState::NotFriend
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation() {
        let facts = RelationshipFacts::default();
        assert_eq!(facts.state(), FriendshipState::NotFriend);

        let outgoing = RelationshipFacts {
            local_edge: EdgeState::Live,
            outgoing_request: true,
            ..Default::default()
        };
        assert_eq!(outgoing.state(), FriendshipState::PendingOutgoing);

        let incoming = RelationshipFacts {
            reverse_edge: EdgeState::Live,
            incoming_request: true,
            ..Default::default()
        };
        assert_eq!(incoming.state(), FriendshipState::PendingIncoming);

        let mutual = RelationshipFacts {
            local_edge: EdgeState::Live,
            reverse_edge: EdgeState::Live,
            ..Default::default()
        };
        assert_eq!(mutual.state(), FriendshipState::Mutual);

        let removed = RelationshipFacts {
            local_edge: EdgeState::Tombstoned,
            ..Default::default()
        };
        assert_eq!(removed.state(), FriendshipState::Removed);

        let removed_but_asked_again = RelationshipFacts {
            local_edge: EdgeState::Tombstoned,
            incoming_request: true,
            ..Default::default()
        };
        assert_eq!(removed_but_asked_again.state(), FriendshipState::PendingIncoming);
    }
}
