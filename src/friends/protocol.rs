use super::saga::{Compensation, Saga};
use super::state::{EdgeState, FriendshipState, RelationshipFacts};
use crate::client::SocialClient;
use crate::error::{ApiError, ItemFailure, Result};
use crate::events::SocialEvent;
use crate::model::{
    FriendRequest, FriendResponse, FriendResponseKind, Notification, NotificationKind,
    UsernameInput, UsernamesInput,
};
use crate::paths;
use crate::store::{is_unresolved_marker, live_entries, reference, GraphStore, ReadOptions};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::future::Future;
use tracing::{debug, info, trace, warn};

/// Display attributes copied into requests and responses
#[derive(Debug, Default)]
struct DisplayIdentity {
    full_name: Option<String>,
    avatar: Option<String>,
}

impl<S: GraphStore + ?Sized> SocialClient<S> {
    // =========================================================================
    // Protocol operations
    // =========================================================================

    /// Ask `username` to become a friend.
    ///
    /// When the target already asked the current user, the request is
    /// accepted on the spot instead of crossing it with a second one.
    pub async fn add_friend(&self, input: UsernameInput) -> Result<()> {
        let target = self.counterpart(&input.username, "add")?;
        let me = self.alias();

        if self.edge_state(me, target).await == EdgeState::Live {
            self.settle_crossed_requests(target).await?;
            return Err(ApiError::conflict(format!("{} is already a friend", target)));
        }

        if self.record_exists(&paths::friend_request(target, me)).await {
            debug!(from = %me, to = %target, "Request already sent, restoring local edge");
            let mut saga = Saga::new(self.store.as_ref(), "add_friend_retry");
            self.put_edge(&mut saga, target).await?;
            self.settle_crossed_requests(target).await?;
            self.emit(SocialEvent::FriendAdded {
                owner: me.to_string(),
                friend: target.to_string(),
            });
            return Ok(());
        }

        if self.record_exists(&paths::friend_request(me, target)).await {
            debug!(from = %me, to = %target, "Target already asked, accepting");
            let identity = self.display_identity().await;
            let mut saga = Saga::new(self.store.as_ref(), "add_friend_reciprocal");
            self.put_edge(&mut saga, target).await?;
            self.put_response(&mut saga, target, FriendResponseKind::Accepted, &identity)
                .await?;
            saga.erase(&paths::friend_requests_to(me), target, Compensation::Nothing)
                .await?;
            self.emit(SocialEvent::FriendAdded {
                owner: me.to_string(),
                friend: target.to_string(),
            });
            self.emit(SocialEvent::FriendResponded {
                from: me.to_string(),
                to: target.to_string(),
                kind: FriendResponseKind::Accepted,
            });
            return Ok(());
        }

        if self.edge_state(target, me).await == EdgeState::Live {
            debug!(from = %me, to = %target, "Target still lists current user, restoring local edge");
            let mut saga = Saga::new(self.store.as_ref(), "add_friend_restore");
            self.put_edge(&mut saga, target).await?;
            self.settle_crossed_requests(target).await?;
            self.emit(SocialEvent::FriendAdded {
                owner: me.to_string(),
                friend: target.to_string(),
            });
            return Ok(());
        }

        if !self.record_exists(&paths::public_profile(target)).await {
            return Err(ApiError::NotFound(format!("profile {}", target)));
        }

        let identity = self.display_identity().await;
        let correlation_id = self.ctx.correlation_id();
        let timestamp = self.ctx.timestamp();

        let request = FriendRequest {
            id: correlation_id.clone(),
            full_name: identity.full_name.clone(),
            avatar: identity.avatar.clone(),
            owner: self.ctx.owner(),
            timestamp,
            read: false,
        };
        let notification = Notification {
            id: correlation_id.clone(),
            kind: NotificationKind::FriendRequest,
            to: target.to_string(),
            from: self.ctx.owner(),
            full_name: identity.full_name,
            avatar: identity.avatar,
            timestamp,
            read: false,
        };

        let request_path = paths::friend_request(target, me);
        let notification_path = paths::notification(target, &correlation_id);

        let mut saga = Saga::new(self.store.as_ref(), "add_friend");
        self.put_edge(&mut saga, target).await?;
        saga.put(
            &request_path,
            serde_json::to_value(&request)?,
            Compensation::erase_of(&request_path),
        )
        .await?;
        saga.put(
            &notification_path,
            serde_json::to_value(&notification)?,
            Compensation::Nothing,
        )
        .await?;

        info!(from = %me, to = %target, id = %correlation_id, "Friend request sent");
        self.settle_crossed_requests(target).await?;
        self.emit(SocialEvent::FriendRequested {
            from: me.to_string(),
            to: target.to_string(),
            correlation_id,
        });
        Ok(())
    }

    /// Delete the current user's edge to `username`; the other direction
    /// is theirs to remove
    pub async fn remove_friend(&self, input: UsernameInput) -> Result<()> {
        let target = self.counterpart(&input.username, "remove")?;
        let me = self.alias();

        if self.edge_state(me, target).await != EdgeState::Live {
            return Err(ApiError::conflict(format!("{} is not a friend", target)));
        }

        let mut saga = Saga::new(self.store.as_ref(), "remove_friend");
        saga.erase(&paths::friends(me), target, Compensation::Nothing)
            .await?;

        info!(owner = %me, friend = %target, "Friend removed");
        self.emit(SocialEvent::FriendRemoved {
            owner: me.to_string(),
            friend: target.to_string(),
        });
        Ok(())
    }

    /// Accept the pending request from `username`
    pub async fn accept_friend(&self, input: UsernameInput) -> Result<()> {
        let requester = self.counterpart(&input.username, "accept")?;
        let me = self.alias();
        self.require_incoming_request(requester).await?;

        let identity = self.display_identity().await;
        let mut saga = Saga::new(self.store.as_ref(), "accept_friend");
        let edge_written = if self.edge_state(me, requester).await == EdgeState::Live {
            false
        } else {
            self.put_edge(&mut saga, requester).await?;
            true
        };
        self.put_response(&mut saga, requester, FriendResponseKind::Accepted, &identity)
            .await?;
        saga.erase(&paths::friend_requests_to(me), requester, Compensation::Nothing)
            .await?;

        info!(owner = %me, requester = %requester, "Friend request accepted");
        if edge_written {
            self.emit(SocialEvent::FriendAdded {
                owner: me.to_string(),
                friend: requester.to_string(),
            });
        }
        self.emit(SocialEvent::FriendResponded {
            from: me.to_string(),
            to: requester.to_string(),
            kind: FriendResponseKind::Accepted,
        });
        Ok(())
    }

    /// Reject the pending request from `username`
    pub async fn reject_friend(&self, input: UsernameInput) -> Result<()> {
        let requester = self.counterpart(&input.username, "reject")?;
        let me = self.alias();
        self.require_incoming_request(requester).await?;

        let identity = self.display_identity().await;
        let mut saga = Saga::new(self.store.as_ref(), "reject_friend");
        self.put_response(&mut saga, requester, FriendResponseKind::Rejected, &identity)
            .await?;
        saga.erase(&paths::friend_requests_to(me), requester, Compensation::Nothing)
            .await?;

        info!(owner = %me, requester = %requester, "Friend request rejected");
        self.emit(SocialEvent::FriendResponded {
            from: me.to_string(),
            to: requester.to_string(),
            kind: FriendResponseKind::Rejected,
        });
        Ok(())
    }

    // =========================================================================
    // Housekeeping
    // =========================================================================

    /// Withdraw the current user's outgoing requests
    pub async fn clear_friend_request(&self, input: UsernamesInput) -> Result<()> {
        self.run_batch("clear_friend_request", input, |username| async move {
            self.clear_one_request(&username).await
        })
        .await
    }

    /// Delete responses addressed to the current user
    pub async fn clear_friend_response(&self, input: UsernamesInput) -> Result<()> {
        self.run_batch("clear_friend_response", input, |username| async move {
            self.clear_one_response(&username).await
        })
        .await
    }

    /// Flag incoming requests as read
    pub async fn read_friend_requests(&self, input: UsernamesInput) -> Result<()> {
        self.run_batch("read_friend_requests", input, |username| async move {
            let path = paths::friend_request(self.alias(), &username);
            self.flag_read(&path, &username).await
        })
        .await
    }

    /// Flag incoming responses as read
    pub async fn read_friend_responses(&self, input: UsernamesInput) -> Result<()> {
        self.run_batch("read_friend_responses", input, |username| async move {
            let path = paths::friend_response(self.alias(), &username);
            self.flag_read(&path, &username).await
        })
        .await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Relationship between the current user and `username`
    pub async fn friendship_state(&self, input: UsernameInput) -> Result<FriendshipState> {
        let target = self.counterpart(&input.username, "inspect")?;
        let me = self.alias();

        let facts = RelationshipFacts {
            local_edge: self.edge_state(me, target).await,
            reverse_edge: self.edge_state(target, me).await,
            incoming_request: self.record_exists(&paths::friend_request(me, target)).await,
            outgoing_request: self.record_exists(&paths::friend_request(target, me)).await,
        };
        let state = facts.state();
        trace!(owner = %me, target = %target, facts = ?facts, state = ?state, "Derived friendship state");
        Ok(state)
    }

    /// Incoming friend requests
    pub async fn get_friend_requests(&self) -> Result<Vec<FriendRequest>> {
        self.records_under(&paths::friend_requests_to(self.alias())).await
    }

    /// Responses to the current user's requests
    pub async fn get_friend_responses(&self) -> Result<Vec<FriendResponse>> {
        self.records_under(&paths::friend_responses_to(self.alias())).await
    }

    /// Aliases with a live edge in the current user's friend set
    pub async fn get_friend_aliases(&self) -> Result<Vec<String>> {
        let set = self
            .store
            .read_once_at(
                &paths::friends(self.alias()),
                ReadOptions::settle(self.config().friends_wait()),
            )
            .await;
        Ok(set
            .as_ref()
            .map(|set| live_entries(set).map(|(key, _)| key.clone()).collect())
            .unwrap_or_default())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn counterpart<'i>(&self, username: &'i str, action: &str) -> Result<&'i str> {
        paths::validate_segment("username", username)?;
        if self.ctx.is_self(username) {
            return Err(ApiError::validation(format!("cannot {} self", action)));
        }
        Ok(username)
    }

    pub(crate) async fn edge_state(&self, owner: &str, target: &str) -> EdgeState {
        let set = self.read_check(&paths::friends(owner)).await;
        match set.as_ref().and_then(|set| set.get(target)) {
            None => EdgeState::Absent,
            Some(Value::Null) => EdgeState::Tombstoned,
            Some(_) => EdgeState::Live,
        }
    }

    async fn require_incoming_request(&self, requester: &str) -> Result<()> {
        if self
            .record_exists(&paths::friend_request(self.alias(), requester))
            .await
        {
            Ok(())
        } else {
            Err(ApiError::conflict(format!(
                "no pending friend request from {}",
                requester
            )))
        }
    }

    /// Drop requests left pending between two users who both hold a live
    /// edge, as happens when their `add_friend` calls interleave
    async fn settle_crossed_requests(&self, target: &str) -> Result<()> {
        let me = self.alias();
        if self.edge_state(target, me).await != EdgeState::Live {
            return Ok(());
        }
        let incoming = self.record_exists(&paths::friend_request(me, target)).await;
        let outgoing = self.record_exists(&paths::friend_request(target, me)).await;
        if !incoming && !outgoing {
            return Ok(());
        }

        debug!(owner = %me, friend = %target, incoming, outgoing, "Consuming crossed friend requests");
        let mut saga = Saga::new(self.store.as_ref(), "settle_crossed_requests");
        if incoming {
            saga.erase(&paths::friend_requests_to(me), target, Compensation::Nothing)
                .await?;
        }
        if outgoing {
            saga.erase(&paths::friend_requests_to(target), me, Compensation::Nothing)
                .await?;
        }
        Ok(())
    }

    async fn put_edge(&self, saga: &mut Saga<'_, S>, target: &str) -> Result<()> {
        let path = paths::friend_edge(self.alias(), target);
        saga.put(
            &path,
            reference(&paths::public_profile(target)),
            Compensation::erase_of(&path),
        )
        .await
    }

    async fn put_response(
        &self,
        saga: &mut Saga<'_, S>,
        to: &str,
        kind: FriendResponseKind,
        identity: &DisplayIdentity,
    ) -> Result<()> {
        let response = FriendResponse {
            id: self.ctx.correlation_id(),
            full_name: identity.full_name.clone(),
            avatar: identity.avatar.clone(),
            owner: self.ctx.owner(),
            timestamp: self.ctx.timestamp(),
            kind,
            read: false,
        };
        let path = paths::friend_response(to, self.alias());
        saga.put(
            &path,
            serde_json::to_value(&response)?,
            Compensation::erase_of(&path),
        )
        .await
    }

    async fn clear_one_request(&self, username: &str) -> Result<()> {
        let me = self.alias();
        let path = paths::friend_request(username, me);
        let previous = self
            .read_check(&path)
            .await
            .ok_or_else(|| ApiError::conflict(format!("no pending friend request to {}", username)))?;

        let mut saga = Saga::new(self.store.as_ref(), "clear_friend_request");
        saga.erase(
            &paths::friend_requests_to(username),
            me,
            Compensation::Restore {
                path: path.clone(),
                value: previous,
            },
        )
        .await?;
        if self.edge_state(me, username).await == EdgeState::Live {
            saga.erase(&paths::friends(me), username, Compensation::Nothing)
                .await?;
        }

        self.emit(SocialEvent::FriendRequestCleared {
            owner: me.to_string(),
            username: username.to_string(),
        });
        Ok(())
    }

    async fn clear_one_response(&self, username: &str) -> Result<()> {
        let me = self.alias();
        let path = paths::friend_response(me, username);
        let previous = self
            .read_check(&path)
            .await
            .ok_or_else(|| ApiError::conflict(format!("no friend response from {}", username)))?;

        let mut saga = Saga::new(self.store.as_ref(), "clear_friend_response");
        saga.erase(
            &paths::friend_responses_to(me),
            username,
            Compensation::Restore {
                path: path.clone(),
                value: previous,
            },
        )
        .await?;

        self.emit(SocialEvent::FriendResponseCleared {
            owner: me.to_string(),
            username: username.to_string(),
        });
        Ok(())
    }

    async fn flag_read(&self, path: &str, username: &str) -> Result<()> {
        if !self.record_exists(path).await {
            return Err(ApiError::conflict(format!("nothing to mark read from {}", username)));
        }
        let ack = self.store.put_at(path, json!({ "read": true })).await;
        match ack.err {
            None => Ok(()),
            Some(message) => Err(ApiError::StoreWrite {
                path: path.to_string(),
                message,
            }),
        }
    }

    async fn display_identity(&self) -> DisplayIdentity {
        let profile = self.read_check(&paths::private_profile(self.alias())).await;
        let field = |name: &str| {
            profile
                .as_ref()
                .and_then(|p| p.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        DisplayIdentity {
            full_name: field("fullName"),
            avatar: field("avatar"),
        }
    }

    async fn records_under<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let set = self
            .store
            .read_live_at(path, ReadOptions::settle(self.config().friends_wait()))
            .await;
        let Some(set) = set else {
            return Ok(Vec::new());
        };

        Ok(live_entries(&set)
            .filter(|(_, value)| !is_unresolved_marker(value))
            .filter_map(|(key, value)| match serde_json::from_value::<T>(value.clone()) {
                Ok(record) => Some(record),
                Err(err) => {
                    trace!(path = %path, key = %key, error = %err, "Skipping malformed record");
                    None
                }
            })
            .collect())
    }

    /// Apply `item` to every username, collecting per-item failures
    async fn run_batch<F, Fut>(&self, op: &'static str, input: UsernamesInput, item: F) -> Result<()>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut succeeded = 0;
        let mut failures = Vec::new();

        for username in input.usernames {
            let outcome = match paths::validate_segment("username", &username) {
                Ok(()) => item(username.clone()).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => succeeded += 1,
                Err(err) => {
                    debug!(op, username = %username, error = %err, "Batch item failed");
                    failures.push(ItemFailure {
                        username,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            warn!(op, succeeded, failed = failures.len(), "Batch finished with failures");
            Err(ApiError::PartialBatchFailure {
                succeeded,
                failures,
            })
        }
    }
}
