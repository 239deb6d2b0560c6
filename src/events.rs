//! Social events
//!
//! Every successful state change of the friend protocol and of posts is
//! published on a broadcast bus that clients created with
//! [`crate::SocialClient::for_account`] share.

use crate::model::FriendResponseKind;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Events emitted by [`crate::SocialClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocialEvent {
    // Profile events
    ProfileCreated {
        alias: String,
    },
    ProfileUpdated {
        alias: String,
    },

    // Friend events
    FriendRequested {
        from: String,
        to: String,
        correlation_id: String,
    },
    FriendAdded {
        owner: String,
        friend: String,
    },
    FriendResponded {
        from: String,
        to: String,
        kind: FriendResponseKind,
    },
    FriendRemoved {
        owner: String,
        friend: String,
    },
    FriendRequestCleared {
        owner: String,
        username: String,
    },
    FriendResponseCleared {
        owner: String,
        username: String,
    },

    // Post events
    PostCreated {
        post_id: String,
        post_path: String,
        owner: String,
    },
    PostRemoved {
        post_id: String,
        owner: String,
    },
    PostLiked {
        post_path: String,
        owner: String,
    },
    PostUnliked {
        post_path: String,
        owner: String,
    },
    PostCommented {
        post_path: String,
        comment_id: String,
        owner: String,
    },
}

/// Broadcast channel shared by every client of one store
pub struct EventBus {
    sender: broadcast::Sender<SocialEvent>,
}

impl EventBus {
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to current subscribers; none is fine
    pub fn emit(&self, event: SocialEvent) {
        trace!(event = ?event, "Emitting social event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SocialEvent> {
        self.sender.subscribe()
    }
}

fn log_event(event: &SocialEvent) {
    match event {
        SocialEvent::FriendRequested { from, to, correlation_id } => {
            info!(from = %from, to = %to, id = %correlation_id, "Friend request sent");
        }
        SocialEvent::FriendResponded { from, to, kind } => {
            info!(from = %from, to = %to, kind = ?kind, "Friend request answered");
        }
        SocialEvent::FriendRemoved { owner, friend } => {
            info!(owner = %owner, friend = %friend, "Friend edge removed");
        }
        SocialEvent::PostCreated { post_id, owner, .. } => {
            debug!(post_id = %post_id, owner = %owner, "Post created");
        }
        _ => trace!(event = ?event, "Social event"),
    }
}

/// Log every event of `bus` until it closes
pub fn spawn_logging_listener(bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event log fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
