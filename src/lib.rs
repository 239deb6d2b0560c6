//! Graph Social SDK - data layer over an eventually-consistent graph store
//!
//! Client-side data access for a social application whose records live in a
//! schemaless, path-addressed graph store shared by many peers. Writes
//! replicate asynchronously and partially, so a read right after a write may
//! see nested fields that are still reference markers.
//!
//! # Architecture
//!
//! - **Paths**: canonical record paths for profiles, edges, requests,
//!   responses, notifications, posts and post indices
//! - **Resolution**: re-reads a record with a growing settle window until
//!   no marker is left at the depth the caller needs
//! - **Assembly**: turns keyed sets (likes, comments, media) into ordered
//!   arrays without markers or tombstones
//! - **Feed**: resumable pages over the `timestamp|postId|owner` index
//! - **Friends**: guarded friend protocol run as sagas of acknowledged writes
//! - **Notifications**: reducer merging request and response batches
//!
//! # Example
//!
//! ```rust,ignore
//! use graph_social_sdk::{
//!     AccountContext, ClientConfig, MemoryGraphStore, PageRequest, SocialClient, UsernameInput,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryGraphStore::new());
//! let alice = SocialClient::with_config(
//!     store.clone(),
//!     AccountContext::new("alice", "pk-alice")?,
//!     ClientConfig::for_local(),
//! );
//!
//! alice.add_friend(UsernameInput::new("bob")).await?;
//! let page = alice.get_friends_posts_timestamp_ids(PageRequest::first(20)).await?;
//! ```

// Error types
pub mod error;

// Timings and settle windows
pub mod config;

// Acting account
pub mod context;

// Record paths
pub mod paths;

// Store capability and in-memory store
pub mod store;

// Record types
pub mod model;

// Read resolution
pub mod resolve;

// Keyed set assembly
pub mod assemble;

// Feed pagination
pub mod feed;

// Friend protocol
pub mod friends;

// Notification reducer
pub mod notifications;

// Event bus
pub mod events;

// Client facade
pub mod client;

pub use client::SocialClient;
pub use config::ClientConfig;
pub use context::{AccountContext, Clock, ManualClock, OwnerIdentity, SystemClock};
pub use error::{ApiError, ItemFailure, Result};
pub use events::{EventBus, SocialEvent};
pub use feed::{FeedCursor, FeedPage, FeedScope, PageRequest};
pub use friends::FriendshipState;
pub use model::*;
pub use notifications::{reduce, NotificationEvent, NotificationState};
pub use resolve::{Resolution, ResolutionProbe, Resolver, RetrySchedule};
pub use store::{Ack, GraphStore, MemoryGraphStore, ReadOptions};
