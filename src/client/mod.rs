//! Social client
//!
//! One async method per use case, all acting as the account in the
//! client's [`AccountContext`]. Methods are split by concern:
//! - `profiles`: creating, updating and reading profiles
//! - `posts`: post writes, post reads and feed pages
//! - [`crate::friends`]: the friend-relationship protocol
//!
//! # Example
//!
//! ```rust,ignore
//! use graph_social_sdk::{AccountContext, MemoryGraphStore, SocialClient, UsernameInput};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryGraphStore::new());
//! let alice = SocialClient::new(store.clone(), AccountContext::new("alice", "pk-alice")?);
//! let bob = alice.for_account(AccountContext::new("bob", "pk-bob")?);
//!
//! alice.add_friend(UsernameInput::new("bob")).await?;
//! bob.accept_friend(UsernameInput::new("alice")).await?;
//! ```

mod posts;
mod profiles;

use crate::config::ClientConfig;
use crate::context::AccountContext;
use crate::events::{EventBus, SocialEvent};
use crate::resolve::Resolver;
use crate::store::{is_empty_object, GraphStore, ReadOptions};
use serde_json::Value;
use std::sync::Arc;

/// Data-access client bound to one account
pub struct SocialClient<S: ?Sized> {
    pub(crate) store: Arc<S>,
    pub(crate) ctx: AccountContext,
    config: ClientConfig,
    events: Arc<EventBus>,
}

impl<S: ?Sized> Clone for SocialClient<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ctx: self.ctx.clone(),
            config: self.config.clone(),
            events: Arc::clone(&self.events),
        }
    }
}

impl<S: GraphStore + ?Sized> SocialClient<S> {
    /// Create a client with default timings
    pub fn new(store: Arc<S>, ctx: AccountContext) -> Self {
        Self::with_config(store, ctx, ClientConfig::default())
    }

    pub fn with_config(store: Arc<S>, ctx: AccountContext, config: ClientConfig) -> Self {
        let events = Arc::new(EventBus::with_capacity(config.event_capacity));
        Self {
            store,
            ctx,
            config,
            events,
        }
    }

    /// Publish on a shared event bus instead of a private one
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Client acting as another account on the same store, timings and bus
    pub fn for_account(&self, ctx: AccountContext) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ctx,
            config: self.config.clone(),
            events: Arc::clone(&self.events),
        }
    }

    pub fn context(&self) -> &AccountContext {
        &self.ctx
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    pub(crate) fn alias(&self) -> &str {
        self.ctx.alias()
    }

    pub(crate) fn resolver(&self) -> Resolver<'_, S> {
        Resolver::from_config(self.store.as_ref(), &self.config)
    }

    pub(crate) fn emit(&self, event: SocialEvent) {
        self.events.emit(event);
    }

    /// Shallow read used by existence checks
    pub(crate) async fn read_check(&self, path: &str) -> Option<Value> {
        self.store
            .read_once_at(path, ReadOptions::settle(self.config.check_wait()))
            .await
    }

    /// Whether a record carrying data exists at `path`
    pub(crate) async fn record_exists(&self, path: &str) -> bool {
        self.read_check(path)
            .await
            .map(|value| !is_empty_object(&value))
            .unwrap_or(false)
    }
}
