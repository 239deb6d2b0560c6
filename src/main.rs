//! Graph Social simulator
//!
//! Runs a scripted two-account scenario against the in-memory graph store,
//! with replication lag injected on the records the scenario reads back.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default timings
//! graph-social-sim
//!
//! # Use timings from a config file
//! graph-social-sim --config sim.toml
//!
//! # Keep a remote like unresolved for more reads
//! graph-social-sim --lag-reads 4 --posts 12 --page-size 5
//! ```

use clap::Parser;
use graph_social_sdk::events::spawn_logging_listener;
use graph_social_sdk::{
    AccountContext, ClientConfig, CreatePostInput, CreateProfileInput, MemoryGraphStore,
    NotificationEvent, NotificationState, PageRequest, ProfileDetails, SocialClient,
    UsernameInput, UsernamesInput,
};
use graph_social_sdk::store::reference;
use graph_social_sdk::GraphStore;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "graph-social-sim")]
#[command(about = "Simulate two accounts on an eventually-consistent graph store")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "GRAPH_SOCIAL_CONFIG")]
    config: Option<PathBuf>,

    /// Use short local timings instead of production ones
    #[arg(long, env = "GRAPH_SOCIAL_LOCAL")]
    local: bool,

    /// Number of reads a remote like stays unresolved for
    #[arg(long, default_value_t = 2)]
    lag_reads: usize,

    /// Posts created by the second account
    #[arg(long, default_value_t = 5)]
    posts: usize,

    /// Feed page size
    #[arg(long, default_value_t = 2)]
    page_size: usize,

    /// Write the effective config to this path and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("graph_social_sdk=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = match (&args.config, args.local) {
        (Some(path), _) => ClientConfig::load(path)?,
        (None, true) => ClientConfig::for_local(),
        (None, false) => ClientConfig::default(),
    };

    if let Some(path) = &args.dump_config {
        config.save(path)?;
        info!(path = %path.display(), "Wrote config");
        return Ok(());
    }

    info!(
        initial_settle_ms = config.initial_settle_ms,
        retry_step_ms = config.retry_step_ms,
        deadline_ms = config.resolve_deadline_ms,
        "Starting simulation"
    );

    let store = Arc::new(MemoryGraphStore::new());
    let alice = SocialClient::with_config(
        store.clone(),
        AccountContext::new("alice", "pk-alice")?,
        config,
    );
    let bob = alice.for_account(AccountContext::new("bob", "pk-bob")?);
    let listener = spawn_logging_listener(alice.events().clone());

    for client in [&alice, &bob] {
        let alias = client.context().alias().to_string();
        client
            .create_profile(CreateProfileInput {
                username: alias.clone(),
                details: ProfileDetails {
                    full_name: Some(format!("{} (sim)", alias)),
                    ..Default::default()
                },
            })
            .await?;
    }

    // Friend handshake
    alice.add_friend(UsernameInput::new("bob")).await?;
    let mut notifications = NotificationState::default();
    notifications = graph_social_sdk::reduce(
        notifications,
        NotificationEvent::SyncFriendRequests(bob.get_friend_requests().await?),
    );
    info!(pending = notifications.friend_requests.len(), "Bob synced friend requests");

    bob.read_friend_requests(UsernamesInput::new(["alice"])).await?;
    bob.accept_friend(UsernameInput::new("alice")).await?;
    let state = alice.friendship_state(UsernameInput::new("bob")).await?;
    info!(state = ?state, "Alice sees bob");

    // Posts with lagging likes
    let mut paths = Vec::new();
    for i in 0..args.posts {
        let post = bob
            .create_post(CreatePostInput {
                text: Some(format!("post #{}", i)),
                ..Default::default()
            })
            .await?;
        paths.push(post.post_path);
    }

    if let Some(first) = paths.first() {
        alice.like_post(first).await?;

        // A like from a remote peer that has not replicated yet
        let remote = "remote.likes.carol";
        store.put_at(remote, json!({"owner": "carol"})).await;
        store
            .put_at(&format!("posts.{}.likes.carol", first), reference(remote))
            .await;
        store.withhold(remote, args.lag_reads).await;
        match alice.fast_get_post_by_path(first).await {
            Ok(post) => info!(likes = post.likes.len(), reads = store.read_count(), "Post resolved"),
            Err(err) => warn!(error = %err, "Post did not resolve"),
        }
    }

    // Page through the friends feed
    let mut request = PageRequest::first(args.page_size.max(1));
    loop {
        let page = alice.get_friends_posts_timestamp_ids(request.clone()).await?;
        info!(ids = ?page.post_ids, more = page.can_load_more, "Feed page");
        match (page.can_load_more, page.next_token) {
            (true, Some(token)) => request = PageRequest::after(token, request.limit),
            _ => break,
        }
    }

    let removed = bob.remove_friend(UsernameInput::new("alice")).await;
    info!(ok = removed.is_ok(), "Bob removed alice");
    let state = bob.friendship_state(UsernameInput::new("alice")).await?;
    info!(state = ?state, writes = store.write_count(), "Simulation finished");

    listener.abort();
    Ok(())
}
