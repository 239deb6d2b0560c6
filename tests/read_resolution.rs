//! Post reads under replication lag

use async_trait::async_trait;
use graph_social_sdk::store::{reference, Ack, GraphStore, MemoryGraphStore, ReadOptions};
use graph_social_sdk::{AccountContext, ApiError, ClientConfig, SocialClient};
use serde_json::{json, Value};
use std::sync::Arc;

const POST_PATH: &str = "2024.3.7.public.alice.p-1";

fn config(deadline_ms: u64, accept_partial: bool) -> ClientConfig {
    ClientConfig {
        resolve_deadline_ms: deadline_ms,
        accept_partial_on_timeout: accept_partial,
        ..ClientConfig::for_local()
    }
}

fn client<S: GraphStore>(store: Arc<S>, config: ClientConfig) -> SocialClient<S> {
    SocialClient::with_config(store, AccountContext::new("viewer", "pk-viewer").unwrap(), config)
}

/// Post with like `a` still replicating and like `b` present
async fn seeded_store(a_target: &str) -> Arc<MemoryGraphStore> {
    let store = Arc::new(MemoryGraphStore::new());
    store.put_at("remote.likes.a", json!({"owner": "a"})).await;
    store
        .put_at(
            &format!("posts.{}", POST_PATH),
            json!({
                "owner": {"alias": "alice", "pub": "pk-alice"},
                "timestamp": 1,
                "text": "hello",
                "likes": {
                    "a": reference(a_target),
                    "b": {"owner": "b"}
                }
            }),
        )
        .await;
    store
}

fn owners(post: &graph_social_sdk::Post) -> Vec<String> {
    post.likes.iter().map(|like| like.owner.clone()).collect()
}

#[tokio::test]
async fn test_fast_read_waits_for_lagging_like() {
    let store = seeded_store("remote.likes.a").await;
    store.withhold("remote.likes.a", 3).await;
    let viewer = client(store, config(2_000, true));

    let mut lengths = Vec::new();
    let post = viewer
        .fast_get_post_by_path_observed(POST_PATH, |pass| {
            assert!(owners(pass).contains(&"b".to_string()));
            lengths.push(pass.likes.len());
        })
        .await
        .unwrap();

    assert_eq!(owners(&post), vec!["a", "b"]);
    assert_eq!(lengths, vec![1, 1, 1, 2]);
    assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_never_resolving_like_is_left_out_or_times_out() {
    let store = seeded_store("remote.likes.never").await;

    let lenient = client(store.clone(), config(80, true));
    let post = lenient.fast_get_post_by_path(POST_PATH).await.unwrap();
    assert_eq!(owners(&post), vec!["b"]);

    let post = lenient.get_post_by_path(POST_PATH).await.unwrap().unwrap();
    assert_eq!(owners(&post), vec!["b"]);

    let strict = client(store, config(80, false));
    let err = strict.fast_get_post_by_path(POST_PATH).await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout { .. }), "{err}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_missing_post_is_not_found_not_timeout() {
    let viewer = client(Arc::new(MemoryGraphStore::new()), config(200, true));

    let err = viewer.fast_get_post_by_path(POST_PATH).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)), "{err}");

    assert!(viewer.get_post_by_path(POST_PATH).await.unwrap().is_none());

    let err = viewer.get_post_by_id("p-1").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

/// Store that never answers a read
struct StalledStore;

#[async_trait]
impl GraphStore for StalledStore {
    async fn put_at(&self, _path: &str, _value: Value) -> Ack {
        Ack::ok()
    }

    async fn read_once_at(&self, _path: &str, _opts: ReadOptions) -> Option<Value> {
        std::future::pending().await
    }

    async fn read_live_at(&self, _path: &str, _opts: ReadOptions) -> Option<Value> {
        std::future::pending().await
    }

    async fn erase_key_at(&self, _path: &str, _key: &str) -> Ack {
        Ack::ok()
    }
}

#[tokio::test]
async fn test_silent_store_times_out() {
    let viewer = client(Arc::new(StalledStore), config(50, true));

    let err = viewer.fast_get_post_by_path(POST_PATH).await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout { .. }), "{err}");

    let err = viewer.get_post_by_path(POST_PATH).await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout { .. }), "{err}");
}

/// Answers existence checks slowly; live reads come from the inner store
struct SlowCheckStore {
    inner: MemoryGraphStore,
    check_delay: std::time::Duration,
}

#[async_trait]
impl GraphStore for SlowCheckStore {
    async fn put_at(&self, path: &str, value: Value) -> Ack {
        self.inner.put_at(path, value).await
    }

    async fn read_once_at(&self, path: &str, opts: ReadOptions) -> Option<Value> {
        tokio::time::sleep(self.check_delay).await;
        self.inner.read_once_at(path, opts).await
    }

    async fn read_live_at(&self, path: &str, opts: ReadOptions) -> Option<Value> {
        self.inner.read_live_at(path, opts).await
    }

    async fn erase_key_at(&self, path: &str, key: &str) -> Ack {
        self.inner.erase_key_at(path, key).await
    }
}

#[tokio::test]
async fn test_lenient_read_stays_within_deadline() {
    let inner = MemoryGraphStore::new();
    inner
        .put_at(
            &format!("posts.{}", POST_PATH),
            json!({
                "owner": "alice",
                "timestamp": 1,
                "likes": {"a": reference("remote.likes.never"), "b": {"owner": "b"}}
            }),
        )
        .await;
    let store = Arc::new(SlowCheckStore {
        inner,
        check_delay: std::time::Duration::from_millis(180),
    });
    let viewer = client(store, config(200, true));

    let started = std::time::Instant::now();
    let post = viewer.get_post_by_path(POST_PATH).await.unwrap().unwrap();
    let took = started.elapsed();

    assert_eq!(owners(&post), vec!["b"]);
    assert!(took < std::time::Duration::from_millis(260), "took {took:?}");
}

#[tokio::test]
async fn test_comments_and_media_are_assembled() {
    let store = Arc::new(MemoryGraphStore::new());
    store
        .put_at(
            &format!("posts.{}", POST_PATH),
            json!({
                "owner": "alice",
                "timestamp": 1,
                "comments": {
                    "c1": {"owner": "bob", "text": "first", "likes": {"alice": {"owner": "alice"}}},
                    "c2": null
                },
                "media": {"0": {"hash": "h0", "type": "image/png"}, "1": {}}
            }),
        )
        .await;

    let post = client(store, config(200, false))
        .fast_get_post_by_path(POST_PATH)
        .await
        .unwrap();
    assert_eq!(post.post_id, "p-1");
    assert_eq!(post.comments.len(), 1);
    assert_eq!(post.comments[0].comment_id, "c1");
    assert_eq!(post.comments[0].likes.len(), 1);
    assert_eq!(post.media.len(), 1);
}
