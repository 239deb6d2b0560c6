//! Post writes and index maintenance

use graph_social_sdk::store::MemoryGraphStore;
use graph_social_sdk::{
    AccountContext, ApiError, ClientConfig, CreatePostInput, ManualClock, Media, SocialClient,
    SocialEvent,
};
use std::sync::Arc;

fn clients() -> (
    Arc<MemoryGraphStore>,
    Arc<ManualClock>,
    SocialClient<MemoryGraphStore>,
    SocialClient<MemoryGraphStore>,
) {
    let store = Arc::new(MemoryGraphStore::new());
    let clock = Arc::new(ManualClock::new(1_709_800_000_000));
    let alice = SocialClient::with_config(
        store.clone(),
        AccountContext::with_clock("alice", "pk-alice", clock.clone()).unwrap(),
        ClientConfig::for_local(),
    );
    let bob = alice.for_account(AccountContext::with_clock("bob", "pk-bob", clock.clone()).unwrap());
    (store, clock, alice, bob)
}

fn text(body: &str) -> CreatePostInput {
    CreatePostInput {
        text: Some(body.into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_post_writes_every_index() {
    let (store, _, alice, _) = clients();
    let mut events = alice.events().subscribe();

    let post = alice
        .create_post(CreatePostInput {
            text: Some("sunset".into()),
            location: Some("beach".into()),
            media: vec![Media {
                hash: Some("h0".into()),
                kind: Some("image/jpeg".into()),
                ..Default::default()
            }],
        })
        .await
        .unwrap();

    assert_eq!(post.owner, "alice");
    assert!(post.post_path.starts_with("2024.3.7.public.alice."));
    assert!(post.post_path.ends_with(&post.post_id));
    assert_eq!(post.media.len(), 1);

    let by_id = store
        .snapshot(&format!("postMetaById.{}", post.post_id))
        .await
        .unwrap();
    assert_eq!(by_id["postPath"], post.post_path.as_str());
    assert!(store
        .snapshot(&format!("postMetasByUser.alice.{}", post.post_id))
        .await
        .is_some());
    let index = store.snapshot("postMetaByIdTimestamp").await.unwrap();
    let key = format!("{}|{}|alice", post.timestamp, post.post_id);
    assert!(index.get(&key).is_some());

    assert!(matches!(
        events.recv().await.unwrap(),
        SocialEvent::PostCreated { ref post_id, .. } if *post_id == post.post_id
    ));

    let read = alice.get_post_by_id(&post.post_id).await.unwrap();
    assert_eq!(read.text.as_deref(), Some("sunset"));
    assert_eq!(read.location.as_deref(), Some("beach"));
}

#[tokio::test]
async fn test_like_unlike_and_comment() {
    let (_, _, alice, bob) = clients();
    let post = alice.create_post(text("hi")).await.unwrap();

    bob.like_post(&post.post_path).await.unwrap();
    alice.like_post(&post.post_path).await.unwrap();
    let comment = bob.comment_post(&post.post_path, "nice").await.unwrap();

    let read = alice.fast_get_post_by_path(&post.post_path).await.unwrap();
    let likers: Vec<&str> = read.likes.iter().map(|l| l.owner.as_str()).collect();
    assert_eq!(likers, vec!["bob", "alice"]);
    assert_eq!(read.comments.len(), 1);
    assert_eq!(read.comments[0].comment_id, comment.comment_id);
    assert_eq!(read.comments[0].text, "nice");

    bob.unlike_post(&post.post_path).await.unwrap();
    let read = alice.fast_get_post_by_path(&post.post_path).await.unwrap();
    assert_eq!(read.likes.len(), 1);

    let err = bob.unlike_post(&post.post_path).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let err = bob.comment_post(&post.post_path, "   ").await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let err = bob.like_post("2024.1.1.public.alice.missing").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_post_paths_by_user_oldest_first() {
    let (_, clock, alice, bob) = clients();
    let first = alice.create_post(text("one")).await.unwrap();
    clock.advance(60_000);
    let second = alice.create_post(text("two")).await.unwrap();
    bob.create_post(text("other")).await.unwrap();

    let paths = bob.get_post_paths_by_user("alice").await.unwrap();
    assert_eq!(paths, vec![first.post_path, second.post_path]);
    assert!(bob.get_post_paths_by_user("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_post_owner_only() {
    let (store, _, alice, bob) = clients();
    let post = alice.create_post(text("bye")).await.unwrap();

    let err = bob.remove_post(&post.post_id).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    alice.remove_post(&post.post_id).await.unwrap();
    assert!(alice.get_post_by_path(&post.post_path).await.unwrap().is_none());
    assert!(alice.get_post_paths_by_user("alice").await.unwrap().is_empty());
    assert!(matches!(
        alice.get_post_by_id(&post.post_id).await,
        Err(ApiError::NotFound(_))
    ));

    let index = store.snapshot("postMetaByIdTimestamp").await.unwrap();
    let key = format!("{}|{}|alice", post.timestamp, post.post_id);
    assert_eq!(index.get(&key), Some(&serde_json::Value::Null));

    let err = alice.remove_post(&post.post_id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_failed_index_write_rolls_back_post() {
    let (store, _, alice, _) = clients();
    store.fail_writes_under("postMetasByUser").await;

    let err = alice.create_post(text("lost")).await.unwrap_err();
    assert!(matches!(err, ApiError::StoreWrite { .. }));

    let by_id = store.snapshot("postMetaById").await.unwrap();
    assert!(by_id.as_object().unwrap().values().all(|v| v.is_null()));
}
