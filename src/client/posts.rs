use super::SocialClient;
use crate::assemble::assemble_post;
use crate::error::{ApiError, Result};
use crate::events::SocialEvent;
use crate::feed::{index_entries, paginate, FeedPage, FeedScope, PageRequest};
use crate::friends::{Compensation, Saga};
use crate::model::{Comment, CreatePostInput, Post, PostMeta};
use crate::paths::{self, TimestampKey};
use crate::resolve::ResolutionProbe;
use crate::store::{is_unresolved_marker, live_entries, reference, GraphStore, ReadOptions};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::{debug, info, trace};

impl<S: GraphStore + ?Sized> SocialClient<S> {
    // =========================================================================
    // Writes
    // =========================================================================

    /// Write a post and its three index entries
    pub async fn create_post(&self, input: CreatePostInput) -> Result<Post> {
        let me = self.ctx.alias();
        let post_id = self.ctx.correlation_id();
        let timestamp = self.ctx.timestamp();
        let post_path = paths::new_post_path(self.ctx.now(), me, &post_id);

        let mut record = Map::new();
        record.insert("owner".into(), serde_json::to_value(self.ctx.owner())?);
        record.insert("timestamp".into(), json!(timestamp));
        if let Some(text) = &input.text {
            record.insert("text".into(), json!(text));
        }
        if let Some(location) = &input.location {
            record.insert("location".into(), json!(location));
        }
        if !input.media.is_empty() {
            // No arrays in the store: media is a set keyed by position
            let media = input
                .media
                .iter()
                .enumerate()
                .map(|(i, m)| -> Result<(String, Value)> {
                    Ok((i.to_string(), serde_json::to_value(m)?))
                })
                .collect::<Result<Map<String, Value>>>()?;
            record.insert("media".into(), Value::Object(media));
        }
        let record = Value::Object(record);

        let meta = serde_json::to_value(PostMeta {
            post_path: post_path.clone(),
            owner: me.to_string(),
            timestamp,
        })?;
        let full_path = paths::post(&post_path);
        let by_id = paths::post_meta_by_id(&post_id);
        let by_user = paths::post_meta_by_user(me, &post_id);
        let index_entry = TimestampKey::new(timestamp, post_id.clone(), me).path();

        let mut saga = Saga::new(self.store.as_ref(), "create_post");
        saga.put(&full_path, record.clone(), Compensation::erase_of(&full_path))
            .await?;
        saga.put(&by_id, meta.clone(), Compensation::erase_of(&by_id))
            .await?;
        saga.put(&by_user, meta, Compensation::erase_of(&by_user))
            .await?;
        saga.put(&index_entry, reference(&by_id), Compensation::Nothing)
            .await?;

        info!(post_id = %post_id, owner = %me, "Post created");
        self.emit(SocialEvent::PostCreated {
            post_id: post_id.clone(),
            post_path: post_path.clone(),
            owner: me.to_string(),
        });
        assemble_post(&post_path, &record)
    }

    /// Tombstone a post of the current user and its index entries
    pub async fn remove_post(&self, post_id: &str) -> Result<()> {
        paths::validate_segment("post id", post_id)?;
        let me = self.ctx.alias();
        let meta = self.post_meta(post_id).await?;
        if meta.owner != me {
            return Err(ApiError::validation(format!(
                "post {} belongs to {}",
                post_id, meta.owner
            )));
        }

        let meta_value = serde_json::to_value(&meta)?;
        let key = TimestampKey::new(meta.timestamp, post_id, me);
        let by_id = paths::post_meta_by_id(post_id);
        let full_path = paths::post(&meta.post_path);
        let (post_parent, post_key) = paths::split_last(&full_path)
            .ok_or_else(|| ApiError::validation(format!("bad post path {}", meta.post_path)))?;

        let mut saga = Saga::new(self.store.as_ref(), "remove_post");
        saga.erase(
            &paths::timestamp_index(),
            &key.to_key(),
            Compensation::Restore {
                path: key.path(),
                value: reference(&by_id),
            },
        )
        .await?;
        saga.erase(
            &paths::post_metas_by_user(me),
            post_id,
            Compensation::Restore {
                path: paths::post_meta_by_user(me, post_id),
                value: meta_value.clone(),
            },
        )
        .await?;
        saga.erase(
            paths::POST_META_BY_ID,
            post_id,
            Compensation::Restore {
                path: by_id.clone(),
                value: meta_value,
            },
        )
        .await?;
        saga.erase(post_parent, post_key, Compensation::Nothing).await?;

        info!(post_id = %post_id, owner = %me, "Post removed");
        self.emit(SocialEvent::PostRemoved {
            post_id: post_id.to_string(),
            owner: me.to_string(),
        });
        Ok(())
    }

    pub async fn like_post(&self, post_path: &str) -> Result<()> {
        self.require_post(post_path).await?;
        let me = self.ctx.alias();
        let path = paths::post_like(post_path, me);
        let like = json!({"owner": me, "timestamp": self.ctx.timestamp()});
        self.write(&path, like).await?;

        self.emit(SocialEvent::PostLiked {
            post_path: post_path.to_string(),
            owner: me.to_string(),
        });
        Ok(())
    }

    pub async fn unlike_post(&self, post_path: &str) -> Result<()> {
        self.require_post(post_path).await?;
        let me = self.ctx.alias();
        if !self.record_exists(&paths::post_like(post_path, me)).await {
            return Err(ApiError::conflict(format!("{} has not liked {}", me, post_path)));
        }
        let likes = paths::post_likes(post_path);
        let ack = self.store.erase_key_at(&likes, me).await;
        if let Some(message) = ack.err {
            return Err(ApiError::StoreWrite {
                path: paths::join(&[&likes, me]),
                message,
            });
        }

        self.emit(SocialEvent::PostUnliked {
            post_path: post_path.to_string(),
            owner: me.to_string(),
        });
        Ok(())
    }

    pub async fn comment_post(&self, post_path: &str, text: &str) -> Result<Comment> {
        if text.trim().is_empty() {
            return Err(ApiError::validation("comment text must not be empty"));
        }
        self.require_post(post_path).await?;
        let me = self.ctx.alias();
        let comment_id = self.ctx.correlation_id();
        let timestamp = self.ctx.timestamp();

        let path = paths::post_comment(post_path, &comment_id);
        self.write(&path, json!({"owner": me, "text": text, "timestamp": timestamp}))
            .await?;

        self.emit(SocialEvent::PostCommented {
            post_path: post_path.to_string(),
            comment_id: comment_id.clone(),
            owner: me.to_string(),
        });
        Ok(Comment {
            comment_id,
            owner: me.to_string(),
            text: text.to_string(),
            timestamp: Some(timestamp),
            likes: Vec::new(),
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Lenient post read: `None` when the post does not exist.
    ///
    /// Elements still replicating when the deadline elapses are left out.
    pub async fn get_post_by_path(&self, post_path: &str) -> Result<Option<Post>> {
        validate_post_path(post_path)?;
        let path = paths::post(post_path);
        let Some(resolution) = self
            .resolver()
            .resolve_lenient(&path, &ResolutionProbe::post())
            .await?
        else {
            return Ok(None);
        };

        match assemble_post(post_path, &resolution.value) {
            Ok(post) => Ok(Some(post)),
            Err(_) if !resolution.settled => Err(ApiError::Timeout {
                path,
                attempts: resolution.attempts,
                waited_ms: resolution.elapsed.as_millis() as u64,
            }),
            Err(err) => Err(err),
        }
    }

    /// Strict post read with retries until every like, comment and media
    /// element has replicated
    pub async fn fast_get_post_by_path(&self, post_path: &str) -> Result<Post> {
        self.fast_get_post_by_path_observed(post_path, |_| {}).await
    }

    /// [`Self::fast_get_post_by_path`], reporting the post assembled on
    /// every pass
    pub async fn fast_get_post_by_path_observed<F>(&self, post_path: &str, mut on_pass: F) -> Result<Post>
    where
        F: FnMut(&Post),
    {
        validate_post_path(post_path)?;
        let path = paths::post(post_path);
        let resolution = self
            .resolver()
            .poll(&path, &ResolutionProbe::post(), |value| {
                if let Ok(post) = assemble_post(post_path, value) {
                    on_pass(&post);
                }
            })
            .await?;

        let timeout = || ApiError::Timeout {
            path: path.clone(),
            attempts: resolution.attempts,
            waited_ms: resolution.elapsed.as_millis() as u64,
        };

        if !resolution.settled && !self.config().accept_partial_on_timeout {
            return Err(timeout());
        }
        match assemble_post(post_path, &resolution.value) {
            Ok(post) => {
                if !resolution.settled {
                    debug!(path = %path, "Returning post with unresolved elements left out");
                }
                Ok(post)
            }
            Err(_) if !resolution.settled => Err(timeout()),
            Err(err) => Err(err),
        }
    }

    pub async fn get_post_by_id(&self, post_id: &str) -> Result<Post> {
        paths::validate_segment("post id", post_id)?;
        let meta = self.post_meta(post_id).await?;
        self.fast_get_post_by_path(&meta.post_path).await
    }

    /// Post paths of `alias`, oldest first
    pub async fn get_post_paths_by_user(&self, alias: &str) -> Result<Vec<String>> {
        paths::validate_segment("alias", alias)?;
        let set = self
            .store
            .read_live_at(
                &paths::post_metas_by_user(alias),
                ReadOptions::settle(self.config().index_wait()),
            )
            .await;
        let Some(set) = set else {
            return Ok(Vec::new());
        };

        let mut metas: Vec<PostMeta> = live_entries(&set)
            .filter(|(_, value)| !is_unresolved_marker(value))
            .filter_map(|(key, value)| match serde_json::from_value(value.clone()) {
                Ok(meta) => Some(meta),
                Err(err) => {
                    trace!(key = %key, error = %err, "Skipping malformed post meta");
                    None
                }
            })
            .collect();
        metas.sort_by_key(|meta: &PostMeta| meta.timestamp);
        Ok(metas.into_iter().map(|meta| meta.post_path).collect())
    }

    /// Feed page of posts by users who are not friends of the current user
    pub async fn get_posts_timestamp_ids(&self, request: PageRequest) -> Result<FeedPage> {
        self.feed_page(request, FeedScope::NonFriends).await
    }

    /// Feed page of posts by the current user's friends
    pub async fn get_friends_posts_timestamp_ids(&self, request: PageRequest) -> Result<FeedPage> {
        self.feed_page(request, FeedScope::Friends).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn feed_page(&self, request: PageRequest, scope: FeedScope) -> Result<FeedPage> {
        let friends: HashSet<String> = self.get_friend_aliases().await?.into_iter().collect();
        let index = self
            .store
            .read_once_at(
                &paths::timestamp_index(),
                ReadOptions::settle(self.config().index_wait()),
            )
            .await;
        let entries = index.as_ref().map(index_entries).unwrap_or_default();

        let page = paginate(&entries, &request, scope, &friends)?;
        debug!(
            scope = ?scope,
            indexed = entries.len(),
            returned = page.post_ids.len(),
            more = page.can_load_more,
            "Feed page computed"
        );
        Ok(page)
    }

    async fn post_meta(&self, post_id: &str) -> Result<PostMeta> {
        let value = self
            .read_check(&paths::post_meta_by_id(post_id))
            .await
            .ok_or_else(|| ApiError::NotFound(format!("post {}", post_id)))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn require_post(&self, post_path: &str) -> Result<()> {
        validate_post_path(post_path)?;
        if self.record_exists(&paths::post(post_path)).await {
            Ok(())
        } else {
            Err(ApiError::NotFound(format!("post {}", post_path)))
        }
    }

    async fn write(&self, path: &str, value: Value) -> Result<()> {
        let ack = self.store.put_at(path, value).await;
        match ack.err {
            None => Ok(()),
            Some(message) => Err(ApiError::StoreWrite {
                path: path.to_string(),
                message,
            }),
        }
    }
}

fn validate_post_path(post_path: &str) -> Result<()> {
    post_path
        .split('.')
        .try_for_each(|segment| paths::validate_segment("post path segment", segment))
}
