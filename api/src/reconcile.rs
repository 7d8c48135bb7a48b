//! Repair-on-read for the cached `comment_count` of a post.

use std::sync::Arc;

use bookforum_shared::Post;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::{self, BatchOp, Counter, DocumentStore, Mutation};

pub struct CommentReconciler<S> {
    store: Arc<S>,
}

impl<S> Clone for CommentReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> CommentReconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns `post` with `comment_count` set to the live number of comment
    /// records. On a mismatch the stored counter is repaired in the
    /// background; the returned post carries the corrected value either way.
    pub async fn reconcile(&self, mut post: Post) -> Result<Post, StoreError> {
        let post_id = post.id.clone();
        let actual = store::blocking(&self.store, move |s| s.count_comments(&post_id)).await?;

        if actual == post.comment_count {
            debug!(post_id = %post.id, count = actual, "comment count in sync");
            return Ok(post);
        }

        info!(
            post_id = %post.id,
            cached = post.comment_count,
            actual,
            "repairing comment count"
        );
        self.spawn_repair(post.id.clone(), actual);
        post.comment_count = actual;
        Ok(post)
    }

    /// Reconciles every post concurrently, keeping input order.
    pub async fn reconcile_all(&self, posts: Vec<Post>) -> Result<Vec<Post>, StoreError> {
        join_all(posts.into_iter().map(|post| self.reconcile(post)))
            .await
            .into_iter()
            .collect()
    }

    fn spawn_repair(&self, post_id: String, count: i64) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let op = BatchOp::new(post_id.clone(), Mutation::Set(Counter::CommentCount, count));
            if let Err(e) = store::blocking(&store, move |s| s.commit(&[op])).await {
                // Left stale in storage until the next reconciliation.
                warn!(%post_id, error = %e, "comment count repair failed");
            }
        });
    }
}
