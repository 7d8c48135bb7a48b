//! Document store adapter.
//!
//! The core only talks to storage through [`DocumentStore`]: point reads,
//! ordered cursor pages, comment counts, atomic batches, and a change feed.
//! [`LiveQuery`] turns the change feed into full-snapshot deliveries.

pub mod sqlite;

use std::sync::Arc;

use bookforum_shared::{FeedCursor, Post, VoteDirection};
use tokio::sync::watch;

use crate::error::StoreError;

pub use sqlite::SqliteStore;

pub const POSTS_COLLECTION: &str = "posts";
pub const COMMENTS_COLLECTION: &str = "comments";

/// Posts per live window and per "load more" page.
pub const PAGE_SIZE: usize = 5;

// ── Batch operations ──

/// Integer fields of a post that a batch can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    UpVotes,
    DownVotes,
    Interactions,
    CommentCount,
}

impl Counter {
    pub fn tally(direction: VoteDirection) -> Self {
        match direction {
            VoteDirection::Up => Counter::UpVotes,
            VoteDirection::Down => Counter::DownVotes,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Counter::UpVotes => "up_votes",
            Counter::DownVotes => "down_votes",
            Counter::Interactions => "interactions",
            Counter::CommentCount => "comment_count",
        }
    }

    fn slot(self, post: &mut Post) -> &mut i64 {
        match self {
            Counter::UpVotes => &mut post.up_votes,
            Counter::DownVotes => &mut post.down_votes,
            Counter::Interactions => &mut post.interactions,
            Counter::CommentCount => &mut post.comment_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Set(Counter, i64),
    Increment(Counter, i64),
    /// `voters.{user} = direction`
    SetVoter(String, VoteDirection),
    /// Removes `voters.{user}`.
    DeleteVoter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOp {
    pub post_id: String,
    pub mutation: Mutation,
}

impl BatchOp {
    pub fn new(post_id: impl Into<String>, mutation: Mutation) -> Self {
        Self {
            post_id: post_id.into(),
            mutation,
        }
    }

    /// Applies this operation to an in-memory copy, if it addresses `post`.
    pub fn apply_to(&self, post: &mut Post) {
        if self.post_id != post.id {
            return;
        }
        match &self.mutation {
            Mutation::Set(counter, value) => *counter.slot(post) = *value,
            Mutation::Increment(counter, delta) => *counter.slot(post) += delta,
            Mutation::SetVoter(user, direction) => {
                post.voters.insert(user.clone(), *direction);
            }
            Mutation::DeleteVoter(user) => {
                post.voters.remove(user);
            }
        }
    }
}

// ── Queries ──

/// One page of the posts collection, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub limit: usize,
    pub after: Option<FeedCursor>,
}

impl PageQuery {
    pub fn first(limit: usize) -> Self {
        Self { limit, after: None }
    }

    pub fn after(limit: usize, cursor: FeedCursor) -> Self {
        Self {
            limit,
            after: Some(cursor),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub posts: Vec<Post>,
    /// Derived from the last post; `None` for an empty page.
    pub cursor: Option<FeedCursor>,
}

impl Page {
    pub fn new(posts: Vec<Post>) -> Self {
        let cursor = posts.last().map(Post::cursor);
        Self { posts, cursor }
    }
}

// ── Adapter contract ──

/// Storage operations the feed, reconciler and vote engine depend on.
///
/// Methods are blocking; async callers go through [`blocking`].
pub trait DocumentStore: Send + Sync + 'static {
    fn get_post(&self, id: &str) -> Result<Option<Post>, StoreError>;

    /// Posts ordered by `(created_at desc, id desc)`, strictly after the
    /// cursor when one is given.
    fn query_posts(&self, query: &PageQuery) -> Result<Page, StoreError>;

    /// Number of comment children of a post, counted from the records.
    fn count_comments(&self, post_id: &str) -> Result<i64, StoreError>;

    /// Applies every operation or none of them.
    fn commit(&self, ops: &[BatchOp]) -> Result<(), StoreError>;

    /// Version counter bumped after each committed write to the posts
    /// collection.
    fn changes(&self) -> watch::Receiver<u64>;
}

/// Runs a store call on the blocking pool.
pub async fn blocking<S, T, F>(store: &Arc<S>, f: F) -> Result<T, StoreError>
where
    S: DocumentStore,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(&*store))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

// ── Live subscription ──

/// Standing query over the newest `limit` posts.
///
/// The first call to [`LiveQuery::next_snapshot`] returns immediately; each
/// later call waits until the matched set differs from the last one delivered
/// and returns the whole result set again. Writes to posts outside the top
/// `limit` re-run the query but deliver nothing. Changes that land while a
/// snapshot is being consumed are coalesced, so a consumer only ever moves
/// forward to the newest state. Dropping the query cancels it.
pub struct LiveQuery<S> {
    store: Arc<S>,
    query: PageQuery,
    changes: watch::Receiver<u64>,
    started: bool,
    last: Option<Vec<Post>>,
}

impl<S: DocumentStore> LiveQuery<S> {
    pub fn open(store: Arc<S>, limit: usize) -> Self {
        let changes = store.changes();
        Self {
            store,
            query: PageQuery::first(limit),
            changes,
            started: false,
            last: None,
        }
    }

    /// `None` once the store has shut its change feed. A failed re-query is
    /// delivered as an error and does not count as a delivery.
    pub async fn next_snapshot(&mut self) -> Option<Result<Vec<Post>, StoreError>> {
        loop {
            if self.started && self.changes.changed().await.is_err() {
                return None;
            }
            self.started = true;
            let version = *self.changes.borrow_and_update();

            let query = self.query.clone();
            let posts = match blocking(&self.store, move |s| s.query_posts(&query)).await {
                Ok(page) => page.posts,
                Err(e) => return Some(Err(e)),
            };
            if self.last.as_ref() == Some(&posts) {
                tracing::trace!(version, "posts changed outside the live window");
                continue;
            }

            tracing::debug!(collection = POSTS_COLLECTION, version, "live query delivery");
            self.last = Some(posts.clone());
            return Some(Ok(posts));
        }
    }
}
