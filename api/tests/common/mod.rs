#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue};
use bookforum_api::config::Config;
use bookforum_api::error::StoreError;
use bookforum_api::store::{BatchOp, DocumentStore, Page, PageQuery, SqliteStore};
use bookforum_api::{auth, AppState};
use bookforum_shared::{FeedWindow, NewComment, NewPost, Post};
use tempfile::TempDir;
use tokio::sync::watch;

pub fn temp_store() -> (TempDir, Arc<SqliteStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("forum.db")).unwrap();
    (dir, Arc::new(store))
}

pub fn new_post(n: usize) -> NewPost {
    NewPost {
        title: format!("Discussion {n}"),
        content: "What did everyone think?".into(),
        book_title: "Piranesi".into(),
        book_author: "Susanna Clarke".into(),
        user_name: format!("reader{n}"),
        user_photo: None,
    }
}

/// Creates `count` posts with strictly increasing timestamps; returns them
/// newest first, the order the feed shows them in.
pub fn seed_posts(store: &SqliteStore, count: usize) -> Vec<Post> {
    let mut posts: Vec<Post> = (0..count)
        .map(|n| store.create_post_at(new_post(n), 1_000 + n as i64).unwrap())
        .collect();
    posts.reverse();
    posts
}

pub fn add_comments(store: &SqliteStore, post_id: &str, count: usize) {
    for n in 0..count {
        store
            .add_comment(
                post_id,
                NewComment {
                    user_name: "critic".into(),
                    body: format!("comment {n}"),
                },
            )
            .unwrap();
    }
}

pub fn ids(posts: &[Post]) -> Vec<String> {
    posts.iter().map(|p| p.id.clone()).collect()
}

/// Waits until the window satisfies `pred`.
pub async fn window_where(
    rx: &mut watch::Receiver<FeedWindow>,
    pred: impl FnMut(&FeedWindow) -> bool,
) -> FeedWindow {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for window")
        .expect("feed dropped")
        .clone()
}

/// Polls `check` until it holds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never held");
}

pub const JWT_SECRET: &str = "test-secret";

pub fn app_state(store: Arc<SqliteStore>) -> AppState {
    let config = Config {
        database_url: String::new(),
        jwt_secret: JWT_SECRET.into(),
        cors_origin: "http://localhost".into(),
        bind_addr: "127.0.0.1:0".into(),
        share_base_url: "https://forum.example".into(),
        feed_idle_timeout: Duration::from_secs(300),
    };
    AppState::new(store, &config)
}

pub fn signed_in(user: &str) -> HeaderMap {
    let token = auth::issue_token(user, JWT_SECRET).unwrap();
    let mut headers = HeaderMap::new();
    headers.insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    headers
}

/// Wraps a real store with switchable faults and a write counter.
pub struct FlakyStore {
    pub inner: Arc<SqliteStore>,
    pub fail_paged_queries: AtomicBool,
    pub slow_paged_queries: AtomicBool,
    pub fail_counts: AtomicBool,
    pub fail_commits: AtomicBool,
    pub commits: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<SqliteStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_paged_queries: AtomicBool::new(false),
            slow_paged_queries: AtomicBool::new(false),
            fail_counts: AtomicBool::new(false),
            fail_commits: AtomicBool::new(false),
            commits: AtomicUsize::new(0),
        })
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

fn injected() -> StoreError {
    StoreError::Storage("injected failure".into())
}

impl DocumentStore for FlakyStore {
    fn get_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        self.inner.get_post(id)
    }

    fn query_posts(&self, query: &PageQuery) -> Result<Page, StoreError> {
        if query.after.is_some() && self.fail_paged_queries.load(Ordering::SeqCst) {
            return Err(injected());
        }
        if query.after.is_some() && self.slow_paged_queries.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(200));
        }
        self.inner.query_posts(query)
    }

    fn count_comments(&self, post_id: &str) -> Result<i64, StoreError> {
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.count_comments(post_id)
    }

    fn commit(&self, ops: &[BatchOp]) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.commit(ops)?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changes()
    }
}
