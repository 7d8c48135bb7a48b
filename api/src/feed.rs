//! Live, paginated window over the newest posts.
//!
//! A [`FeedSynchronizer`] owns exactly one [`FeedWindow`]. The live task
//! replaces the whole window on every store snapshot; [`FeedSynchronizer::load_more`]
//! appends the next page after the cursor. The two are not serialized against
//! each other, so a replacement landing after an append discards the append.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use bookforum_shared::{FeedCursor, FeedWindow, Post};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::reconcile::CommentReconciler;
use crate::store::{self, DocumentStore, LiveQuery, PageQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Subscribed,
    /// Subscribed with a "load more" in flight.
    Extending,
    Unsubscribed,
}

struct Shared<S> {
    store: Arc<S>,
    reconciler: CommentReconciler<S>,
    page_size: usize,
    window: watch::Sender<FeedWindow>,
    loading: AtomicBool,
    closed: AtomicBool,
}

pub struct FeedSynchronizer<S: DocumentStore> {
    shared: Arc<Shared<S>>,
    live: OnceLock<JoinHandle<()>>,
}

impl<S: DocumentStore> FeedSynchronizer<S> {
    pub fn new(store: Arc<S>, page_size: usize) -> Self {
        let (window, _) = watch::channel(FeedWindow::default());
        Self {
            shared: Arc::new(Shared {
                reconciler: CommentReconciler::new(Arc::clone(&store)),
                store,
                page_size,
                window,
                loading: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
            live: OnceLock::new(),
        }
    }

    pub fn state(&self) -> FeedState {
        if self.shared.closed.load(Ordering::Acquire) {
            FeedState::Unsubscribed
        } else if self.live.get().is_none() {
            FeedState::Idle
        } else if self.shared.loading.load(Ordering::Acquire) {
            FeedState::Extending
        } else {
            FeedState::Subscribed
        }
    }

    pub fn window(&self) -> FeedWindow {
        self.shared.window.borrow().clone()
    }

    /// Receivers currently following the window.
    pub fn watchers(&self) -> usize {
        self.shared.window.receiver_count()
    }

    /// Starts the live subscription (once) and returns a receiver that sees
    /// every window change. After teardown the receiver only ever holds the
    /// final window.
    pub fn subscribe(&self) -> watch::Receiver<FeedWindow> {
        let receiver = self.shared.window.subscribe();
        if !self.shared.closed.load(Ordering::Acquire) {
            self.live.get_or_init(|| {
                info!(page_size = self.shared.page_size, "opening live feed");
                tokio::spawn(run_live(Arc::clone(&self.shared)))
            });
        }
        receiver
    }

    /// Appends the next page to the window.
    ///
    /// Silently returns the current window when there is nothing to load:
    /// not subscribed yet, torn down, no cursor, `has_more` false, or another
    /// load already in flight. A failed page query leaves the window as it
    /// was, clears `loading`, and hands the error back so the caller can retry.
    pub async fn load_more(&self) -> Result<FeedWindow, StoreError> {
        let shared = &self.shared;
        let current = self.window();

        if shared.closed.load(Ordering::Acquire) || !current.has_more {
            return Ok(current);
        }
        let Some(cursor) = current.cursor.clone() else {
            return Ok(current);
        };
        if shared
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("load more rejected: already in flight");
            return Ok(current);
        }
        shared.window.send_modify(|w| w.loading = true);

        let result = fetch_page(shared, cursor).await;
        shared.loading.store(false, Ordering::Release);

        if shared.closed.load(Ordering::Acquire) {
            debug!("feed torn down during load more; page discarded");
            shared.window.send_modify(|w| w.loading = false);
            return Ok(self.window());
        }

        match result {
            Ok(posts) => {
                let fetched = posts.len();
                let cursor = posts.last().map(Post::cursor);
                let has_more = fetched == shared.page_size;
                shared.window.send_modify(move |w| {
                    w.posts.extend(posts);
                    if cursor.is_some() {
                        w.cursor = cursor;
                    }
                    w.has_more = has_more;
                    w.loading = false;
                });
                debug!(fetched, has_more, "page appended");
                Ok(self.window())
            }
            Err(e) => {
                shared.window.send_modify(|w| w.loading = false);
                warn!(error = %e, "error loading more posts");
                Err(e)
            }
        }
    }

    /// Cancels the live subscription. In-flight repairs and loads finish on
    /// their own; a load in flight only clears `loading` on its way out.
    pub fn unsubscribe(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.live.get() {
            handle.abort();
        }
        info!("live feed closed");
    }
}

impl<S: DocumentStore> Drop for FeedSynchronizer<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.live.get() {
            handle.abort();
        }
    }
}

async fn fetch_page<S: DocumentStore>(
    shared: &Shared<S>,
    cursor: FeedCursor,
) -> Result<Vec<Post>, StoreError> {
    let query = PageQuery::after(shared.page_size, cursor);
    let page = store::blocking(&shared.store, move |s| s.query_posts(&query)).await?;
    shared.reconciler.reconcile_all(page.posts).await
}

async fn run_live<S: DocumentStore>(shared: Arc<Shared<S>>) {
    let mut live = LiveQuery::open(Arc::clone(&shared.store), shared.page_size);

    while let Some(snapshot) = live.next_snapshot().await {
        let posts = match snapshot {
            Ok(posts) => posts,
            Err(e) => {
                warn!(error = %e, "live query failed; waiting for next change");
                continue;
            }
        };
        let posts = match shared.reconciler.reconcile_all(posts).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!(error = %e, "snapshot reconciliation failed; keeping previous window");
                continue;
            }
        };
        if shared.closed.load(Ordering::Acquire) {
            break;
        }

        let count = posts.len();
        let cursor = posts.last().map(Post::cursor);
        let has_more = count == shared.page_size;
        shared.window.send_modify(move |w| {
            w.posts = posts;
            w.cursor = cursor;
            w.has_more = has_more;
        });
        debug!(count, has_more, "live window replaced");
    }
}
