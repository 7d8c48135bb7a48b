//! Open feed sessions and their eviction.
//!
//! Clients are expected to `DELETE` their feed, but one that simply goes away
//! would otherwise keep a live query running forever. A session is reaped once
//! no request has touched it for the idle timeout and no event stream is
//! attached to its window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::feed::FeedSynchronizer;
use crate::store::SqliteStore;

pub type Feed = Arc<FeedSynchronizer<SqliteStore>>;

pub struct FeedSession {
    feed: Feed,
    touched: Mutex<Instant>,
}

impl FeedSession {
    fn new(feed: Feed) -> Self {
        Self {
            feed,
            touched: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        if let Ok(mut touched) = self.touched.lock() {
            *touched = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.touched
            .lock()
            .map(|touched| touched.elapsed())
            .unwrap_or_default()
    }
}

/// Feed sessions by id, one synchronizer (and window) per session.
#[derive(Clone, Default)]
pub struct FeedRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<FeedSession>>>>,
}

impl FeedRegistry {
    pub async fn insert(&self, id: Uuid, feed: Feed) {
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(FeedSession::new(feed)));
    }

    /// Looks a session up and marks it as used.
    pub async fn get(&self, id: &Uuid) -> Option<Feed> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(id)?;
        session.touch();
        Some(Arc::clone(&session.feed))
    }

    /// Removes a session and tears its feed down.
    pub async fn remove(&self, id: &Uuid) -> bool {
        match self.sessions.write().await.remove(id) {
            Some(session) => {
                session.feed.unsubscribe();
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Tears down every session idle for at least `idle` with no attached
    /// event stream. Returns how many were removed.
    pub async fn reap_idle(&self, idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            if session.feed.watchers() > 0 || session.idle_for() < idle {
                return true;
            }
            session.feed.unsubscribe();
            debug!(feed_id = %id, "idle feed reaped");
            false
        });
        let reaped = before - sessions.len();
        if reaped > 0 {
            info!(reaped, open = sessions.len(), "idle feeds reaped");
        }
        reaped
    }

    /// Sweeps idle sessions every `every` until the returned task is aborted.
    pub fn spawn_reaper(&self, idle: Duration, every: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut sweep = tokio::time::interval(every);
            loop {
                sweep.tick().await;
                registry.reap_idle(idle).await;
            }
        })
    }
}
