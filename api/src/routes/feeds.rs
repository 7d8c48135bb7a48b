use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use bookforum_shared::{FeedView, FeedWindow, PostView};
use futures::Stream;
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use super::status_for;
use crate::feed::FeedSynchronizer;
use crate::sessions::Feed;
use crate::store::PAGE_SIZE;
use crate::{auth, AppState};

const FIRST_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

// ── Helpers ──

fn view(id: Uuid, window: &FeedWindow, viewer: Option<&str>) -> FeedView {
    FeedView {
        id: id.to_string(),
        posts: window
            .posts
            .iter()
            .map(|post| PostView {
                author_level: auth::level_for_interactions(post.interactions),
                viewer_vote: viewer.and_then(|u| post.vote_of(u)),
                post: post.clone(),
            })
            .collect(),
        has_more: window.has_more,
        loading: window.loading,
    }
}

async fn lookup(state: &AppState, id: Uuid) -> Result<Feed, StatusCode> {
    state.feeds.get(&id).await.ok_or(StatusCode::NOT_FOUND)
}

// ── Handlers ──

/// POST /api/feeds — open a live feed session
pub async fn open_feed(State(state): State<AppState>, headers: HeaderMap) -> Json<FeedView> {
    let viewer = auth::current_user(&headers, &state.jwt_secret);
    let id = Uuid::new_v4();

    let feed = Arc::new(FeedSynchronizer::new(Arc::clone(&state.store), PAGE_SIZE));
    let mut updates = feed.subscribe();
    state.feeds.insert(id, Arc::clone(&feed)).await;

    if tokio::time::timeout(FIRST_SNAPSHOT_TIMEOUT, updates.changed())
        .await
        .is_err()
    {
        warn!(feed_id = %id, "no snapshot within timeout; returning empty window");
    }

    info!(feed_id = %id, "feed opened");
    Json(view(id, &feed.window(), viewer.as_deref()))
}

/// GET /api/feeds/:id
pub async fn get_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<FeedView>, StatusCode> {
    let viewer = auth::current_user(&headers, &state.jwt_secret);
    let feed = lookup(&state, id).await?;
    Ok(Json(view(id, &feed.window(), viewer.as_deref())))
}

/// GET /api/feeds/:id/events — one `window` event per change
pub async fn feed_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, StatusCode> {
    let viewer = auth::current_user(&headers, &state.jwt_secret);
    let feed = lookup(&state, id).await?;

    let events = WatchStream::new(feed.subscribe()).map(move |window| {
        Event::default()
            .event("window")
            .json_data(view(id, &window, viewer.as_deref()))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// POST /api/feeds/:id/more
pub async fn load_more(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<FeedView>, StatusCode> {
    let viewer = auth::current_user(&headers, &state.jwt_secret);
    let feed = lookup(&state, id).await?;

    let window = feed.load_more().await.map_err(|e| status_for(&e))?;
    Ok(Json(view(id, &window, viewer.as_deref())))
}

/// DELETE /api/feeds/:id
pub async fn close_feed(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.feeds.remove(&id).await {
        info!(feed_id = %id, "feed closed");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
