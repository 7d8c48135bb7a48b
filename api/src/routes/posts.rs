use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use bookforum_shared::{Comment, NewComment, NewPost, Post, ShareLink, SharePlatform};
use serde::Deserialize;

use super::status_for;
use crate::store::{self, DocumentStore};
use crate::{auth, share, AppState};

#[derive(Deserialize)]
pub struct ShareParams {
    platform: SharePlatform,
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewPost>,
) -> Result<Json<Post>, StatusCode> {
    auth::extract_user_id(&headers, &state.jwt_secret)?;

    let new = NewPost {
        title: ammonia::clean(&payload.title),
        content: ammonia::clean(&payload.content),
        book_title: ammonia::clean(&payload.book_title),
        book_author: ammonia::clean(&payload.book_author),
        user_name: ammonia::clean(&payload.user_name),
        user_photo: payload.user_photo,
    };
    if new.title.trim().is_empty() || new.content.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let post = tokio::task::spawn_blocking(move || state.store.create_post(new))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| status_for(&e))?;

    Ok(Json(post))
}

/// POST /api/posts/:id/comments
pub async fn add_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(payload): Json<NewComment>,
) -> Result<Json<Comment>, StatusCode> {
    auth::extract_user_id(&headers, &state.jwt_secret)?;
    let body = ammonia::clean(&payload.body);

    if body.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let new = NewComment {
        user_name: ammonia::clean(&payload.user_name),
        body,
    };
    let comment = tokio::task::spawn_blocking(move || state.store.add_comment(&post_id, new))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| status_for(&e))?;

    Ok(Json(comment))
}

/// GET /api/posts/:id/share?platform=twitter
pub async fn share(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Query(params): Query<ShareParams>,
) -> Result<Json<ShareLink>, StatusCode> {
    let post = store::blocking(&state.store, move |s| s.get_post(&post_id))
        .await
        .map_err(|e| status_for(&e))?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(share::share_link(
        &state.share_base_url,
        &post,
        params.platform,
    )))
}
