use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use bookforum_shared::{CastVote, VoteResponse, VoteStatus};

use super::status_for;
use crate::store::{self, DocumentStore};
use crate::vote::{VoteEngine, VoteOutcome};
use crate::{auth, AppState};

/// POST /api/posts/:id/vote — same direction again retracts
pub async fn cast_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(payload): Json<CastVote>,
) -> Result<Json<VoteResponse>, StatusCode> {
    let Some(user_id) = auth::current_user(&headers, &state.jwt_secret) else {
        return Ok(Json(VoteResponse {
            outcome: VoteStatus::Ignored,
            post: None,
        }));
    };

    let post = store::blocking(&state.store, move |s| s.get_post(&post_id))
        .await
        .map_err(|e| status_for(&e))?
        .ok_or(StatusCode::NOT_FOUND)?;

    let engine = VoteEngine::new(state.store.clone());
    let resp = match engine.vote(&post, payload.direction, Some(&user_id)).await {
        VoteOutcome::Ignored => VoteResponse {
            outcome: VoteStatus::Ignored,
            post: None,
        },
        VoteOutcome::Committed(plan) => VoteResponse {
            outcome: VoteStatus::Committed,
            post: Some(plan.project(&post)),
        },
        VoteOutcome::Failed(_) => VoteResponse {
            outcome: VoteStatus::Failed,
            post: None,
        },
    };

    Ok(Json(resp))
}
