pub mod feeds;
pub mod posts;
pub mod votes;

use axum::http::StatusCode;

use crate::error::StoreError;

pub(crate) fn status_for(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
