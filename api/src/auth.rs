use axum::http::{HeaderMap, StatusCode};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

// ── JWT Claims ──

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: usize,  // expiry (unix timestamp)
}

impl Claims {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            sub: user_id.into(),
            exp: expiry_in_days(30),
        }
    }
}

fn expiry_in_days(days: usize) -> usize {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or_default();
    now + days * 24 * 60 * 60
}

/// Signs a session token. Sign-in itself happens elsewhere; this is what the
/// identity provider hands back.
pub fn issue_token(user_id: &str, jwt_secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        &Claims::new(user_id),
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
}

// ── Extract authenticated user from Authorization header ──

pub fn extract_user_id(headers: &HeaderMap, jwt_secret: &str) -> Result<String, StatusCode> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(data.claims.sub)
}

/// The signed-in user, if any. A missing or invalid token is just "nobody".
pub fn current_user(headers: &HeaderMap, jwt_secret: &str) -> Option<String> {
    extract_user_id(headers, jwt_secret).ok()
}

// ── Levels ──

/// Display level earned from a post's interactions: one level per ten,
/// starting at 1.
pub fn level_for_interactions(interactions: i64) -> u32 {
    (interactions.max(0) / 10) as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_round_trips_through_header() {
        let token = issue_token("reader-42", "secret").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        assert_eq!(current_user(&headers, "secret").as_deref(), Some("reader-42"));
        assert_eq!(current_user(&headers, "other-secret"), None);
    }

    #[test]
    fn missing_header_is_signed_out() {
        assert_eq!(current_user(&HeaderMap::new(), "secret"), None);
        assert_eq!(
            extract_user_id(&HeaderMap::new(), "secret"),
            Err(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn levels() {
        assert_eq!(level_for_interactions(-3), 1);
        assert_eq!(level_for_interactions(0), 1);
        assert_eq!(level_for_interactions(9), 1);
        assert_eq!(level_for_interactions(10), 2);
        assert_eq!(level_for_interactions(125), 13);
    }
}
