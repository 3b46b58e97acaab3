use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};

use super::AppState;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session_token";

/// Signed-in participant, resolved from the session cookie or a bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub participant_id: i64,
}

fn session_token(parts: &Parts) -> Option<String> {
    let from_cookie = parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string());

    from_cookie
        .or_else(|| {
            parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::to_string)
        })
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or(AppError::Unauthorized)?;
        let participant_id = state
            .sessions
            .validate(&token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(Session { participant_id })
    }
}
