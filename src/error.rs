use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;

use crate::models::RecommendationType;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("No eligible {0} candidates")]
    EmptyPool(RecommendationType),

    #[error("Recommendation for {0} already exists")]
    DuplicateRecommendation(NaiveDate),

    #[error("Notifier error: {0}")]
    UpstreamNotifier(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Relay transport error: {0}")]
    RelayTransport(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::DuplicateRecommendation(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::UpstreamNotifier(msg) | AppError::ExternalApi(msg) => {
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Database(_)
            | AppError::Cache(_)
            | AppError::EmptyPool(_)
            | AppError::RelayTransport(_)
            | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Maps a unique-constraint violation on insert to a domain error, leaving
/// every other database error untouched.
pub fn map_unique_violation(err: sqlx::Error, on_conflict: impl FnOnce() -> AppError) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => on_conflict(),
        _ => AppError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_maps_to_401() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_invalid_input_maps_to_400() {
        let response = AppError::InvalidInput("editionId".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_notifier_maps_to_502() {
        let response = AppError::UpstreamNotifier("telegram down".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_empty_pool_message_names_category() {
        let err = AppError::EmptyPool(RecommendationType::List);
        assert_eq!(err.to_string(), "No eligible list candidates");
    }

    #[test]
    fn test_non_unique_errors_pass_through() {
        let err = map_unique_violation(sqlx::Error::RowNotFound, || {
            AppError::Internal("unreachable".to_string())
        });
        assert!(matches!(err, AppError::Database(sqlx::Error::RowNotFound)));
    }
}
