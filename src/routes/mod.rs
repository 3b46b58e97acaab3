use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

pub mod cron;
pub mod feed;
pub mod oscars;
pub mod recommendations;

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
