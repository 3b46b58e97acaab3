use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    api::AppState,
    error::AppResult,
    middleware::RequestId,
    services::{cron::run_daily, NotifyWindow},
};

/// Daily scheduler hook: event digest for tomorrow plus today's recommendation
pub async fn daily(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> impl IntoResponse {
    tracing::info!(request_id = %request_id, "Daily cron triggered");

    let report = run_daily(
        &state.event_notifier_job(),
        &state.recommendation_job(),
        Utc::now(),
    )
    .await;

    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(report))
}

pub async fn events(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> impl IntoResponse {
    notify(state, request_id, NotifyWindow::Tomorrow).await
}

pub async fn events_hourly(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> impl IntoResponse {
    notify(state, request_id, NotifyWindow::CurrentHour).await
}

async fn notify(state: AppState, request_id: RequestId, window: NotifyWindow) -> impl IntoResponse {
    tracing::info!(request_id = %request_id, window = ?window, "Event notifier triggered");

    let outcome = state.event_notifier_job().run(window, Utc::now()).await;
    match &outcome.error {
        None => (StatusCode::OK, Json(json!(&outcome))),
        Some(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": error })),
        ),
    }
}

#[derive(Debug, Deserialize)]
pub struct RelayToggle {
    pub enabled: bool,
}

pub async fn relay_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "enabled": state.relays.is_enabled() }))
}

/// Switches the change-feed relays on or off in place
pub async fn set_relay(
    State(state): State<AppState>,
    Json(toggle): Json<RelayToggle>,
) -> AppResult<Json<serde_json::Value>> {
    state.relays.set_enabled(toggle.enabled).await?;
    Ok(Json(json!({ "enabled": state.relays.is_enabled() })))
}
