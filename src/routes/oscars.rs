use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    api::{AppState, Session},
    error::AppResult,
    models::ResultsSnapshot,
    services::oscar_results::{parse_edition_id, results_snapshot},
};

/// Leaderboard and stats for one edition (signed-in participants only)
pub async fn results(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<ResultsSnapshot>> {
    let edition_id = parse_edition_id(params.get("editionId").map(String::as_str))?;
    tracing::debug!(edition_id, participant_id = session.participant_id, "Results requested");

    let snapshot = results_snapshot(state.results.as_ref(), edition_id).await?;
    Ok(Json(snapshot))
}
