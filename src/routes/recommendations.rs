use axum::{extract::State, Json};

use crate::{
    api::AppState, db::CacheKey, error::AppResult, models::RecommendationView,
    services::selector::today_utc,
};

const VIEW_CACHE_TTL: u64 = 3_600; // 1 hour

/// Today's recommendation with its display fields, or `null` before the job ran
pub async fn today(State(state): State<AppState>) -> AppResult<Json<Option<RecommendationView>>> {
    let date = today_utc();
    let key = CacheKey::RecommendationView(date);

    if let Some(cache) = &state.cache {
        match cache.get_from_cache::<RecommendationView>(&key).await {
            Ok(Some(hit)) => return Ok(Json(Some(hit))),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Recommendation cache read failed"),
        }
    }

    let view = state.recommendations.get_recommendation_view(date).await?;

    // Only a stored recommendation is cached; the job may still be pending
    if let (Some(cache), Some(view)) = (&state.cache, &view) {
        cache.set_in_background(&key, view, VIEW_CACHE_TTL);
    }

    Ok(Json(view))
}
