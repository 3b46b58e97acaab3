use crate::{
    db::ResultsSource,
    error::{AppError, AppResult},
    models::ResultsSnapshot,
};

/// Parses the required `editionId` query parameter as a positive integer
pub fn parse_edition_id(raw: Option<&str>) -> AppResult<i64> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidInput("editionId is required".to_string()))?;

    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::InvalidInput(format!(
            "editionId must be a positive integer, got '{}'",
            raw
        ))),
    }
}

/// Leaderboard and stats for one edition, fetched concurrently
pub async fn results_snapshot(
    source: &dyn ResultsSource,
    edition_id: i64,
) -> AppResult<ResultsSnapshot> {
    let (leaderboard, stats) =
        tokio::try_join!(source.leaderboard(edition_id), source.stats(edition_id))?;

    tracing::debug!(
        edition_id,
        entries = leaderboard.len(),
        announced = stats.announced_categories,
        "Results snapshot built"
    );

    Ok(ResultsSnapshot { leaderboard, stats })
}
