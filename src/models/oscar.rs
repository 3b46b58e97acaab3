use serde::{Deserialize, Serialize};

/// One participant's standing in a prediction-game edition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub participant_id: i64,
    pub display_name: String,
    pub image: Option<String>,
    pub correct: i64,
    pub total: i64,
    pub rank: i64,
}

/// Aggregate progress of a prediction-game edition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResultsStats {
    pub total_categories: i64,
    pub announced_categories: i64,
    pub total_predictions: i64,
    pub participants: i64,
}

/// Body of the results snapshot endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSnapshot {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub stats: ResultsStats,
}
