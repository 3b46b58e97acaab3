use crate::{
    db::PgStore,
    error::AppResult,
    models::{LeaderboardEntry, ResultsStats},
};

/// Prediction-game results for one edition
#[async_trait::async_trait]
pub trait ResultsSource: Send + Sync {
    /// Participants ranked by correct predictions (ties share a rank)
    async fn leaderboard(&self, edition_id: i64) -> AppResult<Vec<LeaderboardEntry>>;

    async fn stats(&self, edition_id: i64) -> AppResult<ResultsStats>;
}

#[async_trait::async_trait]
impl ResultsSource for PgStore {
    async fn leaderboard(&self, edition_id: i64) -> AppResult<Vec<LeaderboardEntry>> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT p.id AS participant_id, p.display_name, p.image,
                   COUNT(r.id) FILTER (WHERE r.winner_nominee_id = pr.nominee_id) AS correct,
                   COUNT(pr.id) AS total,
                   RANK() OVER (
                       ORDER BY COUNT(r.id) FILTER (WHERE r.winner_nominee_id = pr.nominee_id) DESC
                   ) AS rank
            FROM oscar_predictions pr
            JOIN participants p ON p.id = pr.participant_id
            LEFT JOIN oscar_results r
                   ON r.edition_id = pr.edition_id AND r.category_id = pr.category_id
            WHERE pr.edition_id = $1
            GROUP BY p.id, p.display_name, p.image
            ORDER BY rank ASC, p.display_name ASC
            "#,
        )
        .bind(edition_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn stats(&self, edition_id: i64) -> AppResult<ResultsStats> {
        let stats = sqlx::query_as::<_, ResultsStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM oscar_categories WHERE edition_id = $1) AS total_categories,
                (SELECT COUNT(*) FROM oscar_results
                  WHERE edition_id = $1 AND winner_nominee_id IS NOT NULL) AS announced_categories,
                (SELECT COUNT(*) FROM oscar_predictions WHERE edition_id = $1) AS total_predictions,
                (SELECT COUNT(DISTINCT participant_id) FROM oscar_predictions
                  WHERE edition_id = $1) AS participants
            "#,
        )
        .bind(edition_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}
