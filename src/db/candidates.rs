use crate::{
    db::PgStore,
    error::AppResult,
    models::{ListCandidate, MovieCandidate, ParticipantCandidate},
};

/// Fresh candidate pools for the daily pick
///
/// Every pool is returned in `id ASC` order. The selector indexes into the
/// pool by position, so this order is what makes a day's pick reproducible.
#[async_trait::async_trait]
pub trait CandidateSource: Send + Sync {
    async fn movies(&self) -> AppResult<Vec<MovieCandidate>>;

    async fn lists(&self) -> AppResult<Vec<ListCandidate>>;

    /// Participants who suggested at least one movie or created at least one list
    async fn participants(&self) -> AppResult<Vec<ParticipantCandidate>>;
}

#[async_trait::async_trait]
impl CandidateSource for PgStore {
    async fn movies(&self) -> AppResult<Vec<MovieCandidate>> {
        let movies = sqlx::query_as::<_, MovieCandidate>(
            "SELECT id, title, tmdb_id, poster_url FROM movies ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(movies)
    }

    async fn lists(&self) -> AppResult<Vec<ListCandidate>> {
        let lists = sqlx::query_as::<_, ListCandidate>(
            r#"
            SELECT l.id, l.name, p.display_name AS creator_name, p.image AS creator_image
            FROM curated_lists l
            JOIN participants p ON p.id = l.creator_id
            ORDER BY l.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(lists)
    }

    async fn participants(&self) -> AppResult<Vec<ParticipantCandidate>> {
        let participants = sqlx::query_as::<_, ParticipantCandidate>(
            r#"
            SELECT p.id, p.display_name, p.image
            FROM participants p
            WHERE EXISTS (SELECT 1 FROM movies m WHERE m.suggested_by_id = p.id)
               OR EXISTS (SELECT 1 FROM curated_lists l WHERE l.creator_id = p.id)
            ORDER BY p.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(participants)
    }
}
