use crate::{db::PgStore, error::AppResult};

/// Resolves a session token to the signed-in participant
#[async_trait::async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, token: &str) -> AppResult<Option<i64>>;
}

#[async_trait::async_trait]
impl SessionValidator for PgStore {
    async fn validate(&self, token: &str) -> AppResult<Option<i64>> {
        let participant_id = sqlx::query_scalar::<_, i64>(
            "SELECT participant_id FROM sessions WHERE token = $1 AND expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(participant_id)
    }
}
