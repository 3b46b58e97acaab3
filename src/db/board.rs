use crate::{db::PgStore, error::AppResult, models::BoardPost};

/// Authoritative, composed reads of board posts
#[async_trait::async_trait]
pub trait BoardSource: Send + Sync {
    async fn board_post(&self, id: i64) -> AppResult<Option<BoardPost>>;
}

#[async_trait::async_trait]
impl BoardSource for PgStore {
    async fn board_post(&self, id: i64) -> AppResult<Option<BoardPost>> {
        let post = sqlx::query_as::<_, BoardPost>(
            r#"
            SELECT b.id, b.author_id, p.display_name AS author_name, p.image AS author_image,
                   b.content, b.created_at, b.updated_at
            FROM board_posts b
            JOIN participants p ON p.id = b.author_id
            WHERE b.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }
}
