use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;

use crate::{
    db::PgStore,
    error::{map_unique_violation, AppError, AppResult},
    models::{NewRecommendation, Recommendation, RecommendationView},
};

/// Persistence for daily recommendations
///
/// At most one record exists per calendar day. `create_recommendation` must
/// fail with [`AppError::DuplicateRecommendation`] rather than overwrite when
/// a record for the same date already exists.
#[async_trait::async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn get_recommendation(&self, date: NaiveDate) -> AppResult<Option<Recommendation>>;

    async fn create_recommendation(&self, record: NewRecommendation) -> AppResult<Recommendation>;

    /// Read-side composition with the target item's display fields
    async fn get_recommendation_view(
        &self,
        date: NaiveDate,
    ) -> AppResult<Option<RecommendationView>>;
}

#[derive(sqlx::FromRow)]
struct RecommendationRow {
    id: i64,
    date: NaiveDate,
    rec_type: String,
    target_id: i64,
    curator_name: Option<String>,
    curator_image: Option<String>,
    metadata: Option<Json<serde_json::Value>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RecommendationRow> for Recommendation {
    type Error = AppError;

    fn try_from(row: RecommendationRow) -> Result<Self, Self::Error> {
        Ok(Recommendation {
            id: row.id,
            date: row.date,
            rec_type: row.rec_type.parse()?,
            target_id: row.target_id,
            curator_name: row.curator_name,
            curator_image: row.curator_image,
            metadata: row.metadata.map(|Json(v)| v),
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecommendationViewRow {
    #[sqlx(flatten)]
    base: RecommendationRow,
    title: Option<String>,
    image_url: Option<String>,
    owner_name: Option<String>,
    owner_image: Option<String>,
}

const SELECT_COLUMNS: &str = r#"
    r.id, r.date, r.type AS rec_type, r.target_id,
    r.curator_name, r.curator_image, r.metadata, r.created_at
"#;

#[async_trait::async_trait]
impl RecommendationStore for PgStore {
    async fn get_recommendation(&self, date: NaiveDate) -> AppResult<Option<Recommendation>> {
        let sql = format!(
            "SELECT {} FROM daily_recommendations r WHERE r.date = $1",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, RecommendationRow>(&sql)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Recommendation::try_from).transpose()
    }

    async fn create_recommendation(&self, record: NewRecommendation) -> AppResult<Recommendation> {
        let date = record.date;
        let row = sqlx::query_as::<_, RecommendationRow>(
            r#"
            INSERT INTO daily_recommendations
                (date, type, target_id, curator_name, curator_image, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, date, type AS rec_type, target_id,
                curator_name, curator_image, metadata, created_at
            "#,
        )
        .bind(record.date)
        .bind(record.rec_type.as_str())
        .bind(record.target_id)
        .bind(record.curator_name)
        .bind(record.curator_image)
        .bind(record.metadata.map(Json))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, || AppError::DuplicateRecommendation(date)))?;

        tracing::info!(
            date = %date,
            rec_type = %row.rec_type,
            target_id = row.target_id,
            "Recommendation stored"
        );

        row.try_into()
    }

    async fn get_recommendation_view(
        &self,
        date: NaiveDate,
    ) -> AppResult<Option<RecommendationView>> {
        let sql = format!(
            r#"
            SELECT {},
                CASE r.type
                    WHEN 'movie' THEN m.title
                    WHEN 'list' THEN l.name
                    ELSE p.display_name
                END AS title,
                CASE r.type
                    WHEN 'movie' THEN m.poster_url
                    WHEN 'participant' THEN p.image
                END AS image_url,
                CASE r.type
                    WHEN 'movie' THEN ms.display_name
                    WHEN 'list' THEN lc.display_name
                    ELSE p.display_name
                END AS owner_name,
                CASE r.type
                    WHEN 'movie' THEN ms.image
                    WHEN 'list' THEN lc.image
                    ELSE p.image
                END AS owner_image
            FROM daily_recommendations r
            LEFT JOIN movies m ON r.type = 'movie' AND m.id = r.target_id
            LEFT JOIN participants ms ON ms.id = m.suggested_by_id
            LEFT JOIN curated_lists l ON r.type = 'list' AND l.id = r.target_id
            LEFT JOIN participants lc ON lc.id = l.creator_id
            LEFT JOIN participants p ON r.type = 'participant' AND p.id = r.target_id
            WHERE r.date = $1
            "#,
            SELECT_COLUMNS
        );

        let row = sqlx::query_as::<_, RecommendationViewRow>(&sql)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> AppResult<RecommendationView> {
            Ok(RecommendationView {
                recommendation: row.base.try_into()?,
                title: row.title,
                image_url: row.image_url,
                owner_name: row.owner_name,
                owner_image: row.owner_image,
            })
        })
        .transpose()
    }
}
