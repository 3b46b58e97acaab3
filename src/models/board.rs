use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shared board post composed with its author's presentation fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BoardPost {
    pub id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub author_image: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
