use serde::{Deserialize, Serialize};

/// A movie eligible for the daily pick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MovieCandidate {
    pub id: i64,
    pub title: String,
    pub tmdb_id: Option<i64>,
    pub poster_url: Option<String>,
}

/// A curated list eligible for the daily pick, with its creator resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ListCandidate {
    pub id: i64,
    pub name: String,
    pub creator_name: String,
    pub creator_image: Option<String>,
}

/// A participant with at least one qualifying contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParticipantCandidate {
    pub id: i64,
    pub display_name: String,
    pub image: Option<String>,
}
