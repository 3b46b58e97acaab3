use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

/// Content category a daily recommendation points into
///
/// The discriminants are the `seed % 3` buckets used by the selector and
/// must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Movie = 0,
    List = 1,
    Participant = 2,
}

impl RecommendationType {
    /// All categories in bucket order
    pub const ALL: [RecommendationType; 3] = [
        RecommendationType::Movie,
        RecommendationType::List,
        RecommendationType::Participant,
    ];

    /// Maps a bucket index (already reduced mod 3) to its category
    pub fn from_bucket(bucket: u32) -> Self {
        Self::ALL[(bucket % 3) as usize]
    }

    /// The next category in cyclic bucket order
    pub fn next(self) -> Self {
        Self::from_bucket(self as u32 + 1)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::Movie => "movie",
            RecommendationType::List => "list",
            RecommendationType::Participant => "participant",
        }
    }
}

impl Display for RecommendationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(RecommendationType::Movie),
            "list" => Ok(RecommendationType::List),
            "participant" => Ok(RecommendationType::Participant),
            other => Err(AppError::Internal(format!(
                "Unknown recommendation type '{}'",
                other
            ))),
        }
    }
}

/// The single featured content record for one calendar day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: i64,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub rec_type: RecommendationType,
    pub target_id: i64,
    pub curator_name: Option<String>,
    pub curator_image: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a recommendation
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecommendation {
    pub date: NaiveDate,
    pub rec_type: RecommendationType,
    pub target_id: i64,
    pub curator_name: Option<String>,
    pub curator_image: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Recommendation joined with the presentation data renderers need
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationView {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub owner_name: Option<String>,
    pub owner_image: Option<String>,
}

impl RecommendationView {
    /// Curator to display: the explicit override first, then the item's owner
    pub fn display_curator_name(&self) -> Option<&str> {
        self.recommendation
            .curator_name
            .as_deref()
            .or(self.owner_name.as_deref())
    }

    pub fn display_curator_image(&self) -> Option<&str> {
        self.recommendation
            .curator_image
            .as_deref()
            .or(self.owner_image.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(curator: Option<&str>) -> RecommendationView {
        RecommendationView {
            recommendation: Recommendation {
                id: 1,
                date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
                rec_type: RecommendationType::List,
                target_id: 7,
                curator_name: curator.map(str::to_string),
                curator_image: None,
                metadata: None,
                created_at: Utc::now(),
            },
            title: Some("Heist Night".to_string()),
            image_url: None,
            owner_name: Some("Marta".to_string()),
            owner_image: Some("https://img/marta.png".to_string()),
        }
    }

    #[test]
    fn test_bucket_order_is_frozen() {
        assert_eq!(RecommendationType::from_bucket(0), RecommendationType::Movie);
        assert_eq!(RecommendationType::from_bucket(1), RecommendationType::List);
        assert_eq!(
            RecommendationType::from_bucket(2),
            RecommendationType::Participant
        );
        assert_eq!(
            RecommendationType::Participant.next(),
            RecommendationType::Movie
        );
    }

    #[test]
    fn test_type_round_trips_through_str() {
        for t in RecommendationType::ALL {
            assert_eq!(t.as_str().parse::<RecommendationType>().unwrap(), t);
        }
        assert!("series".parse::<RecommendationType>().is_err());
    }

    #[test]
    fn test_curator_override_wins() {
        let view = sample(Some("Club Admin"));
        assert_eq!(view.display_curator_name(), Some("Club Admin"));
        assert_eq!(view.display_curator_image(), Some("https://img/marta.png"));
    }

    #[test]
    fn test_curator_falls_back_to_owner() {
        let view = sample(None);
        assert_eq!(view.display_curator_name(), Some("Marta"));
    }

    #[test]
    fn test_view_serializes_flat_with_type_key() {
        let json = serde_json::to_value(sample(None)).unwrap();
        assert_eq!(json["type"], "list");
        assert_eq!(json["targetId"], 7);
        assert_eq!(json["title"], "Heist Night");
        assert_eq!(json["date"], "2025-03-14");
    }
}
