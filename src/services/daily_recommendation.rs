//! Scheduled daily recommendation
//!
//! One invocation walks `CHECK_EXISTING -> COMPUTE -> PERSIST`. The store's
//! one-per-day constraint is the only concurrency control: a run that loses
//! the insert race reads the winner back and reports it as its own result.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    db::{CandidateSource, RecommendationStore},
    error::{AppError, AppResult},
    models::{MovieCandidate, NewRecommendation, RecommendationType},
    services::{
        metadata::MovieMetadata,
        selector::{select_daily_content, select_from_pool},
    },
};

/// Parseable result of one run; never an error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutcome {
    pub success: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub rec_type: Option<RecommendationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn succeeded(rec_type: RecommendationType) -> Self {
        Self {
            success: true,
            rec_type: Some(rec_type),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            rec_type: None,
            error: Some(error.into()),
        }
    }
}

pub struct RecommendationJob {
    store: Arc<dyn RecommendationStore>,
    candidates: Arc<dyn CandidateSource>,
    metadata: Option<Arc<dyn MovieMetadata>>,
}

impl RecommendationJob {
    pub fn new(
        store: Arc<dyn RecommendationStore>,
        candidates: Arc<dyn CandidateSource>,
        metadata: Option<Arc<dyn MovieMetadata>>,
    ) -> Self {
        Self {
            store,
            candidates,
            metadata,
        }
    }

    /// Ensures a recommendation exists for `date`
    pub async fn run(&self, date: NaiveDate) -> JobOutcome {
        match self.execute(date).await {
            Ok(rec_type) => JobOutcome::succeeded(rec_type),
            Err(e) => {
                tracing::error!(date = %date, error = %e, "Daily recommendation failed");
                JobOutcome::failed(e.to_string())
            }
        }
    }

    async fn execute(&self, date: NaiveDate) -> AppResult<RecommendationType> {
        if let Some(existing) = self.store.get_recommendation(date).await? {
            tracing::info!(
                date = %date,
                rec_type = %existing.rec_type,
                "Recommendation already computed"
            );
            return Ok(existing.rec_type);
        }

        let record = self.compute(date).await?;

        match self.store.create_recommendation(record).await {
            Ok(created) => {
                tracing::info!(
                    date = %date,
                    rec_type = %created.rec_type,
                    target_id = created.target_id,
                    "Daily recommendation created"
                );
                Ok(created.rec_type)
            }
            Err(AppError::DuplicateRecommendation(_)) => {
                let winner = self.store.get_recommendation(date).await?.ok_or_else(|| {
                    AppError::Internal(format!(
                        "Insert conflicted for {} but no recommendation was found",
                        date
                    ))
                })?;
                tracing::info!(
                    date = %date,
                    rec_type = %winner.rec_type,
                    "Concurrent run stored the recommendation first"
                );
                Ok(winner.rec_type)
            }
            Err(e) => Err(e),
        }
    }

    /// Selects the day's item, falling through empty categories in bucket order
    async fn compute(&self, date: NaiveDate) -> AppResult<NewRecommendation> {
        let selection = select_daily_content(date);
        let mut category = selection.category;

        for _ in 0..RecommendationType::ALL.len() {
            match self.pick(category, selection.seed, date).await {
                Ok(record) => return Ok(record),
                Err(AppError::EmptyPool(empty)) => {
                    tracing::warn!(
                        date = %date,
                        category = %empty,
                        "Category has no candidates, trying next"
                    );
                    category = category.next();
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::NotFound(format!(
            "No candidates in any category for {}",
            date
        )))
    }

    /// Fetches only `category`'s pool and builds the record for its pick
    async fn pick(
        &self,
        category: RecommendationType,
        seed: u32,
        date: NaiveDate,
    ) -> AppResult<NewRecommendation> {
        let record = match category {
            RecommendationType::Movie => {
                let pool = self.candidates.movies().await?;
                let movie = select_from_pool(&pool, seed, category)?;
                NewRecommendation {
                    date,
                    rec_type: category,
                    target_id: movie.id,
                    curator_name: None,
                    curator_image: None,
                    metadata: self.enrich(movie).await,
                }
            }
            RecommendationType::List => {
                let pool = self.candidates.lists().await?;
                let list = select_from_pool(&pool, seed, category)?;
                NewRecommendation {
                    date,
                    rec_type: category,
                    target_id: list.id,
                    curator_name: Some(list.creator_name.clone()),
                    curator_image: list.creator_image.clone(),
                    metadata: None,
                }
            }
            RecommendationType::Participant => {
                let pool = self.candidates.participants().await?;
                let participant = select_from_pool(&pool, seed, category)?;
                NewRecommendation {
                    date,
                    rec_type: category,
                    target_id: participant.id,
                    curator_name: Some(participant.display_name.clone()),
                    curator_image: participant.image.clone(),
                    metadata: None,
                }
            }
        };

        Ok(record)
    }

    /// Best-effort TMDB enrichment; a lookup failure never fails the job
    async fn enrich(&self, movie: &MovieCandidate) -> Option<serde_json::Value> {
        let (Some(client), Some(tmdb_id)) = (&self.metadata, movie.tmdb_id) else {
            return None;
        };

        match client.movie_details(tmdb_id).await {
            Ok(details) => Some(details.to_metadata()),
            Err(e) => {
                tracing::warn!(
                    movie_id = movie.id,
                    tmdb_id,
                    error = %e,
                    "Movie enrichment failed, storing without metadata"
                );
                None
            }
        }
    }
}
