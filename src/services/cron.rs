//! Combined daily cron run
//!
//! The event digest and the daily recommendation are independent sub-jobs.
//! Each has its own failure boundary; the combined report is successful only
//! when both are, and always carries both partial results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::{
    daily_recommendation::{JobOutcome, RecommendationJob},
    event_notifier::{EventNotifierJob, NotifierOutcome, NotifyWindow},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReport {
    pub success: bool,
    pub events: NotifierOutcome,
    pub recommendation: JobOutcome,
}

pub async fn run_daily(
    events_job: &EventNotifierJob,
    recommendation_job: &RecommendationJob,
    now: DateTime<Utc>,
) -> DailyReport {
    let (events, recommendation) = tokio::join!(
        events_job.run(NotifyWindow::Tomorrow, now),
        recommendation_job.run(now.date_naive()),
    );

    let success = events.success && recommendation.success;
    tracing::info!(
        success,
        events_ok = events.success,
        recommendation_ok = recommendation.success,
        "Daily cron finished"
    );

    DailyReport {
        success,
        events,
        recommendation,
    }
}
