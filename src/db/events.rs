use chrono::{Datelike, NaiveDate};

use crate::{db::PgStore, error::AppResult, models::UpcomingEvent};

/// Read access to the event calendar
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Events on `date`: dated events for that year plus annual recurrences
    async fn events_on(&self, date: NaiveDate) -> AppResult<Vec<UpcomingEvent>>;
}

#[async_trait::async_trait]
impl EventSource for PgStore {
    async fn events_on(&self, date: NaiveDate) -> AppResult<Vec<UpcomingEvent>> {
        let events = sqlx::query_as::<_, UpcomingEvent>(
            r#"
            SELECT id, month, day, year, time, title, description, type AS event_type
            FROM events
            WHERE month = $1 AND day = $2 AND (year IS NULL OR year = $3)
            ORDER BY time ASC NULLS FIRST, id ASC
            "#,
        )
        .bind(date.month() as i32)
        .bind(date.day() as i32)
        .bind(date.year())
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(date = %date, count = events.len(), "Loaded events");

        Ok(events)
    }
}
