use chrono::{DateTime, Days, NaiveDate, Timelike, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    db::EventSource,
    error::AppResult,
    models::UpcomingEvent,
    services::notifier::Notifier,
};

/// Which slice of the calendar a run announces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyWindow {
    /// Every event on the next UTC day (daily cron)
    Tomorrow,
    /// Today's timed events starting in the current UTC hour (hourly cron)
    CurrentHour,
}

impl NotifyWindow {
    /// Target day and, for the hourly variant, the hour
    pub fn resolve(&self, now: DateTime<Utc>) -> (NaiveDate, Option<u32>) {
        let today = now.date_naive();
        match self {
            NotifyWindow::Tomorrow => (today + Days::new(1), None),
            NotifyWindow::CurrentHour => (today, Some(now.hour())),
        }
    }
}

/// Parseable result of one notifier run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifierOutcome {
    pub success: bool,
    pub events_count: usize,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct EventNotifierJob {
    events: Arc<dyn EventSource>,
    notifier: Arc<dyn Notifier>,
}

impl EventNotifierJob {
    pub fn new(events: Arc<dyn EventSource>, notifier: Arc<dyn Notifier>) -> Self {
        Self { events, notifier }
    }

    pub async fn run(&self, window: NotifyWindow, now: DateTime<Utc>) -> NotifierOutcome {
        match self.execute(window, now).await {
            Ok(0) => NotifierOutcome {
                success: true,
                events_count: 0,
                skipped: true,
                error: None,
            },
            Ok(count) => NotifierOutcome {
                success: true,
                events_count: count,
                skipped: false,
                error: None,
            },
            Err(e) => {
                tracing::error!(window = ?window, error = %e, "Event notification failed");
                NotifierOutcome {
                    success: false,
                    events_count: 0,
                    skipped: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn execute(&self, window: NotifyWindow, now: DateTime<Utc>) -> AppResult<usize> {
        let (date, hour) = window.resolve(now);

        let mut events: Vec<UpcomingEvent> = self
            .events
            .events_on(date)
            .await?
            .into_iter()
            .filter(|e| match hour {
                Some(h) => e.occurs_in_hour(date, h),
                None => e.occurs_on(date),
            })
            .collect();

        if events.is_empty() {
            tracing::info!(date = %date, window = ?window, "No events to announce");
            return Ok(0);
        }

        events.sort_by_key(|e| (e.time, e.id));
        let message = format_digest(window, date, &events);
        self.notifier.send(&message).await?;

        tracing::info!(date = %date, count = events.len(), "Event digest sent");
        Ok(events.len())
    }
}

/// Renders all events as one message under a single heading
pub fn format_digest(window: NotifyWindow, date: NaiveDate, events: &[UpcomingEvent]) -> String {
    let heading = match window {
        NotifyWindow::Tomorrow => format!("📅 Tomorrow in the club ({})", date.format("%A, %B %-d")),
        NotifyWindow::CurrentHour => format!("⏰ Starting soon ({})", date.format("%B %-d")),
    };

    let mut lines = vec![heading, String::new()];
    for event in events {
        let when = event
            .time
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "All day".to_string());
        lines.push(format!("• {} {} [{}]", when, event.title, event.event_type));
        if let Some(description) = event.description.as_deref().filter(|d| !d.trim().is_empty()) {
            lines.push(format!("   {}", description.trim()));
        }
    }

    lines.join("\n")
}
