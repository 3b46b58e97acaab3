use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// A calendar entry; `year = None` recurs every year on its month/day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UpcomingEvent {
    pub id: i64,
    pub month: i32,
    pub day: i32,
    pub year: Option<i32>,
    pub time: Option<NaiveTime>,
    pub title: String,
    pub description: Option<String>,
    pub event_type: String,
}

impl UpcomingEvent {
    /// Whether the event falls on `date`, honouring annual recurrence
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        self.month == date.month() as i32
            && self.day == date.day() as i32
            && self.year.map_or(true, |y| y == date.year())
    }

    /// Whether the event falls on `date` within the given UTC hour
    pub fn occurs_in_hour(&self, date: NaiveDate, hour: u32) -> bool {
        self.occurs_on(date) && self.time.is_some_and(|t| t.hour() == hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(month: i32, day: i32, year: Option<i32>, time: Option<&str>) -> UpcomingEvent {
        UpcomingEvent {
            id: 1,
            month,
            day,
            year,
            time: time.map(|t| NaiveTime::parse_from_str(t, "%H:%M").unwrap()),
            title: "Movie night".to_string(),
            description: None,
            event_type: "screening".to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_recurring_event_matches_every_year() {
        let birthday = event(3, 15, None, None);
        assert!(birthday.occurs_on(date(2024, 3, 15)));
        assert!(birthday.occurs_on(date(2025, 3, 15)));
        assert!(birthday.occurs_on(date(2031, 3, 15)));
        assert!(!birthday.occurs_on(date(2025, 3, 16)));
    }

    #[test]
    fn test_dated_event_matches_only_its_year() {
        let premiere = event(3, 15, Some(2025), None);
        assert!(premiere.occurs_on(date(2025, 3, 15)));
        assert!(!premiere.occurs_on(date(2026, 3, 15)));
    }

    #[test]
    fn test_hour_window_requires_time() {
        let untimed = event(3, 15, None, None);
        let timed = event(3, 15, None, Some("19:30"));
        assert!(!untimed.occurs_in_hour(date(2025, 3, 15), 19));
        assert!(timed.occurs_in_hour(date(2025, 3, 15), 19));
        assert!(!timed.occurs_in_hour(date(2025, 3, 15), 20));
    }
}
