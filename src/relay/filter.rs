use std::{fmt::Display, str::FromStr};

use crate::{error::AppError, models::RawChange};

/// Equality predicate in `column=eq.value` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub column: String,
    pub value: String,
}

impl ChangeFilter {
    pub fn eq(column: impl Into<String>, value: impl Display) -> Self {
        Self {
            column: column.into(),
            value: value.to_string(),
        }
    }

    /// Whether the change's current row carries `column == value`
    pub fn matches(&self, raw: &RawChange) -> bool {
        raw.column(&self.column).as_deref() == Some(self.value.as_str())
    }
}

impl FromStr for ChangeFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::InvalidInput(format!("Unsupported filter '{}'", s));

        let (column, predicate) = s.split_once('=').ok_or_else(invalid)?;
        let value = predicate.strip_prefix("eq.").ok_or_else(invalid)?;
        if column.is_empty() || value.is_empty() {
            return Err(invalid());
        }

        Ok(Self::eq(column, value))
    }
}

impl Display for ChangeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(record: serde_json::Value) -> RawChange {
        serde_json::from_value(json!({
            "table": "oscar_results",
            "op": "INSERT",
            "record": record
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let filter: ChangeFilter = "edition_id=eq.3".parse().unwrap();
        assert_eq!(filter, ChangeFilter::eq("edition_id", 3));
        assert_eq!(filter.to_string(), "edition_id=eq.3");
    }

    #[test]
    fn test_rejects_other_operators() {
        assert!("edition_id=gt.3".parse::<ChangeFilter>().is_err());
        assert!("edition_id".parse::<ChangeFilter>().is_err());
        assert!("=eq.3".parse::<ChangeFilter>().is_err());
        assert!("edition_id=eq.".parse::<ChangeFilter>().is_err());
    }

    #[test]
    fn test_matches_numeric_and_string_columns() {
        let filter = ChangeFilter::eq("edition_id", 3);
        assert!(filter.matches(&change(json!({ "id": 1, "edition_id": 3 }))));
        assert!(!filter.matches(&change(json!({ "id": 1, "edition_id": 4 }))));
        assert!(!filter.matches(&change(json!({ "id": 1 }))));

        let by_name = ChangeFilter::eq("slug", "best-picture");
        assert!(by_name.matches(&change(json!({ "slug": "best-picture" }))));
    }
}
