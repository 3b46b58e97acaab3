use serde::{Deserialize, Serialize};

use super::{BoardPost, LeaderboardEntry};

/// Row-level operation reported by the database trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Collections the relay knows how to watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchedCollection {
    BoardPosts,
    OscarResults,
}

impl WatchedCollection {
    pub fn from_table(table: &str) -> Option<Self> {
        match table {
            "board_posts" => Some(WatchedCollection::BoardPosts),
            "oscar_results" => Some(WatchedCollection::OscarResults),
            _ => None,
        }
    }
}

/// Raw notification payload emitted by `pg_notify`
///
/// `record` holds the new row for inserts/updates, `old_record` the previous
/// row for updates/deletes. Neither carries joined fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChange {
    pub table: String,
    pub op: ChangeOp,
    #[serde(default)]
    pub record: Option<serde_json::Value>,
    #[serde(default)]
    pub old_record: Option<serde_json::Value>,
}

impl RawChange {
    /// The row carrying the current values: `record`, or `old_record` on delete
    pub fn row(&self) -> Option<&serde_json::Value> {
        match self.op {
            ChangeOp::Delete => self.old_record.as_ref().or(self.record.as_ref()),
            _ => self.record.as_ref(),
        }
    }

    pub fn row_id(&self) -> Option<i64> {
        self.row().and_then(|r| r.get("id")).and_then(|v| v.as_i64())
    }

    /// Looks up a column in the current row as a comparable string
    pub fn column(&self, name: &str) -> Option<String> {
        match self.row()?.get(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Application-shaped event pushed to browser clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    BoardPostUpserted {
        post: BoardPost,
    },
    BoardPostDeleted {
        id: i64,
    },
    OscarResultsRefreshed {
        #[serde(rename = "editionId")]
        edition_id: i64,
        leaderboard: Vec<LeaderboardEntry>,
    },
    OscarResultDeleted {
        id: i64,
        #[serde(rename = "editionId")]
        edition_id: Option<i64>,
    },
}

impl ChangeEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::BoardPostUpserted { .. } => "board_post_upserted",
            ChangeEvent::BoardPostDeleted { .. } => "board_post_deleted",
            ChangeEvent::OscarResultsRefreshed { .. } => "oscar_results_refreshed",
            ChangeEvent::OscarResultDeleted { .. } => "oscar_result_deleted",
        }
    }
}
