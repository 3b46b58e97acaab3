//! Client-side reconciliation of relayed events
//!
//! Events for the same row can arrive out of order, so a consumer must
//! merge by key instead of appending. Rows that carry a version timestamp
//! never regress to an older version.

use chrono::{DateTime, Utc};
use std::{cmp::Ordering, collections::HashMap, hash::Hash};

use crate::models::{BoardPost, ChangeEvent, LeaderboardEntry};

pub trait Keyed {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;

    /// Monotonic version, when the row has one
    fn version(&self) -> Option<DateTime<Utc>> {
        None
    }
}

impl Keyed for BoardPost {
    type Key = i64;

    fn key(&self) -> i64 {
        self.id
    }

    fn version(&self) -> Option<DateTime<Utc>> {
        Some(self.updated_at)
    }
}

impl Keyed for LeaderboardEntry {
    type Key = i64;

    fn key(&self) -> i64 {
        self.participant_id
    }
}

/// Keyed, last-writer-wins view of a live collection
#[derive(Debug, Clone)]
pub struct LiveCollection<T: Keyed> {
    items: HashMap<T::Key, T>,
}

impl<T: Keyed> Default for LiveCollection<T> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
        }
    }
}

impl<T: Keyed + Clone> LiveCollection<T> {
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        let mut collection = Self::default();
        for item in items {
            collection.upsert(item);
        }
        collection
    }

    /// Replaces the row with the same key unless the held copy is newer.
    /// Returns whether the item was stored.
    pub fn upsert(&mut self, item: T) -> bool {
        let key = item.key();
        if let (Some(held), Some(incoming)) = (
            self.items.get(&key).and_then(Keyed::version),
            item.version(),
        ) {
            if incoming < held {
                return false;
            }
        }
        self.items.insert(key, item);
        true
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        self.items.remove(key)
    }

    /// Swaps in a complete authoritative set
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = T>) {
        self.items = items.into_iter().map(|item| (item.key(), item)).collect();
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.items.get(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn sorted_by(&self, compare: impl FnMut(&T, &T) -> Ordering) -> Vec<T> {
        let mut items: Vec<T> = self.items.values().cloned().collect();
        items.sort_by(compare);
        items
    }
}

impl LiveCollection<BoardPost> {
    pub fn apply(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::BoardPostUpserted { post } => {
                self.upsert(post.clone());
            }
            ChangeEvent::BoardPostDeleted { id } => {
                self.remove(id);
            }
            _ => {}
        }
    }

    /// Newest posts first
    pub fn timeline(&self) -> Vec<BoardPost> {
        self.sorted_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
    }
}

impl LiveCollection<LeaderboardEntry> {
    /// Applies a refresh for `edition_id`; other editions are ignored.
    /// A bare result delete carries no standings and is followed by a refresh.
    pub fn apply(&mut self, edition_id: i64, event: &ChangeEvent) {
        if let ChangeEvent::OscarResultsRefreshed {
            edition_id: refreshed,
            leaderboard,
        } = event
        {
            if *refreshed == edition_id {
                self.replace_all(leaderboard.iter().cloned());
            }
        }
    }

    pub fn standings(&self) -> Vec<LeaderboardEntry> {
        self.sorted_by(|a, b| {
            a.rank
                .cmp(&b.rank)
                .then_with(|| a.display_name.cmp(&b.display_name))
        })
    }
}
