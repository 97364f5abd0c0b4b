//! Per-consumer browsing state.

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::identity::TenderKeys;
use crate::types::tender::Category;

/// Keys already delivered to a consumer in the current session.
///
/// Membership is order-insensitive, but insertion order is kept so an
/// optional cap can evict the oldest keys first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenSet {
    keys: IndexSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Empty keys never match.
    pub fn contains(&self, key: &str) -> bool {
        !key.is_empty() && self.keys.contains(key)
    }

    /// Insert a key. Empty keys are ignored. Returns true if newly added.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if key.is_empty() {
            return false;
        }
        self.keys.insert(key)
    }

    /// Insert both keys of a delivered record.
    pub fn insert_keys(&mut self, keys: &TenderKeys) {
        for key in keys.iter() {
            self.insert(key);
        }
    }

    /// Drop the oldest keys until at most `max` remain.
    pub fn evict_to(&mut self, max: usize) -> usize {
        let excess = self.keys.len().saturating_sub(max);
        if excess > 0 {
            self.keys.drain(..excess);
        }
        excess
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for SeenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SeenSet::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

/// Browsing state for one consumer: category, seen keys and page cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowsingState {
    pub category: Category,
    pub seen: SeenSet,
    /// Last upstream page used for this category, always >= 1
    pub page: u32,
    pub updated_at: DateTime<Utc>,
}

impl BrowsingState {
    /// Fresh session: nothing seen, page 1.
    pub fn new(category: Category) -> Self {
        Self {
            category,
            seen: SeenSet::new(),
            page: 1,
            updated_at: Utc::now(),
        }
    }

    pub fn with_seen(mut self, seen: SeenSet) -> Self {
        self.seen = seen;
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seen_set_ignores_empty_keys() {
        let mut seen = SeenSet::new();
        assert!(!seen.insert(""));
        assert!(seen.insert("A"));
        assert!(!seen.insert("A"));
        assert_eq!(seen.len(), 1);
        assert!(!seen.contains(""));
    }

    #[test]
    fn test_evict_oldest_first() {
        let mut seen: SeenSet = ["a", "b", "c", "d"].into_iter().collect();
        assert_eq!(seen.evict_to(2), 2);
        assert_eq!(seen.iter().collect::<Vec<_>>(), vec!["c", "d"]);
        assert_eq!(seen.evict_to(10), 0);
    }

    #[test]
    fn test_state_serializes_seen_as_list() {
        let state = BrowsingState::new(Category::Goods)
            .with_seen(["X", "Y"].into_iter().collect())
            .with_page(3);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["seen"], serde_json::json!(["X", "Y"]));
        assert_eq!(json["category"], "goods");

        let back: BrowsingState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_page_never_below_one() {
        assert_eq!(BrowsingState::new(Category::Works).with_page(0).page, 1);
    }
}
