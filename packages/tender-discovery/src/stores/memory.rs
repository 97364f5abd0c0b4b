//! In-memory state store for testing and single-process deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::StoreResult;
use crate::traits::store::StateStore;
use crate::types::state::BrowsingState;

/// Browsing state held in a process-local map.
///
/// Not shared across processes; state is lost on restart.
#[derive(Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<String, BrowsingState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a consumer's state, as if another process had written it.
    pub fn with_state(self, consumer_id: impl Into<String>, state: BrowsingState) -> Self {
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(consumer_id.into(), state);
        self
    }

    /// Number of consumers with stored state.
    pub fn len(&self) -> usize {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_state(&self, consumer_id: &str) -> StoreResult<Option<BrowsingState>> {
        Ok(self
            .states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(consumer_id)
            .cloned())
    }

    async fn put_state(&self, consumer_id: &str, state: &BrowsingState) -> StoreResult<()> {
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(consumer_id.to_string(), state.clone());
        Ok(())
    }

    async fn delete_state(&self, consumer_id: &str) -> StoreResult<()> {
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(consumer_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tender::Category;

    #[tokio::test]
    async fn test_put_overwrites_regardless_of_category() {
        let store = MemoryStateStore::new();
        let goods = BrowsingState::new(Category::Goods).with_seen(["A"].into_iter().collect());
        store.put_state("u1", &goods).await.unwrap();

        let works = BrowsingState::new(Category::Works);
        store.put_state("u1", &works).await.unwrap();

        let loaded = store.get_state("u1").await.unwrap().unwrap();
        assert_eq!(loaded.category, Category::Works);
        assert!(loaded.seen.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryStateStore::new();
        store.delete_state("nobody").await.unwrap();
        assert!(store.get_state("nobody").await.unwrap().is_none());
    }
}
