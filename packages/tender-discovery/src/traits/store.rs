//! Durable browsing-state storage.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StoreResult;
use crate::types::state::BrowsingState;

/// Cross-process store of browsing state, one slot per consumer.
///
/// Writing a state for a new category overwrites the consumer's previous
/// state regardless of its category.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the consumer's state, if any.
    async fn get_state(&self, consumer_id: &str) -> StoreResult<Option<BrowsingState>>;

    /// Upsert the consumer's state.
    async fn put_state(&self, consumer_id: &str, state: &BrowsingState) -> StoreResult<()>;

    /// Remove the consumer's state. Missing state is not an error.
    async fn delete_state(&self, consumer_id: &str) -> StoreResult<()>;
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    async fn get_state(&self, consumer_id: &str) -> StoreResult<Option<BrowsingState>> {
        (**self).get_state(consumer_id).await
    }

    async fn put_state(&self, consumer_id: &str, state: &BrowsingState) -> StoreResult<()> {
        (**self).put_state(consumer_id, state).await
    }

    async fn delete_state(&self, consumer_id: &str) -> StoreResult<()> {
        (**self).delete_state(consumer_id).await
    }
}
