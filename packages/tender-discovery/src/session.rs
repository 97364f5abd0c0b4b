//! Process-local session cache and per-consumer serialization.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::state::BrowsingState;

struct CachedState {
    state: BrowsingState,
    /// Set while the durable store lags behind this copy.
    unpersisted: bool,
}

/// Browsing state of every consumer seen by this process.
///
/// Authoritative when the durable store is unreachable or bypassed, and for
/// any consumer whose latest state failed to reach the durable store.
#[derive(Default)]
pub struct SessionCache {
    states: DashMap<String, CachedState>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    pub fn get(&self, consumer_id: &str) -> Option<BrowsingState> {
        self.states
            .get(consumer_id)
            .map(|entry| entry.value().state.clone())
    }

    /// Store a copy that matches the durable store.
    pub fn put(&self, consumer_id: &str, state: BrowsingState) {
        self.insert(consumer_id, state, false);
    }

    /// Store a copy the durable store has not accepted.
    pub fn put_unpersisted(&self, consumer_id: &str, state: BrowsingState) {
        self.insert(consumer_id, state, true);
    }

    /// Whether the cached copy is newer than the durable one.
    pub fn is_unpersisted(&self, consumer_id: &str) -> bool {
        self.states
            .get(consumer_id)
            .is_some_and(|entry| entry.value().unpersisted)
    }

    pub fn remove(&self, consumer_id: &str) -> Option<BrowsingState> {
        self.states.remove(consumer_id).map(|(_, cached)| cached.state)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn insert(&self, consumer_id: &str, state: BrowsingState, unpersisted: bool) {
        self.states
            .insert(consumer_id.to_string(), CachedState { state, unpersisted });
    }
}

/// One async mutex per consumer.
///
/// Every public engine operation holds its consumer's lock from the state
/// read to the state write, so concurrent requests from one consumer run one
/// at a time. Different consumers never contend. A consumer's entry is
/// dropped once no request holds or waits on it.
#[derive(Default)]
pub struct ConsumerLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConsumerLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for and hold `consumer_id`'s lock until the guard drops.
    pub async fn acquire(&self, consumer_id: &str) -> ConsumerGuard<'_> {
        // Clone the Arc out so the map shard is not held across the await
        let lock = self
            .locks
            .entry(consumer_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        ConsumerGuard {
            locks: &self.locks,
            consumer_id: consumer_id.to_string(),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held consumer lock. Dropping it releases the lock and prunes the entry
/// when nobody else is waiting.
pub struct ConsumerGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    consumer_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ConsumerGuard<'_> {
    fn drop(&mut self) {
        // Release first so the map holds the only reference when idle
        drop(self.guard.take());
        self.locks
            .remove_if(&self.consumer_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
