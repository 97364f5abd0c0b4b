//! Browsing state reconciled between the session cache and the durable store.
//!
//! The durable store is the source of truth. The session cache takes over
//! whenever the durable store is unreachable, bypassed, or holds state for a
//! different category. A cached copy that the durable store failed to accept
//! stays authoritative until a later write succeeds.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::identity;
use crate::session::SessionCache;
use crate::traits::store::StateStore;
use crate::types::config::StateConfig;
use crate::types::state::BrowsingState;
use crate::types::tender::{Category, TenderRecord};

/// Per-consumer browsing state over a durable [`StateStore`].
pub struct BrowsingStateStore<D: StateStore> {
    durable: D,
    cache: Arc<SessionCache>,
    config: StateConfig,
}

impl<D: StateStore> BrowsingStateStore<D> {
    pub fn new(durable: D, config: StateConfig) -> Self {
        Self {
            durable,
            cache: Arc::new(SessionCache::new()),
            config,
        }
    }

    /// Share a session cache with other components of this process.
    pub fn with_session_cache(mut self, cache: Arc<SessionCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn session_cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    pub fn durable(&self) -> &D {
        &self.durable
    }

    /// State for `category`, preferring the durable copy.
    ///
    /// A durable hit refreshes the session cache. An unpersisted cache entry
    /// is newer than anything durable and is returned without a read.
    pub async fn load(&self, consumer_id: &str, category: Category) -> Option<BrowsingState> {
        if self.cache.is_unpersisted(consumer_id) {
            debug!(
                consumer_id = %consumer_id,
                "Session cache holds unpersisted state, skipping durable read"
            );
        } else if !self.config.bypass_durable {
            match self.durable.get_state(consumer_id).await {
                Ok(Some(state)) if state.category == category => {
                    debug!(
                        consumer_id = %consumer_id,
                        category = %category,
                        seen = state.seen.len(),
                        page = state.page,
                        "Loaded browsing state from durable store"
                    );
                    self.cache.put(consumer_id, state.clone());
                    return Some(state);
                }
                Ok(Some(state)) => {
                    debug!(
                        consumer_id = %consumer_id,
                        requested = %category,
                        stored = %state.category,
                        "Durable state belongs to another category"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        consumer_id = %consumer_id,
                        error = %e,
                        "Failed to read durable browsing state, using session cache"
                    );
                }
            }
        }

        let cached = self
            .cache
            .get(consumer_id)
            .filter(|state| state.category == category);
        if let Some(state) = &cached {
            debug!(
                consumer_id = %consumer_id,
                category = %category,
                seen = state.seen.len(),
                page = state.page,
                "Loaded browsing state from session cache"
            );
        }
        cached
    }

    /// Add both keys of every delivered record to the consumer's seen-set and
    /// move the page cursor.
    ///
    /// Starts a new state when none exists for `category`.
    pub async fn record_delivery(
        &self,
        consumer_id: &str,
        category: Category,
        delivered: &[TenderRecord],
        page: u32,
    ) -> BrowsingState {
        let state = self
            .load(consumer_id, category)
            .await
            .unwrap_or_else(|| BrowsingState::new(category));

        let state = self.apply_delivery(consumer_id, state, delivered, page);
        self.persist(consumer_id, &state).await;
        state
    }

    /// Discard any existing state and start fresh for `category`.
    pub async fn switch_category(&self, consumer_id: &str, category: Category) -> BrowsingState {
        self.start_session(consumer_id, category, &[], 1).await
    }

    /// Replace any existing state with a fresh session for `category` that
    /// already holds `delivered`, written with a single store call.
    pub async fn start_session(
        &self,
        consumer_id: &str,
        category: Category,
        delivered: &[TenderRecord],
        page: u32,
    ) -> BrowsingState {
        info!(consumer_id = %consumer_id, category = %category, "Starting new browsing session");
        let state = self.apply_delivery(consumer_id, BrowsingState::new(category), delivered, page);
        self.persist(consumer_id, &state).await;
        state
    }

    /// Forget the consumer's state in both stores.
    pub async fn clear(&self, consumer_id: &str) {
        self.cache.remove(consumer_id);
        if !self.config.bypass_durable {
            if let Err(e) = self.durable.delete_state(consumer_id).await {
                warn!(
                    consumer_id = %consumer_id,
                    error = %e,
                    "Failed to delete durable browsing state"
                );
            }
        }
        info!(consumer_id = %consumer_id, "Cleared browsing state");
    }

    fn apply_delivery(
        &self,
        consumer_id: &str,
        mut state: BrowsingState,
        delivered: &[TenderRecord],
        page: u32,
    ) -> BrowsingState {
        let before = state.seen.len();
        for record in delivered {
            state.seen.insert_keys(&identity::resolve(record));
        }
        state.page = page.max(1);

        if let Some(max) = self.config.max_seen_keys {
            let evicted = state.seen.evict_to(max);
            if evicted > 0 {
                debug!(consumer_id = %consumer_id, evicted, max, "Evicted oldest seen keys");
            }
        }
        state.touch();

        if !delivered.is_empty() {
            info!(
                consumer_id = %consumer_id,
                category = %state.category,
                delivered = delivered.len(),
                new_keys = state.seen.len().saturating_sub(before),
                seen = state.seen.len(),
                page = state.page,
                "Recorded delivery"
            );
        }
        state
    }

    async fn persist(&self, consumer_id: &str, state: &BrowsingState) {
        if self.config.bypass_durable {
            self.cache.put(consumer_id, state.clone());
            return;
        }
        match self.durable.put_state(consumer_id, state).await {
            Ok(()) => self.cache.put(consumer_id, state.clone()),
            Err(e) => {
                warn!(
                    consumer_id = %consumer_id,
                    category = %state.category,
                    error = %e,
                    "Failed to persist browsing state, kept in session cache"
                );
                self.cache.put_unpersisted(consumer_id, state.clone());
            }
        }
    }
}
