//! Discovery engine: first page, more, and reset for a consumer.
//!
//! # Example
//!
//! ```rust,ignore
//! use tender_discovery::{Category, DiscoveryConfig, DiscoveryEngine, NextPage};
//! use tender_discovery::stores::MemoryStateStore;
//!
//! let engine = DiscoveryEngine::new(source, MemoryStateStore::new(), DiscoveryConfig::default());
//!
//! let first = engine.first_page("user-1", Category::Works, 10).await;
//! match engine.next_page("user-1", Category::Works, 10).await {
//!     NextPage::Batch(batch) => println!("{} more", batch.len()),
//!     NextPage::NoBaseline => println!("ask for a first page"),
//! }
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::browsing::BrowsingStateStore;
use crate::identity;
use crate::scoring::{self, RelevanceScorer};
use crate::session::{ConsumerLocks, SessionCache};
use crate::traits::source::TenderSource;
use crate::traits::store::StateStore;
use crate::types::config::{DiscoveryConfig, LadderConfig, SearchConfig};
use crate::types::state::{BrowsingState, SeenSet};
use crate::types::tender::{Category, TenderRecord};
use crate::walker::{PaginationWalker, WalkRequest};

/// Records delivered by one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub records: Vec<TenderRecord>,
    /// Page cursor recorded with this delivery
    pub page: u32,
    /// Day the records came from, when a first page had to go back before today
    pub search_date: Option<NaiveDate>,
}

impl Batch {
    fn empty(page: u32) -> Self {
        Self {
            records: Vec::new(),
            page,
            search_date: None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of a "more" request.
#[derive(Debug, Clone, PartialEq)]
pub enum NextPage {
    Batch(Batch),
    /// No state for the requested category. The front end should offer a
    /// first page instead.
    NoBaseline,
}

impl NextPage {
    pub fn batch(self) -> Option<Batch> {
        match self {
            NextPage::Batch(batch) => Some(batch),
            NextPage::NoBaseline => None,
        }
    }

    pub fn is_no_baseline(&self) -> bool {
        matches!(self, NextPage::NoBaseline)
    }
}

/// Retry ladder for "more" requests.
///
/// `Walking` tries successive page hints until one yields records or the
/// retry budget runs out, then `Fallback` walks once more without a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ladder {
    Walking { page: u32, attempt: u32 },
    Fallback,
    Accumulated { page: u32 },
    Exhausted,
}

impl Ladder {
    fn start(cursor: u32, config: &LadderConfig) -> Self {
        if config.retry_budget == 0 {
            Ladder::Fallback
        } else {
            Ladder::Walking {
                page: cursor.saturating_add(1),
                attempt: 1,
            }
        }
    }
}

/// Front-end facing discovery operations.
///
/// Every operation is infallible: upstream and storage failures degrade to
/// empty pages or session-only state and are logged.
pub struct DiscoveryEngine<S: TenderSource, D: StateStore> {
    walker: PaginationWalker<S>,
    state: BrowsingStateStore<D>,
    locks: ConsumerLocks,
    ladder: LadderConfig,
    search: SearchConfig,
    keywords: Vec<String>,
}

impl<S: TenderSource, D: StateStore> DiscoveryEngine<S, D> {
    pub fn new(source: S, durable: D, config: DiscoveryConfig) -> Self {
        let scorer = RelevanceScorer::new(config.scoring);
        Self {
            walker: PaginationWalker::new(source, scorer, config.walk),
            state: BrowsingStateStore::new(durable, config.state),
            locks: ConsumerLocks::new(),
            ladder: config.ladder,
            search: config.search,
            keywords: config.keywords,
        }
    }

    /// Share a session cache with other engines in this process.
    pub fn with_session_cache(mut self, cache: Arc<SessionCache>) -> Self {
        self.state = self.state.with_session_cache(cache);
        self
    }

    pub fn state(&self) -> &BrowsingStateStore<D> {
        &self.state
    }

    pub fn walker(&self) -> &PaginationWalker<S> {
        &self.walker
    }

    /// Most recent day with tenders, starting a fresh session for `category`.
    ///
    /// Returns an empty batch, and leaves state untouched, when nothing is
    /// found within the day horizon.
    pub async fn first_page(&self, consumer_id: &str, category: Category, count: usize) -> Batch {
        let _guard = self.locks.acquire(consumer_id).await;
        info!(consumer_id = %consumer_id, category = %category, count, "First page requested");

        let Some(day) = self
            .walker
            .first_nonempty_day(category, count, &self.keywords)
            .await
        else {
            return Batch::empty(1);
        };

        self.state
            .start_session(consumer_id, category, &day.records, 1)
            .await;

        Batch {
            records: day.records,
            page: 1,
            search_date: (day.day_offset > 0).then_some(day.date),
        }
    }

    /// Up to `count` tenders not yet delivered in the consumer's session.
    pub async fn next_page(&self, consumer_id: &str, category: Category, count: usize) -> NextPage {
        let _guard = self.locks.acquire(consumer_id).await;

        let Some(state) = self.state.load(consumer_id, category).await else {
            info!(
                consumer_id = %consumer_id,
                category = %category,
                "No browsing state for category"
            );
            return NextPage::NoBaseline;
        };

        info!(
            consumer_id = %consumer_id,
            category = %category,
            count,
            seen = state.seen.len(),
            page = state.page,
            "Next page requested"
        );

        let (records, page) = self.climb(category, count, &state).await;
        check_overlap(consumer_id, &records, &state.seen);

        self.state
            .record_delivery(consumer_id, category, &records, page)
            .await;

        NextPage::Batch(Batch {
            records,
            page,
            search_date: None,
        })
    }

    /// Forget the consumer's browsing state.
    pub async fn reset(&self, consumer_id: &str) {
        let _guard = self.locks.acquire(consumer_id).await;
        self.state.clear(consumer_id).await;
    }

    /// Tenders whose names match `terms` upstream, ranked with the terms as
    /// extra keywords. Browsing state is neither read nor written.
    pub async fn search(&self, category: Category, terms: &[String], count: usize) -> Batch {
        let query = terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if query.is_empty() {
            debug!(category = %category, "Blank search terms");
            return Batch::empty(1);
        }

        let keywords: Vec<String> = self.keywords.iter().chain(terms).cloned().collect();
        let seen = SeenSet::new();
        let request = WalkRequest::new(category, count, &seen)
            .with_tender_name(&query)
            .with_keywords(&keywords);
        let records = self.walker.fetch_novel(&request).await.records;

        info!(category = %category, query = %query, delivered = records.len(), "Keyword search complete");
        Batch {
            records,
            page: 1,
            search_date: None,
        }
    }

    /// Best ranked tenders of the most recent days. Browsing state is
    /// neither read nor written.
    pub async fn latest(&self, category: Category, count: usize) -> Batch {
        let seen = SeenSet::new();
        let request = WalkRequest::new(category, count, &seen)
            .within_days(self.search.latest_days)
            .with_keywords(&self.keywords);
        let records = self.walker.fetch_novel(&request).await.records;

        info!(
            category = %category,
            days = self.search.latest_days,
            delivered = records.len(),
            "Latest tenders listed"
        );
        Batch {
            records,
            page: 1,
            search_date: None,
        }
    }

    /// Tenders of the most recent days budgeted at or above the configured
    /// floor, largest budget first. Browsing state is neither read nor
    /// written.
    pub async fn high_value(&self, category: Category, count: usize) -> Batch {
        if count == 0 {
            return Batch::empty(1);
        }

        // Budget order needs the whole window, not the first `count` rows
        let seen = SeenSet::new();
        let request = WalkRequest::new(category, usize::MAX, &seen)
            .within_days(self.search.latest_days)
            .with_keywords(&self.keywords);
        let walked = self.walker.fetch_novel(&request).await.records;

        let mut records = scoring::rank_by_budget(walked, self.search.high_value_min_amount);
        records.truncate(count);

        info!(
            category = %category,
            min_amount = self.search.high_value_min_amount,
            delivered = records.len(),
            "High-value tenders listed"
        );
        Batch {
            records,
            page: 1,
            search_date: None,
        }
    }

    /// Run the retry ladder from the state's cursor. Returns the records and
    /// the cursor to record.
    async fn climb(
        &self,
        category: Category,
        count: usize,
        state: &BrowsingState,
    ) -> (Vec<TenderRecord>, u32) {
        let mut ladder = Ladder::start(state.page, &self.ladder);
        let mut last_page = state.page;
        let mut records = Vec::new();

        loop {
            ladder = match ladder {
                Ladder::Walking { page, attempt } => {
                    last_page = page;
                    let request = WalkRequest::new(category, count, &state.seen)
                        .from_page(page)
                        .with_keywords(&self.keywords);
                    records = self.walker.fetch_novel(&request).await.records;

                    if !records.is_empty() {
                        Ladder::Accumulated { page }
                    } else if attempt < self.ladder.retry_budget {
                        debug!(category = %category, page, attempt, "Ladder attempt empty, trying next page");
                        Ladder::Walking {
                            page: page.saturating_add(1),
                            attempt: attempt + 1,
                        }
                    } else {
                        Ladder::Fallback
                    }
                }
                Ladder::Fallback => {
                    debug!(category = %category, "Retry budget spent, walking without page hint");
                    let request =
                        WalkRequest::new(category, count, &state.seen).with_keywords(&self.keywords);
                    records = self.walker.fetch_novel(&request).await.records;

                    // The cursor moves past the last hinted page
                    if records.is_empty() {
                        Ladder::Exhausted
                    } else {
                        Ladder::Accumulated {
                            page: last_page.saturating_add(1),
                        }
                    }
                }
                Ladder::Accumulated { page } => {
                    info!(category = %category, page, delivered = records.len(), "Ladder found new tenders");
                    return (records, page);
                }
                Ladder::Exhausted => {
                    info!(category = %category, page = state.page, "No new tenders within horizon");
                    return (Vec::new(), state.page);
                }
            };
        }
    }
}

/// Log any delivered record whose keys were already seen. Should never fire.
fn check_overlap(consumer_id: &str, records: &[TenderRecord], seen: &SeenSet) {
    let overlapping: Vec<&str> = records
        .iter()
        .filter(|r| identity::resolve(r).is_seen_in(seen))
        .map(|r| r.tender_name.as_str())
        .collect();

    if !overlapping.is_empty() {
        error!(
            consumer_id = %consumer_id,
            count = overlapping.len(),
            names = ?overlapping,
            "Delivered tenders overlap with already seen keys"
        );
    }
}
