//! Multi-day, multi-page accumulation of novel tenders.
//!
//! The upstream listing has no stable cursor: a page index can be empty while
//! later pages are not, and the same tender can reappear on another day under
//! another case number. The walker therefore filters twice:
//!
//! 1. while accumulating, against the caller's exclusion set (both keys)
//! 2. after accumulating, by `(name, organization)` across everything it
//!    collected in this call
//!
//! Walking is a small state machine: `Walking { day, page }` advances one
//! calendar day per step until it becomes `Accumulated` (target reached) or
//! `Exhausted` (day horizon reached).

use chrono::{Days, NaiveDate};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::identity;
use crate::scoring::RelevanceScorer;
use crate::traits::source::{SourceQuery, TenderSource};
use crate::types::config::WalkConfig;
use crate::types::state::SeenSet;
use crate::types::tender::{Category, ScoredTender, TenderRecord};

/// Parameters of one `fetch_novel` walk.
#[derive(Debug, Clone)]
pub struct WalkRequest<'a> {
    pub category: Category,
    /// Maximum number of records to return
    pub target: usize,
    /// Keys the caller has already delivered
    pub exclude: &'a SeenSet,
    /// First day to walk, 0 = today
    pub start_day_offset: u32,
    /// Page hint for the first day only
    pub start_page: u32,
    pub keywords: &'a [String],
    /// Upstream tender-name filter sent with every query
    pub tender_name: Option<&'a str>,
    /// Days to cover, capped by the configured horizon
    pub max_days: Option<u32>,
}

impl<'a> WalkRequest<'a> {
    pub fn new(category: Category, target: usize, exclude: &'a SeenSet) -> Self {
        Self {
            category,
            target,
            exclude,
            start_day_offset: 0,
            start_page: 1,
            keywords: &[],
            tender_name: None,
            max_days: None,
        }
    }

    pub fn from_day(mut self, offset: u32) -> Self {
        self.start_day_offset = offset;
        self
    }

    pub fn from_page(mut self, page: u32) -> Self {
        self.start_page = page.max(1);
        self
    }

    pub fn with_keywords(mut self, keywords: &'a [String]) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_tender_name(mut self, name: &'a str) -> Self {
        self.tender_name = Some(name);
        self
    }

    pub fn within_days(mut self, days: u32) -> Self {
        self.max_days = Some(days);
        self
    }
}

/// Where a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Walking { day: u32, page: u32 },
    Accumulated,
    Exhausted,
}

/// Result of a `fetch_novel` walk.
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    /// Novel records in rank order, tagged with the category
    pub records: Vec<TenderRecord>,
    /// Terminal state, `Accumulated` or `Exhausted`
    pub end: WalkState,
    pub days_walked: u32,
}

impl WalkOutcome {
    fn empty(end: WalkState) -> Self {
        Self {
            records: Vec::new(),
            end,
            days_walked: 0,
        }
    }
}

/// Records from the first day that had any, used for a first page.
#[derive(Debug, Clone)]
pub struct DayBatch {
    pub date: NaiveDate,
    pub day_offset: u32,
    pub records: Vec<TenderRecord>,
}

/// Walks the Source Adapter backward in time, one day per upstream query.
pub struct PaginationWalker<S: TenderSource> {
    source: S,
    scorer: RelevanceScorer,
    config: WalkConfig,
}

impl<S: TenderSource> PaginationWalker<S> {
    pub fn new(source: S, scorer: RelevanceScorer, config: WalkConfig) -> Self {
        Self {
            source,
            scorer,
            config,
        }
    }

    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Accumulate up to `request.target` records that are not in
    /// `request.exclude`, walking from `start_day_offset` to the horizon.
    pub async fn fetch_novel(&self, request: &WalkRequest<'_>) -> WalkOutcome {
        if request.target == 0 {
            return WalkOutcome::empty(WalkState::Accumulated);
        }

        let today = self.config.today();
        let horizon = request
            .max_days
            .map_or(self.config.max_days_back, |days| days.min(self.config.max_days_back));
        let mut accumulated: Vec<TenderRecord> = Vec::new();
        let mut days_walked = 0u32;
        let mut state = WalkState::Walking {
            day: request.start_day_offset,
            page: request.start_page.max(1),
        };

        info!(
            category = %request.category,
            target = request.target,
            excluded = request.exclude.len(),
            start_day = request.start_day_offset,
            start_page = request.start_page,
            tender_name = ?request.tender_name,
            "Starting multi-day walk"
        );

        let end = loop {
            state = match state {
                WalkState::Walking { day, page } => {
                    let Some(date) = day_at(today, day, horizon) else {
                        break WalkState::Exhausted;
                    };
                    let page_size = if days_walked == 0 {
                        self.config.first_day_page_size
                    } else {
                        self.config.later_day_page_size
                    };
                    let mut query = SourceQuery::new(request.category, date)
                        .with_page(page)
                        .with_page_size(page_size);
                    if let Some(name) = request.tender_name {
                        query = query.with_tender_name(name);
                    }

                    let ranked = self.fetch_ranked(&query, request.keywords).await;
                    days_walked += 1;

                    let ranked_count = ranked.len();
                    let before = accumulated.len();
                    accumulated.extend(
                        ranked
                            .into_iter()
                            .filter(|s| !identity::resolve(&s.record).is_seen_in(request.exclude))
                            .map(|s| s.record),
                    );

                    debug!(
                        date = %date,
                        page,
                        ranked = ranked_count,
                        novel = accumulated.len() - before,
                        total = accumulated.len(),
                        "Walked day"
                    );

                    if accumulated.len() >= request.target {
                        WalkState::Accumulated
                    } else {
                        // Page hints only apply to the first day
                        WalkState::Walking { day: day + 1, page: 1 }
                    }
                }
                terminal => break terminal,
            };
        };

        let mut records = dedup_by_name_and_org(accumulated);
        tag_category(&mut records, request.category);
        records.truncate(request.target);

        info!(
            category = %request.category,
            delivered = records.len(),
            days_walked,
            exhausted = end == WalkState::Exhausted,
            "Multi-day walk complete"
        );

        WalkOutcome {
            records,
            end,
            days_walked,
        }
    }

    /// Walk backward from today and return the ranked records of the first
    /// day that yields any, without an exclusion set or page hint.
    pub async fn first_nonempty_day(
        &self,
        category: Category,
        count: usize,
        keywords: &[String],
    ) -> Option<DayBatch> {
        if count == 0 {
            return None;
        }

        let today = self.config.today();
        let page_size = (count as u32)
            .saturating_mul(2)
            .min(self.config.first_page_size_cap)
            .max(1);

        for day in 0..self.config.max_days_back {
            let Some(date) = day_at(today, day, self.config.max_days_back) else {
                break;
            };
            let query = SourceQuery::new(category, date).with_page_size(page_size);
            let ranked = self.fetch_ranked(&query, keywords).await;
            if ranked.is_empty() {
                debug!(category = %category, date = %date, "No tenders on day, going back");
                continue;
            }

            let mut records = dedup_by_name_and_org(ranked.into_iter().map(|s| s.record).collect());
            tag_category(&mut records, category);
            records.truncate(count);

            info!(
                category = %category,
                date = %date,
                day_offset = day,
                delivered = records.len(),
                "Found tenders for first page"
            );
            return Some(DayBatch {
                date,
                day_offset: day,
                records,
            });
        }

        warn!(
            category = %category,
            max_days_back = self.config.max_days_back,
            "No tenders found within day horizon"
        );
        None
    }

    /// One bounded upstream call, scored and ranked. Failures and timeouts
    /// count as an empty page.
    async fn fetch_ranked(&self, query: &SourceQuery, keywords: &[String]) -> Vec<ScoredTender> {
        let timeout = self.config.fetch_timeout();
        let records = match tokio::time::timeout(timeout, self.source.fetch(query)).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!(
                    category = %query.category,
                    date = %query.date,
                    page = query.page,
                    error = %e,
                    "Upstream fetch failed, treating page as empty"
                );
                return Vec::new();
            }
            Err(_) => {
                warn!(
                    category = %query.category,
                    date = %query.date,
                    page = query.page,
                    timeout_secs = timeout.as_secs(),
                    "Upstream fetch timed out, treating page as empty"
                );
                return Vec::new();
            }
        };

        self.scorer.filter_and_rank(records, keywords)
    }
}

/// Calendar day `offset` days before `today`, if inside the horizon.
fn day_at(today: NaiveDate, offset: u32, max_days_back: u32) -> Option<NaiveDate> {
    if offset >= max_days_back {
        return None;
    }
    today.checked_sub_days(Days::new(u64::from(offset)))
}

/// Keep the first record for each `(name, organization)` pair.
pub fn dedup_by_name_and_org(records: Vec<TenderRecord>) -> Vec<TenderRecord> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert((r.tender_name.clone(), r.org_name.clone())))
        .collect()
}

fn tag_category(records: &mut [TenderRecord], category: Category) {
    for record in records {
        record.category = Some(category);
    }
}
