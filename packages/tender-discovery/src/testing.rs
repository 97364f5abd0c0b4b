//! Testing utilities including mock implementations.
//!
//! These are useful for testing code built on the discovery engine without
//! reaching the upstream procurement site or a database.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::error::{SourceError, SourceResult, StoreError, StoreResult};
use crate::stores::memory::MemoryStateStore;
use crate::traits::source::{SourceQuery, TenderSource};
use crate::traits::store::StateStore;
use crate::types::state::BrowsingState;
use crate::types::tender::TenderRecord;

/// A mock upstream listing.
///
/// Pages are keyed by `(date, page)`; unknown pages are empty. Category is
/// ignored for lookup but recorded on every call. A tender-name filter keeps
/// rows containing every whitespace-separated term, and page size truncates
/// the canned rows, like a real listing would.
#[derive(Default, Clone)]
pub struct MockSource {
    /// Canned rows by date and page
    pages: Arc<RwLock<HashMap<(NaiveDate, u32), Vec<TenderRecord>>>>,

    /// Pages that fail
    failures: Arc<RwLock<HashSet<(NaiveDate, u32)>>>,

    /// Pages that answer slowly
    delays: Arc<RwLock<HashMap<(NaiveDate, u32), Duration>>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<SourceQuery>>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `records` for `date`, `page`.
    pub fn with_page(self, date: NaiveDate, page: u32, records: Vec<TenderRecord>) -> Self {
        write(&self.pages).insert((date, page), records);
        self
    }

    /// Serve `records` as page 1 of `date`.
    pub fn with_day(self, date: NaiveDate, records: Vec<TenderRecord>) -> Self {
        self.with_page(date, 1, records)
    }

    /// Fail every call for `date`, `page`.
    pub fn with_failure(self, date: NaiveDate, page: u32) -> Self {
        write(&self.failures).insert((date, page));
        self
    }

    /// Delay every call for `date`, `page`.
    pub fn with_delay(self, date: NaiveDate, page: u32, delay: Duration) -> Self {
        write(&self.delays).insert((date, page), delay);
        self
    }

    /// Replace or add rows after construction.
    pub fn set_page(&self, date: NaiveDate, page: u32, records: Vec<TenderRecord>) {
        write(&self.pages).insert((date, page), records);
    }

    /// Every query received, in order.
    pub fn calls(&self) -> Vec<SourceQuery> {
        read(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        read(&self.calls).len()
    }

    /// Forget recorded calls.
    pub fn reset_calls(&self) {
        write(&self.calls).clear();
    }
}

#[async_trait]
impl TenderSource for MockSource {
    async fn fetch(&self, query: &SourceQuery) -> SourceResult<Vec<TenderRecord>> {
        write(&self.calls).push(query.clone());

        let key = (query.date, query.page);
        let delay = read(&self.delays).get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if read(&self.failures).contains(&key) {
            return Err(SourceError::Status(503));
        }

        let mut records = read(&self.pages).get(&key).cloned().unwrap_or_default();
        if let Some(name) = &query.tender_name {
            records.retain(|r| name.split_whitespace().all(|t| r.tender_name.contains(t)));
        }
        records.truncate(query.page_size as usize);
        Ok(records)
    }
}

/// A state store whose reads and/or writes fail.
///
/// Successful operations go to an inner [`MemoryStateStore`], so a store
/// that only fails writes still serves seeded state. Failure modes can be
/// switched while an engine is using the store.
pub struct FailingStateStore {
    inner: MemoryStateStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl FailingStateStore {
    /// Fail every operation.
    pub fn new() -> Self {
        Self::wrapping(MemoryStateStore::new())
            .with_failing_reads(true)
            .with_failing_writes(true)
    }

    /// Serve every operation from `inner` until told to fail.
    pub fn wrapping(inner: MemoryStateStore) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Serve reads, fail writes and deletes.
    pub fn failing_writes(inner: MemoryStateStore) -> Self {
        Self::wrapping(inner).with_failing_writes(true)
    }

    /// Fail reads, accept writes.
    pub fn failing_reads() -> Self {
        Self::wrapping(MemoryStateStore::new()).with_failing_reads(true)
    }

    pub fn with_failing_reads(self, fail: bool) -> Self {
        self.set_fail_reads(fail);
        self
    }

    pub fn with_failing_writes(self, fail: bool) -> Self {
        self.set_fail_writes(fail);
        self
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Start or stop failing writes and deletes.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The wrapped store, bypassing any failure mode.
    pub fn inner(&self) -> &MemoryStateStore {
        &self.inner
    }

    /// Number of operations attempted, failed or not.
    pub fn attempts(&self) -> usize {
        self.reads() + self.writes()
    }

    /// Reads attempted, failed or not.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Writes and deletes attempted, failed or not.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn attempt(counter: &AtomicUsize, fails: &AtomicBool) -> StoreResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if fails.load(Ordering::SeqCst) {
            return Err(StoreError::Database("simulated store outage".into()));
        }
        Ok(())
    }
}

impl Default for FailingStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for FailingStateStore {
    async fn get_state(&self, consumer_id: &str) -> StoreResult<Option<BrowsingState>> {
        Self::attempt(&self.reads, &self.fail_reads)?;
        self.inner.get_state(consumer_id).await
    }

    async fn put_state(&self, consumer_id: &str, state: &BrowsingState) -> StoreResult<()> {
        Self::attempt(&self.writes, &self.fail_writes)?;
        self.inner.put_state(consumer_id, state).await
    }

    async fn delete_state(&self, consumer_id: &str) -> StoreResult<()> {
        Self::attempt(&self.writes, &self.fail_writes)?;
        self.inner.delete_state(consumer_id).await
    }
}

/// `count` distinct tenders whose ids and names start with `prefix`.
pub fn sample_tenders(prefix: &str, count: usize) -> Vec<TenderRecord> {
    (0..count)
        .map(|i| {
            TenderRecord::new(format!("{}機關", prefix), format!("{}採購案{}", prefix, i))
                .with_id(format!("{}-{:03}", prefix, i))
        })
        .collect()
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
