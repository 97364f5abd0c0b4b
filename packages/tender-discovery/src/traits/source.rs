//! Source Adapter: one page of upstream listing rows per call.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::error::SourceResult;
use crate::types::tender::{Category, TenderRecord};

/// One upstream page request, always for a single calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceQuery {
    pub category: Category,
    pub date: NaiveDate,
    /// 1-based
    pub page: u32,
    pub page_size: u32,
    /// Upstream tender-name filter
    pub tender_name: Option<String>,
}

impl SourceQuery {
    pub fn new(category: Category, date: NaiveDate) -> Self {
        Self {
            category,
            date,
            page: 1,
            page_size: 100,
            tender_name: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Only rows whose name matches `name`. Blank names are ignored.
    pub fn with_tender_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.tender_name = (!name.trim().is_empty()).then_some(name);
        self
    }

    /// Date as the upstream expects it, `YYYY/MM/DD`.
    pub fn date_param(&self) -> String {
        self.date.format("%Y/%m/%d").to_string()
    }
}

/// Upstream listing.
///
/// An empty page is `Ok(vec![])`, not an error. Implementations may fail for
/// any query; callers treat failures like empty pages.
#[async_trait]
pub trait TenderSource: Send + Sync {
    async fn fetch(&self, query: &SourceQuery) -> SourceResult<Vec<TenderRecord>>;
}

#[async_trait]
impl<T: TenderSource + ?Sized> TenderSource for Arc<T> {
    async fn fetch(&self, query: &SourceQuery) -> SourceResult<Vec<TenderRecord>> {
        (**self).fetch(query).await
    }
}
