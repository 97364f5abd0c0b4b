//! Tender records and procurement categories.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DiscoveryError;

/// Procurement nature filter offered by the upstream listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// 工程類
    Works,
    /// 財物類
    Goods,
    /// 勞務類
    Services,
    /// 不限 (no filter)
    Unrestricted,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Works,
        Category::Goods,
        Category::Services,
        Category::Unrestricted,
    ];

    /// Opaque filter code sent upstream. Empty means "no filter".
    pub fn filter_code(self) -> &'static str {
        match self {
            Category::Works => "RAD_PROCTRG_CATE_1",
            Category::Goods => "RAD_PROCTRG_CATE_2",
            Category::Services => "RAD_PROCTRG_CATE_3",
            Category::Unrestricted => "",
        }
    }

    /// Label as shown to end users.
    pub fn label(self) -> &'static str {
        match self {
            Category::Works => "工程類",
            Category::Goods => "財物類",
            Category::Services => "勞務類",
            Category::Unrestricted => "不限",
        }
    }

    /// Stable identifier used for persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Works => "works",
            Category::Goods => "goods",
            Category::Services => "services",
            Category::Unrestricted => "unrestricted",
        }
    }

    /// Find the category mentioned in free text such as `更多工程` or `財物類`.
    pub fn from_label(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        if text.contains("工程") {
            return Some(Category::Works);
        }
        if text.contains("財物") {
            return Some(Category::Goods);
        }
        if text.contains("勞務") {
            return Some(Category::Services);
        }
        if text.contains("不限") {
            return Some(Category::Unrestricted);
        }
        text.trim().parse().ok()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == lowered || c.label() == s.trim())
            .ok_or_else(|| DiscoveryError::UnknownCategory(s.to_string()))
    }
}

/// One listing row as returned by the Source Adapter.
///
/// Records are immutable once fetched; the engine only adds the category tag
/// before handing them to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderRecord {
    /// Procuring organization
    pub org_name: String,

    /// Tender title
    pub tender_name: String,

    /// Upstream case number, may be empty
    #[serde(default)]
    pub tender_id: String,

    /// Set by the walker on every delivered record
    #[serde(default)]
    pub category: Option<Category>,

    /// Budget in NTD, `None` when not announced
    #[serde(default)]
    pub budget_amount: Option<u64>,

    /// Announcement date as printed upstream (ROC calendar)
    #[serde(default)]
    pub announcement_date: String,

    /// Bid deadline as printed upstream (ROC calendar)
    #[serde(default)]
    pub deadline_date: String,

    /// Tendering method, e.g. 公開招標
    #[serde(default)]
    pub tender_method: String,

    /// Procurement nature text as printed upstream
    #[serde(default)]
    pub procurement_nature: String,

    /// Row is a correction announcement (更正公告)
    #[serde(default)]
    pub is_correction: bool,

    /// Absolute link to the detail page
    #[serde(default)]
    pub tender_url: String,
}

impl TenderRecord {
    pub fn new(org_name: impl Into<String>, tender_name: impl Into<String>) -> Self {
        Self {
            org_name: org_name.into(),
            tender_name: tender_name.into(),
            tender_id: String::new(),
            category: None,
            budget_amount: None,
            announcement_date: String::new(),
            deadline_date: String::new(),
            tender_method: String::new(),
            procurement_nature: String::new(),
            is_correction: false,
            tender_url: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.tender_id = id.into();
        self
    }

    pub fn with_budget(mut self, amount: u64) -> Self {
        self.budget_amount = Some(amount);
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.tender_method = method.into();
        self
    }

    pub fn with_nature(mut self, nature: impl Into<String>) -> Self {
        self.procurement_nature = nature.into();
        self
    }

    pub fn with_dates(mut self, announced: impl Into<String>, deadline: impl Into<String>) -> Self {
        self.announcement_date = announced.into();
        self.deadline_date = deadline.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.tender_url = url.into();
        self
    }

    pub fn correction(mut self) -> Self {
        self.is_correction = true;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Announcement date on the Gregorian calendar.
    pub fn announced_on(&self) -> Option<NaiveDate> {
        parse_roc_date(&self.announcement_date)
    }

    /// Deadline on the Gregorian calendar.
    pub fn deadline_on(&self) -> Option<NaiveDate> {
        parse_roc_date(&self.deadline_date)
    }
}

/// A record with its relevance score. Never leaves the engine.
#[derive(Debug, Clone)]
pub struct ScoredTender {
    pub record: TenderRecord,
    pub score: f64,
}

/// Parse `114/11/17` (ROC year) or `2025/11/17` into a date.
pub fn parse_roc_date(text: &str) -> Option<NaiveDate> {
    let mut parts = text.trim().split('/');
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let day: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    // ROC year 1 is 1912
    let year = if year < 1000 { year + 1911 } else { year };
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_more_command() {
        assert_eq!(Category::from_label("更多工程類"), Some(Category::Works));
        assert_eq!(Category::from_label("更多工程"), Some(Category::Works));
        assert_eq!(Category::from_label("更多財物類"), Some(Category::Goods));
        assert_eq!(Category::from_label("勞務"), Some(Category::Services));
        assert_eq!(Category::from_label("services"), Some(Category::Services));
        assert_eq!(Category::from_label("更多"), None);
        assert_eq!(Category::from_label(""), None);
    }

    #[test]
    fn test_category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
            assert_eq!(category.label().parse::<Category>().unwrap(), category);
        }
        assert!("furniture".parse::<Category>().is_err());
    }

    #[test]
    fn test_unrestricted_has_no_filter_code() {
        assert_eq!(Category::Unrestricted.filter_code(), "");
        assert_eq!(Category::Works.filter_code(), "RAD_PROCTRG_CATE_1");
    }

    #[test]
    fn test_parse_roc_date() {
        assert_eq!(
            parse_roc_date("114/11/17"),
            NaiveDate::from_ymd_opt(2025, 11, 17)
        );
        assert_eq!(
            parse_roc_date("2025/11/17"),
            NaiveDate::from_ymd_opt(2025, 11, 17)
        );
        assert_eq!(parse_roc_date("114/13/01"), None);
        assert_eq!(parse_roc_date("未公告"), None);
        assert_eq!(parse_roc_date("114/11"), None);
    }

    #[test]
    fn test_record_dates() {
        let record = TenderRecord::new("經濟部", "系統維護").with_dates("114/11/17", "114/12/01");
        assert_eq!(record.announced_on(), NaiveDate::from_ymd_opt(2025, 11, 17));
        assert_eq!(record.deadline_on(), NaiveDate::from_ymd_opt(2025, 12, 1));
    }
}
