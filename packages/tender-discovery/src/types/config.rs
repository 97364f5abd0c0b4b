//! Configuration for walking, retrying, scoring and state handling.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DiscoveryError, Result};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub walk: WalkConfig,

    #[serde(default)]
    pub ladder: LadderConfig,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub search: SearchConfig,

    /// Consumer keywords passed to the scorer on every walk.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from the environment (and `.env` if present).
    ///
    /// Recognized variables:
    /// - `DISCOVERY_MAX_DAYS_BACK`
    /// - `DISCOVERY_RETRY_BUDGET`
    /// - `DISCOVERY_FETCH_TIMEOUT_SECS`
    /// - `DISCOVERY_MAX_SEEN_KEYS`
    /// - `DISCOVERY_LATEST_DAYS`
    /// - `DISCOVERY_HIGH_VALUE_MIN_AMOUNT`
    /// - `BYPASS_DB_BROWSING` (true/1/yes)
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Some(days) = env_parse::<u32>("DISCOVERY_MAX_DAYS_BACK")? {
            config.walk.max_days_back = days;
        }
        if let Some(secs) = env_parse::<u64>("DISCOVERY_FETCH_TIMEOUT_SECS")? {
            config.walk.fetch_timeout_secs = secs;
        }
        if let Some(budget) = env_parse::<u32>("DISCOVERY_RETRY_BUDGET")? {
            config.ladder.retry_budget = budget;
        }
        if let Some(max) = env_parse::<usize>("DISCOVERY_MAX_SEEN_KEYS")? {
            config.state.max_seen_keys = Some(max);
        }
        if let Some(days) = env_parse::<u32>("DISCOVERY_LATEST_DAYS")? {
            config.search.latest_days = days;
        }
        if let Some(amount) = env_parse::<u64>("DISCOVERY_HIGH_VALUE_MIN_AMOUNT")? {
            config.search.high_value_min_amount = amount;
        }
        if let Ok(flag) = std::env::var("BYPASS_DB_BROWSING") {
            config.state.bypass_durable = parse_flag(&flag);
        }
        Ok(config)
    }

    pub fn with_walk(mut self, walk: WalkConfig) -> Self {
        self.walk = walk;
        self
    }

    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.ladder.retry_budget = budget;
        self
    }

    pub fn with_max_seen_keys(mut self, max: usize) -> Self {
        self.state.max_seen_keys = Some(max);
        self
    }

    pub fn bypass_durable(mut self) -> Self {
        self.state.bypass_durable = true;
        self
    }

    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keywords = keywords.into_iter().map(|k| k.into()).collect();
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }
}

/// How far and how wide the walker reaches upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Day horizon, counting today as day 0. Default: 30.
    pub max_days_back: u32,

    /// Page size for the first day walked in a call. Default: 200.
    pub first_day_page_size: u32,

    /// Page size for every later day. Default: 100.
    pub later_day_page_size: u32,

    /// Upper bound on the page size of a first-page lookup. Default: 100.
    pub first_page_size_cap: u32,

    /// Timeout for a single upstream call. Default: 30s.
    pub fetch_timeout_secs: u64,

    /// Fixed "today". `None` uses the local date.
    pub anchor_date: Option<NaiveDate>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_days_back: 30,
            first_day_page_size: 200,
            later_day_page_size: 100,
            first_page_size_cap: 100,
            fetch_timeout_secs: 30,
            anchor_date: None,
        }
    }
}

impl WalkConfig {
    pub fn with_max_days_back(mut self, days: u32) -> Self {
        self.max_days_back = days;
        self
    }

    pub fn with_page_sizes(mut self, first_day: u32, later_days: u32) -> Self {
        self.first_day_page_size = first_day;
        self.later_day_page_size = later_days;
        self
    }

    pub fn with_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    pub fn anchored_at(mut self, today: NaiveDate) -> Self {
        self.anchor_date = Some(today);
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// The day walking starts from.
    pub fn today(&self) -> NaiveDate {
        self.anchor_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Retry ladder for "more" requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderConfig {
    /// Page-hinted attempts before the full fallback walk. Default: 3.
    pub retry_budget: u32,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self { retry_budget: 3 }
    }
}

/// Browsing-state handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Keep at most this many seen keys, evicting the oldest.
    ///
    /// With a cap the session only guarantees no repeats among the last N
    /// delivered keys. `None` keeps every key for the whole session.
    pub max_seen_keys: Option<usize>,

    /// Skip durable reads and writes (session cache only).
    pub bypass_durable: bool,
}

/// Relevance scoring rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Each one found in the tender name adds `domain_keyword_bonus`.
    pub domain_keywords: Vec<String>,

    /// First one found in the organization adds `priority_org_bonus`.
    pub priority_orgs: Vec<String>,

    /// Method text marking an open tender.
    pub open_tender_marker: String,

    pub base_score: f64,
    pub name_keyword_bonus: f64,
    pub org_keyword_bonus: f64,
    pub domain_keyword_bonus: f64,
    pub priority_org_bonus: f64,
    pub open_tender_bonus: f64,
    pub correction_penalty: f64,

    /// `(threshold, bonus)` pairs, highest threshold first. Amounts strictly
    /// above a threshold earn its bonus; only the first match counts.
    pub budget_tiers: Vec<(u64, f64)>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            domain_keywords: [
                "資訊", "系統", "軟體", "硬體", "電腦", "網路", "伺服器", "資料庫", "雲端", "AI",
                "人工智慧", "智慧", "數位", "科技", "創新",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            priority_orgs: [
                "行政院", "經濟部", "教育部", "內政部", "財政部", "交通部", "國防部", "科技部",
                "衛生福利部",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            open_tender_marker: "公開招標".to_string(),
            base_score: 1.0,
            name_keyword_bonus: 3.0,
            org_keyword_bonus: 1.0,
            domain_keyword_bonus: 2.0,
            priority_org_bonus: 2.0,
            open_tender_bonus: 1.0,
            correction_penalty: 0.5,
            budget_tiers: vec![(100_000_000, 3.0), (50_000_000, 2.0), (10_000_000, 1.0)],
        }
    }
}

/// One-shot searches that bypass browsing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Days covered by a "latest" listing, counting today. Default: 3.
    pub latest_days: u32,

    /// Budget floor of a high-value listing. Default: 50,000,000.
    pub high_value_min_amount: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            latest_days: 3,
            high_value_min_amount: 50_000_000,
        }
    }
}

impl SearchConfig {
    pub fn with_latest_days(mut self, days: u32) -> Self {
        self.latest_days = days;
        self
    }

    pub fn with_high_value_min_amount(mut self, amount: u64) -> Self {
        self.high_value_min_amount = amount;
        self
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| DiscoveryError::Config {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_walk_contract() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.walk.max_days_back, 30);
        assert!(config.walk.first_day_page_size > config.walk.later_day_page_size);
        assert_eq!(config.ladder.retry_budget, 3);
        assert_eq!(config.state.max_seen_keys, None);
        assert!(!config.state.bypass_durable);
    }

    #[test]
    fn test_anchor_date_overrides_today() {
        let day = NaiveDate::from_ymd_opt(2025, 11, 17).unwrap();
        assert_eq!(WalkConfig::default().anchored_at(day).today(), day);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" yes "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let config: DiscoveryConfig =
            serde_json::from_str(r#"{"keywords": ["雲端"], "ladder": {"retry_budget": 5}}"#)
                .unwrap();
        assert_eq!(config.ladder.retry_budget, 5);
        assert_eq!(config.keywords, vec!["雲端"]);
        assert_eq!(config.walk.max_days_back, 30);
    }

    #[test]
    fn test_sections_accept_partial_objects() {
        let config: DiscoveryConfig = serde_json::from_str(
            r#"{
                "scoring": {"base_score": 2.0, "domain_keywords": ["橋梁"]},
                "walk": {"max_days_back": 7},
                "state": {"max_seen_keys": 500},
                "search": {"latest_days": 5}
            }"#,
        )
        .unwrap();

        assert_eq!(config.scoring.base_score, 2.0);
        assert_eq!(config.scoring.domain_keywords, vec!["橋梁"]);
        assert_eq!(config.scoring.open_tender_marker, "公開招標");
        assert_eq!(config.scoring.budget_tiers.len(), 3);
        assert_eq!(config.walk.max_days_back, 7);
        assert_eq!(config.walk.first_day_page_size, 200);
        assert_eq!(config.state.max_seen_keys, Some(500));
        assert_eq!(config.search.latest_days, 5);
        assert_eq!(config.search.high_value_min_amount, 50_000_000);
    }
}
