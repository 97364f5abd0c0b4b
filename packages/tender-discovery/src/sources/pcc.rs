//! Government e-procurement listing (web.pcc.gov.tw) over plain HTML.
//!
//! One request per `(category, day, page)`: the basic tender search with the
//! announcement date fixed to that day. Rows come from the `table#tpam`
//! result table.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{SourceError, SourceResult};
use crate::traits::source::{SourceQuery, TenderSource};
use crate::types::tender::TenderRecord;

/// Site root, used to absolutize tender links.
pub const PCC_BASE_URL: &str = "https://web.pcc.gov.tw";

/// Basic tender search endpoint.
pub const PCC_SEARCH_PATH: &str = "/prkms/tender/common/basic/readTenderBasic";

/// Rows with fewer cells are layout rows, not tenders.
const MIN_CELLS: usize = 10;

static RE_TENDER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z0-9\-]+").expect("valid tender id pattern"));

/// Connection settings for [`PccSource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PccConfig {
    /// Site root. Default: `https://web.pcc.gov.tw`.
    pub base_url: String,

    /// HTTP request timeout. Default: 30s.
    pub timeout_secs: u64,

    /// Accept certificates that fail verification. The government site has
    /// served incomplete chains before. Default: false.
    pub accept_invalid_certs: bool,
}

impl Default for PccConfig {
    fn default() -> Self {
        Self {
            base_url: PCC_BASE_URL.to_string(),
            timeout_secs: 30,
            accept_invalid_certs: false,
        }
    }
}

impl PccConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

/// HTML-scraping Source Adapter for the procurement listing.
pub struct PccSource {
    client: reqwest::Client,
    base: Url,
    endpoint: Url,
}

impl PccSource {
    pub fn new(config: PccConfig) -> SourceResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| SourceError::Parse(format!("invalid base url {}: {}", config.base_url, e)))?;
        let endpoint = base
            .join(PCC_SEARCH_PATH)
            .map_err(|e| SourceError::Parse(format!("invalid endpoint: {}", e)))?;

        // The listing rejects clients that don't look like a browser
        let user_agent = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36";

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert(
            reqwest::header::CONNECTION,
            reqwest::header::HeaderValue::from_static("keep-alive"),
        );
        headers.insert(
            reqwest::header::UPGRADE_INSECURE_REQUESTS,
            reqwest::header::HeaderValue::from_static("1"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(user_agent)
            .default_headers(headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| SourceError::Http(Box::new(e)))?;

        Ok(Self {
            client,
            base,
            endpoint,
        })
    }
}

#[async_trait]
impl TenderSource for PccSource {
    async fn fetch(&self, query: &SourceQuery) -> SourceResult<Vec<TenderRecord>> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&query_params(query))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout {
                        date: query.date_param(),
                        page: query.page,
                    }
                } else {
                    SourceError::Http(Box::new(e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SourceError::Http(Box::new(e)))?;

        let records = parse_listing(&html, &self.base)?;
        debug!(
            category = %query.category,
            date = %query.date,
            page = query.page,
            rows = records.len(),
            "Fetched listing page"
        );
        Ok(records)
    }
}

/// Query string for one listing page.
pub fn query_params(query: &SourceQuery) -> Vec<(&'static str, String)> {
    let date = query.date_param();
    vec![
        ("pageSize", query.page_size.to_string()),
        ("firstSearch", (query.page == 1).to_string()),
        ("searchType", "basic".to_string()),
        ("isBinding", "N".to_string()),
        ("isLogIn", "N".to_string()),
        ("level_1", "on".to_string()),
        ("orgName", String::new()),
        ("orgId", String::new()),
        ("tenderName", query.tender_name.clone().unwrap_or_default()),
        ("tenderId", String::new()),
        ("dateType", "isDate".to_string()),
        ("tenderStartDate", date.clone()),
        ("tenderEndDate", date),
        ("radProctrgCate", query.category.filter_code().to_string()),
        ("policyAdvocacy", String::new()),
        ("d-49738-p", query.page.to_string()),
    ]
}

/// Parse the result table. A page without the table is a parse error; a
/// table without rows is an empty page.
pub fn parse_listing(html: &str, base: &Url) -> SourceResult<Vec<TenderRecord>> {
    let document = Html::parse_document(html);
    let table_selector = selector("table#tpam")?;
    let row_selector = selector("tbody tr")?;
    let cell_selector = selector("td")?;
    let link_selector = selector("a")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| SourceError::Parse("result table not found".to_string()))?;

    let records = table
        .select(&row_selector)
        .filter_map(|row| {
            let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
            parse_row(&cells, &link_selector, base)
        })
        .collect();

    Ok(records)
}

fn parse_row(cells: &[ElementRef], link_selector: &Selector, base: &Url) -> Option<TenderRecord> {
    if cells.len() < MIN_CELLS {
        return None;
    }

    let tender_cell = cells[2];
    let raw_tender_text: String = tender_cell.text().collect();
    let tender_id = RE_TENDER_ID
        .find(&raw_tender_text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let (tender_name, tender_url) = match tender_cell.select(link_selector).next() {
        Some(link) => {
            let href = link.value().attr("href").unwrap_or_default();
            (cell_text(link), absolutize(base, href))
        }
        None => (String::new(), String::new()),
    };

    let mut record = TenderRecord::new(cell_text(cells[1]), tender_name)
        .with_id(tender_id)
        .with_method(cell_text(cells[4]))
        .with_nature(cell_text(cells[5]))
        .with_dates(cell_text(cells[6]), cell_text(cells[7]))
        .with_url(tender_url);

    if let Some(amount) = parse_budget(&cell_text(cells[8])) {
        record = record.with_budget(amount);
    }
    if raw_tender_text.contains("更正公告") {
        record = record.correction();
    }

    Some(record)
}

/// Text of an element with each text node trimmed.
fn cell_text(element: ElementRef) -> String {
    element.text().map(str::trim).collect()
}

fn absolutize(base: &Url, href: &str) -> String {
    if href.is_empty() {
        return String::new();
    }
    base.join(href)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// `1,234,567` → 1234567. Anything else is unknown.
fn parse_budget(text: &str) -> Option<u64> {
    let digits = text.replace(',', "");
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn selector(css: &str) -> SourceResult<Selector> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("bad selector {}: {}", css, e)))
}
