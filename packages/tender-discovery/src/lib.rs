//! Paginated Tender Discovery
//!
//! Serves "first page" and "more" requests over a government procurement
//! listing whose pagination is unstable. Each consumer gets an ordered,
//! relevance-ranked batch that never repeats a tender already delivered in
//! the same browsing session.
//!
//! # How it works
//!
//! - Tenders are identified by case number (or name) **and** by
//!   `name|organization`, and a tender is excluded when either key was seen
//! - Discovery walks backward one calendar day per upstream query, up to a
//!   day horizon, accumulating novel records
//! - "More" retries successive page hints before a full fallback walk
//! - Browsing state lives in a durable store shared across processes, with a
//!   session cache that takes over when the store is unreachable
//!
//! # Usage
//!
//! ```rust,ignore
//! use tender_discovery::{Category, DiscoveryConfig, DiscoveryEngine, NextPage};
//! use tender_discovery::sources::{PccConfig, PccSource};
//! use tender_discovery::stores::SqliteStateStore;
//!
//! let source = PccSource::new(PccConfig::default())?;
//! let store = SqliteStateStore::new("sqlite://./discovery.db?mode=rwc").await?;
//! let engine = DiscoveryEngine::new(source, store, DiscoveryConfig::from_env()?);
//!
//! let first = engine.first_page("line:U123", Category::Works, 10).await;
//! if let NextPage::Batch(more) = engine.next_page("line:U123", Category::Works, 10).await {
//!     // disjoint from `first`
//! }
//! ```
//!
//! # Modules
//!
//! - [`engine`] - First page / more / reset facade
//! - [`walker`] - Multi-day accumulation of novel records
//! - [`browsing`] - Browsing state across session cache and durable store
//! - [`scoring`] - Relevance scoring and ranking
//! - [`identity`] - Identity and composite dedup keys
//! - [`sources`] - Upstream listing adapters
//! - [`stores`] - Durable state stores
//! - [`testing`] - Mock implementations for testing

pub mod browsing;
pub mod engine;
pub mod error;
pub mod identity;
pub mod scoring;
pub mod session;
pub mod sources;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod walker;

// Re-export core types at crate root
pub use error::{DiscoveryError, SourceError, StoreError};
pub use traits::{
    source::{SourceQuery, TenderSource},
    store::StateStore,
};
pub use types::{
    config::{
        DiscoveryConfig, LadderConfig, ScoringConfig, SearchConfig, StateConfig, WalkConfig,
    },
    state::{BrowsingState, SeenSet},
    tender::{parse_roc_date, Category, ScoredTender, TenderRecord},
};

pub use browsing::BrowsingStateStore;
pub use engine::{Batch, DiscoveryEngine, Ladder, NextPage};
pub use identity::TenderKeys;
pub use scoring::RelevanceScorer;
pub use session::{ConsumerGuard, ConsumerLocks, SessionCache};
pub use walker::{PaginationWalker, WalkOutcome, WalkRequest, WalkState};

// Re-export stores
pub use stores::MemoryStateStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteStateStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStateStore;
