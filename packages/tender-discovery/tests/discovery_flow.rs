//! End-to-end browsing sessions against a mock listing.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tender_discovery::identity;
use tender_discovery::testing::{sample_tenders, MockSource};
use tender_discovery::{
    BrowsingState, Category, DiscoveryConfig, DiscoveryEngine, MemoryStateStore, NextPage,
    RelevanceScorer, StateStore, TenderRecord, WalkConfig,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 17).unwrap()
}

fn days_ago(n: u64) -> NaiveDate {
    today().checked_sub_days(Days::new(n)).unwrap()
}

fn config(max_days_back: u32) -> DiscoveryConfig {
    DiscoveryConfig::default().with_walk(
        WalkConfig::default()
            .anchored_at(today())
            .with_max_days_back(max_days_back),
    )
}

fn keys_of(records: &[TenderRecord]) -> HashSet<String> {
    records
        .iter()
        .flat_map(|r| {
            identity::resolve(r)
                .iter()
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn overlaps(records: &[TenderRecord], delivered: &HashSet<String>) -> bool {
    records
        .iter()
        .any(|r| identity::resolve(r).iter().any(|k| delivered.contains(k)))
}

#[tokio::test]
async fn test_first_page_then_two_more_are_disjoint() {
    let source = MockSource::new()
        .with_page(today(), 1, sample_tenders("A", 30))
        .with_page(today(), 2, sample_tenders("B", 15))
        .with_page(days_ago(1), 1, sample_tenders("C", 15));
    let engine = DiscoveryEngine::new(source, MemoryStateStore::new(), config(30));

    let first = engine.first_page("u1", Category::Works, 10).await;
    assert_eq!(first.len(), 10);
    assert!(first
        .records
        .iter()
        .all(|r| r.category == Some(Category::Works)));

    let mut delivered = keys_of(&first.records);
    for _ in 0..2 {
        let more = engine
            .next_page("u1", Category::Works, 10)
            .await
            .batch()
            .expect("session exists");
        assert_eq!(more.len(), 10);
        assert!(!overlaps(&more.records, &delivered));
        assert!(more
            .records
            .iter()
            .all(|r| r.category == Some(Category::Works)));
        delivered.extend(keys_of(&more.records));
    }
}

#[tokio::test]
async fn test_category_switch_resets_state() {
    let source = MockSource::new().with_day(today(), sample_tenders("A", 5));
    let engine = DiscoveryEngine::new(source, MemoryStateStore::new(), config(3));

    engine.first_page("u1", Category::Works, 3).await;
    assert!(!engine
        .next_page("u1", Category::Works, 3)
        .await
        .is_no_baseline());

    assert_eq!(
        engine.next_page("u1", Category::Goods, 3).await,
        NextPage::NoBaseline
    );

    // A first page for the new category replaces the old session
    engine.first_page("u1", Category::Goods, 3).await;
    assert!(engine
        .next_page("u1", Category::Works, 3)
        .await
        .is_no_baseline());
}

#[tokio::test]
async fn test_empty_listing_never_errors() {
    let source = MockSource::new();
    let durable = MemoryStateStore::new()
        .with_state("seeded", BrowsingState::new(Category::Services).with_page(2));
    let engine = DiscoveryEngine::new(source, durable, config(3));

    let first = engine.first_page("u1", Category::Services, 10).await;
    assert!(first.is_empty());
    assert!(engine
        .next_page("u1", Category::Services, 10)
        .await
        .is_no_baseline());

    for _ in 0..2 {
        let more = engine
            .next_page("seeded", Category::Services, 10)
            .await
            .batch()
            .unwrap();
        assert!(more.is_empty());
        assert_eq!(more.page, 2);
    }
}

#[tokio::test]
async fn test_durable_state_from_another_process_is_used() {
    let durable = MemoryStateStore::new().with_state(
        "u1",
        BrowsingState::new(Category::Works)
            .with_seen(["X", "Y"].into_iter().collect())
            .with_page(3),
    );
    let source = MockSource::new().with_page(
        today(),
        4,
        vec![
            TenderRecord::new("甲", "案一").with_id("X"),
            TenderRecord::new("乙", "案二").with_id("Y"),
            TenderRecord::new("丙", "案三").with_id("Z"),
        ],
    );
    let engine = DiscoveryEngine::new(source.clone(), durable, config(2));

    let batch = engine
        .next_page("u1", Category::Works, 10)
        .await
        .batch()
        .expect("durable state is a baseline");

    let ids: Vec<_> = batch.records.iter().map(|r| r.tender_id.as_str()).collect();
    assert_eq!(ids, vec!["Z"]);
    assert_eq!(source.calls()[0].page, 4);
    assert_eq!(batch.page, 4);
}

#[tokio::test]
async fn test_two_engines_share_one_durable_store() {
    let durable = Arc::new(MemoryStateStore::new());
    let source = MockSource::new()
        .with_page(today(), 1, sample_tenders("A", 6))
        .with_page(today(), 2, sample_tenders("B", 6));

    let a = DiscoveryEngine::new(source.clone(), durable.clone(), config(2));
    let b = DiscoveryEngine::new(source, durable.clone(), config(2));

    let first = a.first_page("u1", Category::Goods, 3).await;
    let more = b
        .next_page("u1", Category::Goods, 3)
        .await
        .batch()
        .expect("engine b sees engine a's session");

    assert!(!overlaps(&more.records, &keys_of(&first.records)));
    let stored = durable.get_state("u1").await.unwrap().unwrap();
    assert_eq!(stored.seen.len(), 12);
}

#[test]
fn test_budget_raises_score() {
    let scorer = RelevanceScorer::default();
    let high = scorer.score(&TenderRecord::new("o", "n").with_budget(150_000_000), &[]);
    let low = scorer.score(&TenderRecord::new("o", "n").with_budget(5_000_000), &[]);
    assert!(high - low >= 2.0);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_session_survives_restart_with_sqlite() {
    use tender_discovery::stores::SqliteStateStore;

    let durable = Arc::new(SqliteStateStore::in_memory().await.unwrap());
    let source = MockSource::new()
        .with_page(today(), 1, sample_tenders("A", 4))
        .with_page(days_ago(1), 1, sample_tenders("B", 4));

    let before = DiscoveryEngine::new(source.clone(), durable.clone(), config(3));
    let first = before.first_page("u1", Category::Works, 4).await;
    drop(before);

    let after = DiscoveryEngine::new(source, durable, config(3));
    let more = after
        .next_page("u1", Category::Works, 4)
        .await
        .batch()
        .unwrap();

    assert_eq!(more.len(), 4);
    assert!(!overlaps(&more.records, &keys_of(&first.records)));
}

/// `(day, page, id, name, org)` with small domains so keys collide often.
fn listing_rows() -> impl Strategy<Value = Vec<(u64, u32, u8, u8, u8)>> {
    proptest::collection::vec((0u64..4, 1u32..4, 0u8..12, 0u8..12, 0u8..3), 0..60)
}

fn build_source(rows: &[(u64, u32, u8, u8, u8)]) -> MockSource {
    let source = MockSource::new();
    let mut pages: std::collections::HashMap<(NaiveDate, u32), Vec<TenderRecord>> =
        Default::default();
    for (day, page, id, name, org) in rows {
        // id 0 stands for a missing case number
        let id = if *id == 0 { String::new() } else { format!("ID{}", id) };
        let record = TenderRecord::new(format!("機關{}", org), format!("案{}", name)).with_id(id);
        pages
            .entry((days_ago(*day), *page))
            .or_default()
            .push(record);
    }
    for ((date, page), records) in pages {
        source.set_page(date, page, records);
    }
    source
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_no_duplicates_across_a_session(
        rows in listing_rows(),
        count in 1usize..6,
        rounds in 1usize..6,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let source = build_source(&rows);
            let engine = DiscoveryEngine::new(source, MemoryStateStore::new(), config(4));

            let first = engine.first_page("u1", Category::Works, count).await;
            let mut delivered = keys_of(&first.records);

            for _ in 0..rounds {
                match engine.next_page("u1", Category::Works, count).await {
                    NextPage::Batch(batch) => {
                        prop_assert!(batch.len() <= count);
                        prop_assert!(!overlaps(&batch.records, &delivered));
                        delivered.extend(keys_of(&batch.records));
                    }
                    NextPage::NoBaseline => prop_assert!(first.is_empty()),
                }
            }
            Ok(())
        })?;
    }
}
