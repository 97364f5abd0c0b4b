//! PostgreSQL state store against a throwaway container.
//!
//! Requires Docker. Run with:
//! `cargo test -p tender-discovery --features postgres -- --ignored`

#![cfg(feature = "postgres")]

use tender_discovery::stores::PostgresStateStore;
use tender_discovery::{BrowsingState, Category, StateStore};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers_modules::postgres::Postgres;

#[tokio::test]
#[ignore = "requires docker"]
async fn test_postgres_state_roundtrip_and_single_slot() {
    let container = Postgres::default().with_tag("16").start().await.unwrap();
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

    let store = PostgresStateStore::new(&url).await.unwrap();

    let state = BrowsingState::new(Category::Works)
        .with_seen(["X", "Y"].into_iter().collect())
        .with_page(3);
    store.put_state("u1", &state).await.unwrap();

    let loaded = store.get_state("u1").await.unwrap().unwrap();
    assert_eq!(loaded.category, Category::Works);
    assert_eq!(loaded.seen, state.seen);
    assert_eq!(loaded.page, 3);

    store
        .put_state("u1", &BrowsingState::new(Category::Goods))
        .await
        .unwrap();
    let replaced = store.get_state("u1").await.unwrap().unwrap();
    assert_eq!(replaced.category, Category::Goods);
    assert!(replaced.seen.is_empty());

    store.delete_state("u1").await.unwrap();
    assert!(store.get_state("u1").await.unwrap().is_none());
}
