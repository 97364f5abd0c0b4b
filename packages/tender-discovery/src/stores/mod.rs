//! Durable browsing-state store implementations.

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStateStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStateStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStateStore;
