//! # Store Adapters
//!
//! Implementations of [`crate::store::EntityStore`].

pub mod memory_store;

#[cfg(feature = "postgres")]
pub mod postgres_store;

pub use memory_store::{InMemoryEntityStore, StoreSnapshot};

#[cfg(feature = "postgres")]
pub use postgres_store::{PostgresEntityStore, PostgresStoreConfig};
