//! Persistence backends for HikeWise.
//!
//! Both backends implement every store trait from `hikewise-core`, so either
//! can be handed to the pipeline as an `Arc<dyn Store>`.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
