//! marketindex-storage — backends for the reindexer's collaborators.
//!
//! Backends:
//! - [`memory`] — in-memory event store, registries and sink (tests, replays
//!   from a JSON dump)
//! - [`sqlite`] — SQLite persistence sink via `sqlx`

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{
    MemoryEventStore, MemoryMarketplaces, MemoryMetadata, MemorySink, MemoryTokens, Snapshot,
};
