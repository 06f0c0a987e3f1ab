//! Reindex configuration and run phases.

use serde::{Deserialize, Serialize};

use crate::error::ReindexError;

/// Configuration for a reindexer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReindexConfig {
    /// How many events to request per event store page.
    pub page_size: usize,
    /// How many identifiers to send per metadata request.
    pub metadata_batch_size: usize,
    /// Metadata requests in flight at once.
    pub metadata_concurrency: usize,
    /// Identifier of the chain's native token.
    pub native_token: String,
    /// Decimals of the native token; also the fallback for unknown tokens.
    pub native_decimals: u32,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            metadata_batch_size: 100,
            metadata_concurrency: 4,
            native_token: "EGLD".into(),
            native_decimals: 18,
        }
    }
}

impl ReindexConfig {
    pub fn validate(&self) -> Result<(), ReindexError> {
        if self.page_size == 0 {
            return Err(ReindexError::Config("page_size must be at least 1".into()));
        }
        if self.metadata_batch_size == 0 {
            return Err(ReindexError::Config(
                "metadata_batch_size must be at least 1".into(),
            ));
        }
        if self.metadata_concurrency == 0 {
            return Err(ReindexError::Config(
                "metadata_concurrency must be at least 1".into(),
            ));
        }
        if self.native_token.is_empty() {
            return Err(ReindexError::Config("native_token must not be empty".into()));
        }
        Ok(())
    }
}

/// Where a reindex run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Paging the event log and dispatching event sets.
    Replaying,
    /// Closing out auctions and offers past their deadline.
    Sweeping,
    /// Filling in missing NFT tags.
    BackfillingTags,
    /// Handing the snapshot to the persistence sink.
    Persisting,
    Done,
    Failed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replaying => write!(f, "replaying"),
            Self::Sweeping => write!(f, "sweeping"),
            Self::BackfillingTags => write!(f, "backfilling-tags"),
            Self::Persisting => write!(f, "persisting"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
