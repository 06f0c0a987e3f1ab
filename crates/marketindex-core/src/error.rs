//! Error types for the reindex pipeline.

use thiserror::Error;

use crate::action::ActionKind;

/// Errors that end a reindex run.
///
/// Handlers never produce these; the driver is the only place they surface.
#[derive(Debug, Error)]
pub enum ReindexError {
    #[error("Event store error: {0}")]
    EventStore(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Metadata service error: {0}")]
    Metadata(String),

    #[error("Token service error: {0}")]
    Token(String),

    #[error("No marketplace registered at address {address}")]
    MarketplaceNotFound { address: String },

    #[error("Unsupported marketplace action '{identifier}' in tx {tx_hash}")]
    UnsupportedAction { identifier: String, tx_hash: String },

    #[error("No handler registered for {kind}")]
    MissingHandler { kind: ActionKind },

    #[error("A handler is already registered for {kind}")]
    DuplicateHandler { kind: ActionKind },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl ReindexError {
    /// Returns `true` if the error means the event log carries actions this
    /// build does not understand.
    pub fn is_version_skew(&self) -> bool {
        matches!(self, Self::UnsupportedAction { .. })
    }
}

/// Errors raised while decoding the topics of a single raw event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("Missing required topic at index {index}")]
    Missing { index: usize },

    #[error("Topic {index} is not valid base64: {reason}")]
    Base64 { index: usize, reason: String },

    #[error("Topic {index} is {len} bytes, wider than the {max}-byte target")]
    TooWide { index: usize, len: usize, max: usize },

    #[error("Topic {index} is not valid UTF-8")]
    Utf8 { index: usize },

    #[error("Topic {index} is not a valid address: {reason}")]
    Address { index: usize, reason: String },
}

/// Errors raised while summarizing an event set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummaryError {
    /// The marketplace contract emitted an action this build has no mapping for.
    #[error("Unknown marketplace action '{identifier}' in tx {tx_hash}")]
    UnknownAction { identifier: String, tx_hash: String },

    #[error("Failed to decode '{identifier}' in tx {tx_hash}: {source}")]
    Decode {
        identifier: String,
        tx_hash: String,
        #[source]
        source: TopicError,
    },
}

impl From<SummaryError> for ReindexError {
    fn from(err: SummaryError) -> Self {
        match err {
            SummaryError::UnknownAction { identifier, tx_hash } => {
                Self::UnsupportedAction { identifier, tx_hash }
            }
            other => Self::Other(other.to_string()),
        }
    }
}
