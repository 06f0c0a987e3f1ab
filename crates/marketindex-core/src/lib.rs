//! marketindex-core — data model and replay machinery for rebuilding NFT
//! marketplace state from its event log.
//!
//! # Architecture
//!
//! ```text
//! RawEvent page ─▶ EventSet ─▶ EventSetSummarizer ─▶ ActionSummary
//!                                                        │
//!                              HandlerRegistry ◀─────────┘
//!                                    │  (one ActionHandler per ActionKind)
//!                                    ▼
//!                              ReindexState (auctions / orders / offers)
//! ```
//!
//! The driver that pages the log and persists the result lives in
//! `marketindex-reindex`; backends for the [`services`] traits live in
//! `marketindex-storage`.

pub mod action;
pub mod config;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod lock;
pub mod records;
pub mod services;
pub mod state;
pub mod summary;
pub mod topics;
pub mod types;

pub use action::{Action, ActionKind, ActionSummary};
pub use config::{ReindexConfig, RunPhase};
pub use error::{ReindexError, SummaryError, TopicError};
pub use handler::{ActionHandler, HandlerRegistry};
pub use lock::{ReindexGuard, ReindexLocks};
pub use records::{
    AuctionRecord, AuctionStatus, AuctionType, Lifecycle, OfferRecord, OfferStatus, OrderRecord,
    OrderStatus,
};
pub use services::{EventStore, MarketplaceRegistry, MetadataService, PersistenceSink, TokenService};
pub use state::{ExpirySweep, ReindexState};
pub use summary::EventSetSummarizer;
pub use types::{
    AuctionLookup, EventSet, Marketplace, MarketplaceKind, NftTags, PaymentToken, RawEvent, Token,
};
