//! Collaborators the reindexer talks to.
//!
//! Implementations live in `marketindex-storage` (in-memory, SQLite) or in the
//! embedding service. All of them are shared behind `Arc<dyn …>`.

use async_trait::async_trait;

use crate::error::ReindexError;
use crate::records::{AuctionRecord, OfferRecord, OrderRecord};
use crate::types::{Marketplace, NftTags, RawEvent, Token};

/// Source of the historical marketplace event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events emitted to `address` with `timestamp >= from_timestamp`, in
    /// ascending `(timestamp, log position)` order, skipping the first `skip`
    /// matches and returning at most `limit`.
    ///
    /// A result shorter than `limit` means the log is exhausted.
    async fn events_ascending(
        &self,
        address: &str,
        from_timestamp: i64,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<RawEvent>, ReindexError>;
}

/// Lookup of marketplace descriptors.
#[async_trait]
pub trait MarketplaceRegistry: Send + Sync {
    async fn marketplace_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Marketplace>, ReindexError>;
}

/// Lookup of fungible token metadata.
#[async_trait]
pub trait TokenService: Send + Sync {
    async fn token(&self, identifier: &str) -> Result<Option<Token>, ReindexError>;
}

/// NFT metadata source, used to backfill auction tags.
#[async_trait]
pub trait MetadataService: Send + Sync {
    /// Metadata for `identifiers`, starting at `offset`, restricted to `fields`.
    /// Identifiers the service does not know are left out of the result.
    async fn nfts_by_identifiers(
        &self,
        identifiers: &[String],
        offset: usize,
        fields: &[&str],
    ) -> Result<Vec<NftTags>, ReindexError>;
}

/// Bulk sink for the finished snapshot.
///
/// Every save is an upsert on the record's natural key, so persisting the same
/// snapshot twice leaves one copy.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Upsert auctions keyed by `(marketplace_auction_id, marketplace_key)`.
    /// Returns the persistent ids in input order.
    async fn save_auctions(&self, auctions: &[AuctionRecord]) -> Result<Vec<i64>, ReindexError>;

    /// Upsert orders keyed by `(auction_id, block_hash)`. Every order has its
    /// `auction_id` bound.
    async fn save_orders(&self, orders: &[OrderRecord]) -> Result<(), ReindexError>;

    /// Upsert offers keyed by `(marketplace_offer_id, marketplace_key)`.
    async fn save_offers(&self, offers: &[OfferRecord]) -> Result<(), ReindexError>;
}
