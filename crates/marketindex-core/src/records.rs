//! Materialized auction, order and offer rows.
//!
//! Each record carries a status with a fixed set of legal transitions. Moving
//! out of a terminal status is refused by [`Lifecycle::transition`], which is
//! the only way handlers change a status.

use serde::{Deserialize, Serialize};

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// A status with a fixed transition table.
pub trait Lifecycle: Copy + PartialEq + std::fmt::Debug {
    /// Returns `true` if moving from `self` to `next` is legal.
    fn can_transition_to(self, next: Self) -> bool;

    /// Returns `true` if no transition leaves this status.
    fn is_terminal(self) -> bool;

    /// Apply `next` to `current` if legal. Returns `true` if the status changed.
    fn transition(current: &mut Self, next: Self) -> bool {
        if *current == next {
            return false;
        }
        if !current.can_transition_to(next) {
            tracing::debug!(from = ?current, to = ?next, "illegal status transition refused");
            return false;
        }
        *current = next;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuctionStatus {
    Running,
    Ended,
    Claimable,
    Closed,
    Expired,
}

impl Lifecycle for AuctionStatus {
    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Ended | Self::Claimable | Self::Closed | Self::Expired)
        )
    }

    fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Active,
    Outbid,
    Bought,
}

impl Lifecycle for OrderStatus {
    fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Active, Self::Outbid | Self::Bought))
    }

    fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferStatus {
    Created,
    Accepted,
    Closed,
}

impl Lifecycle for OfferStatus {
    fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Created, Self::Accepted | Self::Closed))
    }

    fn is_terminal(self) -> bool {
        !matches!(self, Self::Created)
    }
}

/// How the auctioned tokens are sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuctionType {
    /// A single NFT.
    #[default]
    Nft,
    /// All SFT units go to one buyer.
    SftAll,
    /// SFT units are bought one payment at a time.
    SftOnePerPayment,
}

impl AuctionType {
    /// Map the on-chain auction type discriminant. Unknown values fall back to `Nft`.
    pub fn from_discriminant(value: u64) -> Self {
        match value {
            1 => Self::SftAll,
            2 => Self::SftOnePerPayment,
            _ => Self::Nft,
        }
    }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionRecord {
    /// Persistent id, assigned by the persistence sink.
    pub id: Option<i64>,
    pub marketplace_auction_id: u64,
    pub marketplace_key: String,
    pub collection: String,
    pub nonce: u64,
    pub identifier: String,
    pub nr_auctioned_tokens: u64,
    pub status: AuctionStatus,
    pub auction_type: AuctionType,
    pub payment_token: String,
    pub payment_nonce: u64,
    pub owner_address: String,
    pub min_bid: u128,
    pub min_bid_denominated: f64,
    pub max_bid: u128,
    pub max_bid_denominated: f64,
    pub min_bid_diff: u128,
    pub start_date: i64,
    pub end_date: i64,
    pub tags: Vec<String>,
    /// Hash of the transaction that started the auction.
    pub block_hash: String,
}

impl AuctionRecord {
    pub fn is_running(&self) -> bool {
        self.status == AuctionStatus::Running
    }

    pub fn set_status(&mut self, next: AuctionStatus) -> bool {
        AuctionStatus::transition(&mut self.status, next)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Position of the auction in `ReindexState::auctions`.
    pub auction_index: usize,
    /// Persistent id of the auction, bound right before persisting.
    pub auction_id: Option<i64>,
    pub marketplace_key: String,
    pub owner_address: String,
    pub price_token: String,
    pub price_nonce: u64,
    pub price_amount: u128,
    pub price_amount_denominated: f64,
    pub bought_tokens: u64,
    pub status: OrderStatus,
    /// Hash of the transaction that placed the order.
    pub block_hash: String,
    pub timestamp: i64,
}

impl OrderRecord {
    pub fn set_status(&mut self, next: OrderStatus) -> bool {
        OrderStatus::transition(&mut self.status, next)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferRecord {
    pub marketplace_offer_id: u64,
    pub marketplace_key: String,
    pub collection: String,
    /// `0` for collection-wide offers.
    pub nonce: u64,
    pub identifier: String,
    pub price_token: String,
    pub price_nonce: u64,
    pub price_amount: u128,
    pub price_amount_denominated: f64,
    pub quantity: u64,
    pub owner_address: String,
    pub status: OfferStatus,
    pub end_date: i64,
    /// Hash of the transaction that created the offer.
    pub block_hash: String,
    /// Hash of the transaction that accepted the offer.
    pub accepted_tx_hash: Option<String>,
    pub timestamp: i64,
}

impl OfferRecord {
    pub fn set_status(&mut self, next: OfferStatus) -> bool {
        OfferStatus::transition(&mut self.status, next)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
