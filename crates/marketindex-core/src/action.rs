//! Decoded marketplace actions.
//!
//! One [`ActionSummary`] is the typed projection of one marketplace log. The
//! kind-specific fields live in the [`Action`] payload; everything the driver
//! needs regardless of kind sits on the summary itself.

use serde::{Deserialize, Serialize};

use crate::records::AuctionType;
use crate::types::token_identifier;

/// The closed set of actions the reindexer replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionKind {
    StartedAuction,
    Bid,
    Bought,
    EndedAuction,
    ClosedAuction,
    PriceUpdated,
    Updated,
    OfferCreated,
    OfferAccepted,
    OfferClosed,
    GlobalOfferAccepted,
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        Self::StartedAuction,
        Self::Bid,
        Self::Bought,
        Self::EndedAuction,
        Self::ClosedAuction,
        Self::PriceUpdated,
        Self::Updated,
        Self::OfferCreated,
        Self::OfferAccepted,
        Self::OfferClosed,
        Self::GlobalOfferAccepted,
    ];

    /// Returns `true` if the handler prices amounts and so needs the payment
    /// token resolved before dispatch.
    pub fn needs_payment_token(self) -> bool {
        match self {
            Self::StartedAuction
            | Self::Bid
            | Self::Bought
            | Self::EndedAuction
            | Self::PriceUpdated
            | Self::Updated
            | Self::OfferCreated => true,
            Self::ClosedAuction
            | Self::OfferAccepted
            | Self::OfferClosed
            | Self::GlobalOfferAccepted => false,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::StartedAuction => "started-auction",
            Self::Bid => "bid",
            Self::Bought => "bought",
            Self::EndedAuction => "ended-auction",
            Self::ClosedAuction => "closed-auction",
            Self::PriceUpdated => "price-updated",
            Self::Updated => "updated",
            Self::OfferCreated => "offer-created",
            Self::OfferAccepted => "offer-accepted",
            Self::OfferClosed => "offer-closed",
            Self::GlobalOfferAccepted => "global-offer-accepted",
        };
        f.write_str(name)
    }
}

// ─── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionStarted {
    pub auction_id: u64,
    pub collection: String,
    pub nonce: u64,
    pub quantity: u64,
    pub owner: String,
    pub min_bid: u128,
    pub max_bid: u128,
    pub min_bid_diff: u128,
    pub start_time: i64,
    pub deadline: i64,
    pub auction_type: AuctionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidPlaced {
    pub auction_id: u64,
    pub collection: String,
    pub nonce: u64,
    pub quantity: u64,
    pub bidder: String,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensBought {
    pub auction_id: u64,
    pub collection: String,
    pub nonce: u64,
    pub quantity: u64,
    pub buyer: String,
    pub price: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionEnded {
    pub auction_id: u64,
    pub collection: String,
    pub nonce: u64,
    pub winner: Option<String>,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionClosed {
    pub auction_id: u64,
    pub collection: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdated {
    pub auction_id: u64,
    pub collection: String,
    pub nonce: u64,
    pub new_price: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingUpdated {
    pub auction_id: u64,
    pub collection: String,
    pub nonce: u64,
    pub new_price: Option<u128>,
    pub deadline: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferCreated {
    pub offer_id: u64,
    pub collection: String,
    pub nonce: u64,
    pub owner: String,
    pub amount: u128,
    pub quantity: u64,
    pub deadline: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferAccepted {
    pub offer_id: u64,
    pub collection: String,
    pub nonce: u64,
    pub seller: String,
    /// `0` when the NFT was not listed.
    pub auction_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferClosed {
    pub offer_id: u64,
    pub collection: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalOfferAccepted {
    pub global_offer_id: u64,
    pub collection: String,
    /// Nonce of the NFT that was sold into the offer.
    pub nonce: u64,
    pub offer_owner: String,
    pub seller: String,
    pub amount: u128,
    /// `0` when the NFT was not listed.
    pub auction_id: u64,
}

/// Kind-specific part of an [`ActionSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    StartedAuction(AuctionStarted),
    Bid(BidPlaced),
    Bought(TokensBought),
    EndedAuction(AuctionEnded),
    ClosedAuction(AuctionClosed),
    PriceUpdated(PriceUpdated),
    Updated(ListingUpdated),
    OfferCreated(OfferCreated),
    OfferAccepted(OfferAccepted),
    OfferClosed(OfferClosed),
    GlobalOfferAccepted(GlobalOfferAccepted),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::StartedAuction(_) => ActionKind::StartedAuction,
            Self::Bid(_) => ActionKind::Bid,
            Self::Bought(_) => ActionKind::Bought,
            Self::EndedAuction(_) => ActionKind::EndedAuction,
            Self::ClosedAuction(_) => ActionKind::ClosedAuction,
            Self::PriceUpdated(_) => ActionKind::PriceUpdated,
            Self::Updated(_) => ActionKind::Updated,
            Self::OfferCreated(_) => ActionKind::OfferCreated,
            Self::OfferAccepted(_) => ActionKind::OfferAccepted,
            Self::OfferClosed(_) => ActionKind::OfferClosed,
            Self::GlobalOfferAccepted(_) => ActionKind::GlobalOfferAccepted,
        }
    }

    /// The `(auction id, collection, nonce)` this action refers to, if any.
    pub fn auction_ref(&self) -> Option<(u64, &str, u64)> {
        match self {
            Self::StartedAuction(a) => Some((a.auction_id, a.collection.as_str(), a.nonce)),
            Self::Bid(a) => Some((a.auction_id, a.collection.as_str(), a.nonce)),
            Self::Bought(a) => Some((a.auction_id, a.collection.as_str(), a.nonce)),
            Self::EndedAuction(a) => Some((a.auction_id, a.collection.as_str(), a.nonce)),
            Self::ClosedAuction(a) => Some((a.auction_id, a.collection.as_str(), a.nonce)),
            Self::PriceUpdated(a) => Some((a.auction_id, a.collection.as_str(), a.nonce)),
            Self::Updated(a) => Some((a.auction_id, a.collection.as_str(), a.nonce)),
            Self::OfferAccepted(a) if a.auction_id != 0 => {
                Some((a.auction_id, a.collection.as_str(), a.nonce))
            }
            Self::GlobalOfferAccepted(a) if a.auction_id != 0 => {
                Some((a.auction_id, a.collection.as_str(), a.nonce))
            }
            _ => None,
        }
    }
}

/// The decoded projection of one event set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSummary {
    /// Hash of the transaction the set belongs to.
    pub tx_hash: String,
    pub timestamp: i64,
    pub marketplace_key: String,
    /// Payment token named by the action or its transfer log.
    pub payment_token: Option<String>,
    pub payment_nonce: Option<u64>,
    pub action: Action,
}

impl ActionSummary {
    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    /// Token identifier of the auctioned NFT, when the action refers to an auction.
    pub fn auction_identifier(&self) -> Option<String> {
        self.action
            .auction_ref()
            .map(|(_, collection, nonce)| token_identifier(collection, nonce))
    }
}
