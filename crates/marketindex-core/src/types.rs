//! Shared types for the reindex pipeline.

use serde::{Deserialize, Serialize};

// ─── RawEvent ────────────────────────────────────────────────────────────────

/// A marketplace log as stored in the event store.
///
/// Topics are kept in their stored base64 form; [`crate::topics`] decodes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Block timestamp (seconds since epoch).
    pub timestamp: i64,
    /// Hash of the transaction (or smart-contract result) that emitted the log.
    pub tx_hash: String,
    /// Hash of the originating transaction when this log comes from a
    /// smart-contract result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_tx_hash: Option<String>,
    /// Action identifier (`"auctionToken"`, `"bid"`, `"ESDTNFTTransfer"`, …).
    pub identifier: String,
    /// Address of the emitting contract.
    pub address: String,
    /// Base64-encoded topics.
    #[serde(default)]
    pub topics: Vec<String>,
}

impl RawEvent {
    /// Returns `true` if this log belongs to the transaction `tx_hash`.
    pub fn belongs_to(&self, tx_hash: &str) -> bool {
        self.tx_hash == tx_hash || self.original_tx_hash.as_deref() == Some(tx_hash)
    }
}

/// All logs of one on-chain transaction, in log order.
pub type EventSet = Vec<RawEvent>;

// ─── Marketplace ─────────────────────────────────────────────────────────────

/// Who operates a marketplace contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketplaceKind {
    /// Operated by the aggregator itself.
    Internal,
    /// A third-party marketplace the aggregator tracks.
    External,
}

/// How actions of a marketplace reference their auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuctionLookup {
    /// By the marketplace-local auction id.
    #[default]
    ByAuctionId,
    /// By token identifier (`COLLECTION-nonce`); the swap-style contracts.
    ByIdentifier,
}

/// A marketplace descriptor as returned by the marketplace registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marketplace {
    /// Short unique key (`"xoxno"`, `"elrondnftswap"`, …).
    pub key: String,
    /// Contract address (bech32).
    pub address: String,
    pub kind: MarketplaceKind,
    #[serde(default)]
    pub lookup: AuctionLookup,
}

impl Marketplace {
    pub fn new(key: impl Into<String>, address: impl Into<String>, kind: MarketplaceKind) -> Self {
        Self {
            key: key.into(),
            address: address.into(),
            kind,
            lookup: AuctionLookup::ByAuctionId,
        }
    }

    /// Resolve auctions by token identifier instead of auction id.
    pub fn with_lookup(mut self, lookup: AuctionLookup) -> Self {
        self.lookup = lookup;
        self
    }
}

// ─── Tokens and metadata ─────────────────────────────────────────────────────

/// A fungible payment token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub identifier: String,
    pub decimals: u32,
}

/// Payment token resolved for one action: token metadata plus nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentToken {
    pub identifier: String,
    pub decimals: u32,
    pub nonce: u64,
}

impl PaymentToken {
    pub fn native(identifier: impl Into<String>, decimals: u32) -> Self {
        Self {
            identifier: identifier.into(),
            decimals,
            nonce: 0,
        }
    }
}

/// Tags of one NFT as returned by the metadata service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftTags {
    pub identifier: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Token identifier for `collection` + `nonce`, e.g. `("APE-1a2b3c", 10)` →
/// `"APE-1a2b3c-0a"`. The nonce is lower-case hex padded to an even length.
pub fn token_identifier(collection: &str, nonce: u64) -> String {
    let mut hex = format!("{nonce:x}");
    if hex.len() % 2 == 1 {
        hex.insert(0, '0');
    }
    format!("{collection}-{hex}")
}

/// `amount / 10^decimals` as a float, for the denominated record columns.
pub fn denominate(amount: u128, decimals: u32) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
