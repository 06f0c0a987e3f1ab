//! In-memory state of one reindex run.
//!
//! Records are only ever appended through [`ReindexState::push_auction`],
//! [`ReindexState::push_order`] and [`ReindexState::push_offer`], which keep
//! the lookup indices in step with the vectors. Handlers get mutable access to
//! individual records, never to the vectors themselves.

use std::collections::HashMap;

use serde::Serialize;

use crate::action::ActionSummary;
use crate::records::{AuctionRecord, AuctionStatus, OfferRecord, OfferStatus, OrderRecord, OrderStatus};
use crate::types::{AuctionLookup, Marketplace};

/// What [`ReindexState::expire_items_older_than`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpirySweep {
    pub auctions_claimable: usize,
    pub auctions_expired: usize,
    pub offers_closed: usize,
}

impl ExpirySweep {
    pub fn total(&self) -> usize {
        self.auctions_claimable + self.auctions_expired + self.offers_closed
    }
}

#[derive(Debug, Clone)]
pub struct ReindexState {
    marketplace: Marketplace,
    auctions: Vec<AuctionRecord>,
    orders: Vec<OrderRecord>,
    offers: Vec<OfferRecord>,
    auction_index_by_marketplace_auction_id: HashMap<u64, usize>,
    auction_index_by_identifier: HashMap<String, usize>,
    offer_index_by_marketplace_offer_id: HashMap<u64, usize>,
}

impl ReindexState {
    pub fn new(marketplace: Marketplace) -> Self {
        Self {
            marketplace,
            auctions: Vec::new(),
            orders: Vec::new(),
            offers: Vec::new(),
            auction_index_by_marketplace_auction_id: HashMap::new(),
            auction_index_by_identifier: HashMap::new(),
            offer_index_by_marketplace_offer_id: HashMap::new(),
        }
    }

    pub fn marketplace(&self) -> &Marketplace {
        &self.marketplace
    }

    pub fn auctions(&self) -> &[AuctionRecord] {
        &self.auctions
    }

    pub fn orders(&self) -> &[OrderRecord] {
        &self.orders
    }

    pub fn offers(&self) -> &[OfferRecord] {
        &self.offers
    }

    /// Mutable view of the auctions; the slice cannot grow, so the indices stay valid.
    pub fn auctions_mut(&mut self) -> &mut [AuctionRecord] {
        &mut self.auctions
    }

    pub fn auction_mut(&mut self, index: usize) -> Option<&mut AuctionRecord> {
        self.auctions.get_mut(index)
    }

    pub fn offer_mut(&mut self, index: usize) -> Option<&mut OfferRecord> {
        self.offers.get_mut(index)
    }

    // ─── Appends ─────────────────────────────────────────────────────────────

    /// Append an auction and register it in both auction indices.
    ///
    /// The identifier index always points at the latest listing of a token.
    pub fn push_auction(&mut self, auction: AuctionRecord) -> usize {
        let index = self.auctions.len();
        self.auction_index_by_marketplace_auction_id
            .insert(auction.marketplace_auction_id, index);
        self.auction_index_by_identifier
            .insert(auction.identifier.clone(), index);
        self.auctions.push(auction);
        index
    }

    pub fn push_order(&mut self, order: OrderRecord) -> usize {
        self.orders.push(order);
        self.orders.len() - 1
    }

    pub fn push_offer(&mut self, offer: OfferRecord) -> usize {
        let index = self.offers.len();
        self.offer_index_by_marketplace_offer_id
            .insert(offer.marketplace_offer_id, index);
        self.offers.push(offer);
        index
    }

    // ─── Lookups ─────────────────────────────────────────────────────────────

    pub fn auction_index(&self, marketplace_auction_id: u64) -> Option<usize> {
        self.auction_index_by_marketplace_auction_id
            .get(&marketplace_auction_id)
            .copied()
    }

    pub fn auction_index_by_identifier(&self, identifier: &str) -> Option<usize> {
        self.auction_index_by_identifier.get(identifier).copied()
    }

    /// The auction an action refers to, resolved the way the marketplace
    /// references its auctions.
    pub fn auction_index_for(&self, summary: &ActionSummary) -> Option<usize> {
        match self.marketplace.lookup {
            AuctionLookup::ByAuctionId => {
                let (auction_id, _, _) = summary.action.auction_ref()?;
                self.auction_index(auction_id)
            }
            AuctionLookup::ByIdentifier => {
                self.auction_index_by_identifier(&summary.auction_identifier()?)
            }
        }
    }

    /// Mutable access to the auction an action refers to.
    pub fn auction_for_mut(&mut self, summary: &ActionSummary) -> Option<&mut AuctionRecord> {
        let index = self.auction_index_for(summary)?;
        self.auctions.get_mut(index)
    }

    pub fn offer_index(&self, marketplace_offer_id: u64) -> Option<usize> {
        self.offer_index_by_marketplace_offer_id
            .get(&marketplace_offer_id)
            .copied()
    }

    pub fn offer_by_id_mut(&mut self, marketplace_offer_id: u64) -> Option<&mut OfferRecord> {
        let index = self.offer_index(marketplace_offer_id)?;
        self.offers.get_mut(index)
    }

    /// Returns `true` if an order placed by `tx_hash` already exists for the auction.
    pub fn has_order(&self, auction_index: usize, tx_hash: &str) -> bool {
        self.orders
            .iter()
            .any(|o| o.auction_index == auction_index && o.block_hash == tx_hash)
    }

    pub fn orders_for_auction_mut(
        &mut self,
        auction_index: usize,
    ) -> impl Iterator<Item = &mut OrderRecord> {
        self.orders
            .iter_mut()
            .filter(move |o| o.auction_index == auction_index)
    }

    pub fn has_active_order(&self, auction_index: usize) -> bool {
        self.orders
            .iter()
            .any(|o| o.auction_index == auction_index && o.status == OrderStatus::Active)
    }

    /// Total tokens bought from an auction so far.
    pub fn bought_tokens(&self, auction_index: usize) -> u64 {
        self.orders
            .iter()
            .filter(|o| o.auction_index == auction_index && o.status == OrderStatus::Bought)
            .map(|o| o.bought_tokens)
            .sum()
    }

    /// Index of the offer accepted by `tx_hash`, if any.
    pub fn offer_accepted_by(&self, tx_hash: &str) -> Option<usize> {
        self.offers
            .iter()
            .position(|o| o.accepted_tx_hash.as_deref() == Some(tx_hash))
    }

    // ─── Sweep ───────────────────────────────────────────────────────────────

    /// Close out everything whose deadline passed before `now` (unix seconds).
    ///
    /// Running auctions with a non-zero deadline become `Claimable` when they
    /// hold an active order, `Expired` otherwise. Created offers with a
    /// non-zero deadline become `Closed`.
    pub fn expire_items_older_than(&mut self, now: i64) -> ExpirySweep {
        let mut sweep = ExpirySweep::default();

        for index in 0..self.auctions.len() {
            let auction = &self.auctions[index];
            if !auction.is_running() || auction.end_date == 0 || auction.end_date >= now {
                continue;
            }
            let next = if self.has_active_order(index) {
                sweep.auctions_claimable += 1;
                AuctionStatus::Claimable
            } else {
                sweep.auctions_expired += 1;
                AuctionStatus::Expired
            };
            self.auctions[index].set_status(next);
        }

        for offer in &mut self.offers {
            if offer.status == OfferStatus::Created
                && offer.end_date != 0
                && offer.end_date < now
                && offer.set_status(OfferStatus::Closed)
            {
                sweep.offers_closed += 1;
            }
        }

        sweep
    }

    /// Hand the records over for persistence.
    pub fn into_records(self) -> (Vec<AuctionRecord>, Vec<OrderRecord>, Vec<OfferRecord>) {
        (self.auctions, self.orders, self.offers)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::records::AuctionType;

    pub fn auction(id: u64, identifier: &str, end_date: i64) -> AuctionRecord {
        AuctionRecord {
            id: None,
            marketplace_auction_id: id,
            marketplace_key: "xoxno".into(),
            collection: "APE-1a2b3c".into(),
            nonce: 1,
            identifier: identifier.into(),
            nr_auctioned_tokens: 1,
            status: AuctionStatus::Running,
            auction_type: AuctionType::Nft,
            payment_token: "EGLD".into(),
            payment_nonce: 0,
            owner_address: "erd1owner".into(),
            min_bid: 100,
            min_bid_denominated: 0.0,
            max_bid: 0,
            max_bid_denominated: 0.0,
            min_bid_diff: 0,
            start_date: 0,
            end_date,
            tags: vec![],
            block_hash: format!("start-{id}"),
        }
    }

    pub fn order(auction_index: usize, tx: &str, status: OrderStatus) -> OrderRecord {
        OrderRecord {
            auction_index,
            auction_id: None,
            marketplace_key: "xoxno".into(),
            owner_address: "erd1bidder".into(),
            price_token: "EGLD".into(),
            price_nonce: 0,
            price_amount: 150,
            price_amount_denominated: 0.0,
            bought_tokens: 1,
            status,
            block_hash: tx.into(),
            timestamp: 0,
        }
    }

    pub fn offer(id: u64, end_date: i64) -> OfferRecord {
        OfferRecord {
            marketplace_offer_id: id,
            marketplace_key: "xoxno".into(),
            collection: "APE-1a2b3c".into(),
            nonce: 0,
            identifier: "APE-1a2b3c".into(),
            price_token: "EGLD".into(),
            price_nonce: 0,
            price_amount: 10,
            price_amount_denominated: 0.0,
            quantity: 1,
            owner_address: "erd1buyer".into(),
            status: OfferStatus::Created,
            end_date,
            block_hash: format!("offer-{id}"),
            accepted_tx_hash: None,
            timestamp: 0,
        }
    }
}
