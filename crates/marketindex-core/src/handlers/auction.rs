use tracing::debug;

use crate::action::{Action, ActionKind, ActionSummary};
use crate::handler::ActionHandler;
use crate::records::{AuctionRecord, AuctionStatus, OrderStatus};
use crate::state::ReindexState;
use crate::types::{denominate, token_identifier, PaymentToken};

/// Creates a Running auction. Keyed by the marketplace auction id.
pub struct StartedAuctionHandler;

impl ActionHandler for StartedAuctionHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::StartedAuction
    }

    fn handle(&self, state: &mut ReindexState, summary: &ActionSummary, payment: &PaymentToken) {
        let Action::StartedAuction(started) = &summary.action else {
            return;
        };
        if state.auction_index(started.auction_id).is_some() {
            debug!(auction_id = started.auction_id, "auction already started");
            return;
        }

        let start_date = if started.start_time == 0 {
            summary.timestamp
        } else {
            started.start_time
        };
        let record = AuctionRecord {
            id: None,
            marketplace_auction_id: started.auction_id,
            marketplace_key: summary.marketplace_key.clone(),
            collection: started.collection.clone(),
            nonce: started.nonce,
            identifier: token_identifier(&started.collection, started.nonce),
            nr_auctioned_tokens: started.quantity,
            status: AuctionStatus::Running,
            auction_type: started.auction_type,
            payment_token: payment.identifier.clone(),
            payment_nonce: payment.nonce,
            owner_address: started.owner.clone(),
            min_bid: started.min_bid,
            min_bid_denominated: denominate(started.min_bid, payment.decimals),
            max_bid: started.max_bid,
            max_bid_denominated: denominate(started.max_bid, payment.decimals),
            min_bid_diff: started.min_bid_diff,
            start_date,
            end_date: started.deadline,
            tags: Vec::new(),
            block_hash: summary.tx_hash.clone(),
        };
        state.push_auction(record);
    }
}

/// Running → Ended; the active order wins the auction.
pub struct EndedAuctionHandler;

impl ActionHandler for EndedAuctionHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::EndedAuction
    }

    fn handle(&self, state: &mut ReindexState, summary: &ActionSummary, payment: &PaymentToken) {
        let Some(index) = state.auction_index_for(summary) else {
            return;
        };
        let Some(auction) = state.auction_mut(index) else {
            return;
        };
        if !auction.set_status(AuctionStatus::Ended) {
            return;
        }
        if summary.payment_token.is_some() {
            auction.payment_token = payment.identifier.clone();
            auction.payment_nonce = payment.nonce;
        }
        for order in state.orders_for_auction_mut(index) {
            if order.status == OrderStatus::Active {
                order.set_status(OrderStatus::Bought);
            }
        }
    }
}

/// Running → Closed (withdrawn by the owner).
pub struct ClosedAuctionHandler;

impl ActionHandler for ClosedAuctionHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::ClosedAuction
    }

    fn handle(&self, state: &mut ReindexState, summary: &ActionSummary, _payment: &PaymentToken) {
        if let Some(auction) = state.auction_for_mut(summary) {
            auction.set_status(AuctionStatus::Closed);
        }
    }
}

/// Re-prices a listing. Fixed-price listings carry the price in both bounds.
pub struct PriceUpdatedHandler;

impl ActionHandler for PriceUpdatedHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::PriceUpdated
    }

    fn handle(&self, state: &mut ReindexState, summary: &ActionSummary, payment: &PaymentToken) {
        let Action::PriceUpdated(update) = &summary.action else {
            return;
        };
        let Some(auction) = state.auction_for_mut(summary) else {
            return;
        };
        if summary.payment_token.is_some() {
            apply_payment(auction, payment);
        }
        apply_price(auction, update.new_price, payment.decimals);
    }
}

/// Patches whatever a listing update carries: price, deadline, payment token.
pub struct UpdatedHandler;

impl ActionHandler for UpdatedHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Updated
    }

    fn handle(&self, state: &mut ReindexState, summary: &ActionSummary, payment: &PaymentToken) {
        let Action::Updated(update) = &summary.action else {
            return;
        };
        let Some(auction) = state.auction_for_mut(summary) else {
            return;
        };
        if summary.payment_token.is_some() {
            apply_payment(auction, payment);
        }
        if let Some(price) = update.new_price {
            apply_price(auction, price, payment.decimals);
        }
        if let Some(deadline) = update.deadline {
            auction.end_date = deadline;
        }
    }
}

fn apply_payment(auction: &mut AuctionRecord, payment: &PaymentToken) {
    auction.payment_token = payment.identifier.clone();
    auction.payment_nonce = payment.nonce;
}

fn apply_price(auction: &mut AuctionRecord, price: u128, decimals: u32) {
    auction.min_bid = price;
    auction.min_bid_denominated = denominate(price, decimals);
    if auction.max_bid != 0 {
        auction.max_bid = price;
        auction.max_bid_denominated = denominate(price, decimals);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{AuctionClosed, AuctionEnded, ListingUpdated, PriceUpdated};
    use crate::handlers::testkit::*;
    use crate::state::fixtures;

    fn ended(auction_id: u64) -> ActionSummary {
        summary(
            "end",
            50,
            Action::EndedAuction(AuctionEnded {
                auction_id,
                collection: "APE-1a2b3c".into(),
                nonce: auction_id,
                winner: Some("erd1bidder".into()),
                amount: 150,
            }),
        )
    }

    #[test]
    fn started_auction_creates_running_record() {
        let mut s = state();
        StartedAuctionHandler.handle(&mut s, &started(1, 100, 0, 0), &egld());
        assert_eq!(s.auctions().len(), 1);
        let a = &s.auctions()[0];
        assert_eq!(a.status, AuctionStatus::Running);
        assert_eq!(a.identifier, "APE-1a2b3c-01");
        assert_eq!(a.min_bid, 100);
        assert_eq!(a.payment_token, "EGLD");
        assert_eq!(a.block_hash, "start-1");
        assert!(s.orders().is_empty());
    }

    #[test]
    fn started_auction_is_idempotent() {
        let mut s = state();
        assert_idempotent(&StartedAuctionHandler, &mut s, &started(1, 100, 0, 0));
        assert_eq!(s.auctions().len(), 1);
    }

    #[test]
    fn ended_auction_settles_active_order() {
        let mut s = state();
        StartedAuctionHandler.handle(&mut s, &started(1, 100, 0, 0), &egld());
        s.push_order(fixtures::order(0, "bid-1", OrderStatus::Active));
        assert_idempotent(&EndedAuctionHandler, &mut s, &ended(1));
        assert_eq!(s.auctions()[0].status, AuctionStatus::Ended);
        assert_eq!(s.orders()[0].status, OrderStatus::Bought);
    }

    #[test]
    fn ended_unknown_auction_is_noop() {
        let mut s = state();
        EndedAuctionHandler.handle(&mut s, &ended(9), &egld());
        assert!(s.auctions().is_empty());
    }

    #[test]
    fn closed_auction_is_idempotent_and_terminal() {
        let mut s = state();
        StartedAuctionHandler.handle(&mut s, &started(1, 100, 0, 0), &egld());
        let closed = summary(
            "close",
            20,
            Action::ClosedAuction(AuctionClosed {
                auction_id: 1,
                collection: "APE-1a2b3c".into(),
                nonce: 1,
            }),
        );
        assert_idempotent(&ClosedAuctionHandler, &mut s, &closed);
        assert_eq!(s.auctions()[0].status, AuctionStatus::Closed);

        EndedAuctionHandler.handle(&mut s, &ended(1), &egld());
        assert_eq!(s.auctions()[0].status, AuctionStatus::Closed);
    }

    #[test]
    fn price_update_moves_both_bounds_of_fixed_price_listing() {
        let mut s = state();
        StartedAuctionHandler.handle(&mut s, &started(1, 500, 500, 0), &egld());
        let update = summary(
            "price",
            20,
            Action::PriceUpdated(PriceUpdated {
                auction_id: 1,
                collection: "APE-1a2b3c".into(),
                nonce: 1,
                new_price: 2_000_000_000_000_000_000,
            }),
        );
        assert_idempotent(&PriceUpdatedHandler, &mut s, &update);
        let a = &s.auctions()[0];
        assert_eq!(a.min_bid, 2_000_000_000_000_000_000);
        assert_eq!(a.max_bid, 2_000_000_000_000_000_000);
        assert_eq!(a.max_bid_denominated, 2.0);
    }

    #[test]
    fn listing_update_patches_present_fields_only() {
        let mut s = state();
        StartedAuctionHandler.handle(&mut s, &started(1, 100, 0, 1_000), &egld());
        let mut update = summary(
            "upd",
            20,
            Action::Updated(ListingUpdated {
                auction_id: 1,
                collection: "APE-1a2b3c".into(),
                nonce: 1,
                new_price: None,
                deadline: Some(5_000),
            }),
        );
        update.payment_token = Some("USDC-c76f1f".into());
        let usdc = PaymentToken {
            identifier: "USDC-c76f1f".into(),
            decimals: 6,
            nonce: 0,
        };
        UpdatedHandler.handle(&mut s, &update, &usdc);
        UpdatedHandler.handle(&mut s, &update, &usdc);
        let a = &s.auctions()[0];
        assert_eq!(a.end_date, 5_000);
        assert_eq!(a.min_bid, 100);
        assert_eq!(a.payment_token, "USDC-c76f1f");
    }

    #[test]
    fn listing_update_is_idempotent() {
        let mut s = state();
        StartedAuctionHandler.handle(&mut s, &started(1, 100, 0, 1_000), &egld());
        let update = summary(
            "upd",
            20,
            Action::Updated(ListingUpdated {
                auction_id: 1,
                collection: "APE-1a2b3c".into(),
                nonce: 1,
                new_price: Some(300),
                deadline: None,
            }),
        );
        assert_idempotent(&UpdatedHandler, &mut s, &update);
        assert_eq!(s.auctions()[0].min_bid, 300);
        assert_eq!(s.auctions()[0].end_date, 1_000);
    }
}
