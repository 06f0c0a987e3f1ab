//! Built-in action handlers.
//!
//! - [`auction`]: listing lifecycle (start, end, close, price and listing updates)
//! - [`order`]: bids and purchases
//! - [`offer`]: per-token and collection-wide offers

pub mod auction;
pub mod offer;
pub mod order;

use std::sync::Arc;

use crate::handler::ActionHandler;

/// One instance of every built-in handler.
pub fn all() -> Vec<Arc<dyn ActionHandler>> {
    vec![
        Arc::new(auction::StartedAuctionHandler),
        Arc::new(order::BidHandler),
        Arc::new(order::BoughtHandler),
        Arc::new(auction::EndedAuctionHandler),
        Arc::new(auction::ClosedAuctionHandler),
        Arc::new(auction::PriceUpdatedHandler),
        Arc::new(auction::UpdatedHandler),
        Arc::new(offer::OfferCreatedHandler),
        Arc::new(offer::OfferAcceptedHandler),
        Arc::new(offer::OfferClosedHandler),
        Arc::new(offer::GlobalOfferAcceptedHandler),
    ]
}

#[cfg(test)]
pub(crate) mod testkit {
    use crate::action::{Action, ActionSummary, AuctionStarted};
    use crate::handler::ActionHandler;
    use crate::records::AuctionType;
    use crate::state::ReindexState;
    use crate::types::{Marketplace, MarketplaceKind, PaymentToken};

    pub fn state() -> ReindexState {
        ReindexState::new(Marketplace::new("xoxno", "erd1market", MarketplaceKind::External))
    }

    pub fn egld() -> PaymentToken {
        PaymentToken::native("EGLD", 18)
    }

    pub fn summary(tx: &str, timestamp: i64, action: Action) -> ActionSummary {
        ActionSummary {
            tx_hash: tx.into(),
            timestamp,
            marketplace_key: "xoxno".into(),
            payment_token: None,
            payment_nonce: None,
            action,
        }
    }

    pub fn started(auction_id: u64, min_bid: u128, max_bid: u128, deadline: i64) -> ActionSummary {
        summary(
            &format!("start-{auction_id}"),
            10,
            Action::StartedAuction(AuctionStarted {
                auction_id,
                collection: "APE-1a2b3c".into(),
                nonce: auction_id,
                quantity: 1,
                owner: "erd1owner".into(),
                min_bid,
                max_bid,
                min_bid_diff: 0,
                start_time: 10,
                deadline,
                auction_type: AuctionType::Nft,
            }),
        )
    }

    /// Apply `summary` twice and assert the second application changed nothing.
    pub fn assert_idempotent(
        handler: &dyn ActionHandler,
        state: &mut ReindexState,
        summary: &ActionSummary,
    ) {
        handler.handle(state, summary, &egld());
        let once = format!("{:?}", (state.auctions(), state.orders(), state.offers()));
        handler.handle(state, summary, &egld());
        let twice = format!("{:?}", (state.auctions(), state.orders(), state.offers()));
        assert_eq!(once, twice, "{} is not idempotent", handler.kind());
    }
}
