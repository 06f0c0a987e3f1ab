use tracing::debug;

use crate::action::{Action, ActionKind, ActionSummary};
use crate::handler::ActionHandler;
use crate::records::{AuctionStatus, OrderRecord, OrderStatus};
use crate::state::ReindexState;
use crate::types::{denominate, PaymentToken};

fn new_order(
    auction_index: usize,
    summary: &ActionSummary,
    payment: &PaymentToken,
    owner: &str,
    amount: u128,
    quantity: u64,
    status: OrderStatus,
) -> OrderRecord {
    OrderRecord {
        auction_index,
        auction_id: None,
        marketplace_key: summary.marketplace_key.clone(),
        owner_address: owner.to_string(),
        price_token: payment.identifier.clone(),
        price_nonce: payment.nonce,
        price_amount: amount,
        price_amount_denominated: denominate(amount, payment.decimals),
        bought_tokens: quantity,
        status,
        block_hash: summary.tx_hash.clone(),
        timestamp: summary.timestamp,
    }
}

fn outbid_active_orders(state: &mut ReindexState, auction_index: usize) {
    for order in state.orders_for_auction_mut(auction_index) {
        if order.status == OrderStatus::Active {
            order.set_status(OrderStatus::Outbid);
        }
    }
}

/// Places a bid. The previous active order is outbid; a bid reaching a
/// non-zero max bid buys the auction outright.
pub struct BidHandler;

impl ActionHandler for BidHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Bid
    }

    fn handle(&self, state: &mut ReindexState, summary: &ActionSummary, payment: &PaymentToken) {
        let Action::Bid(bid) = &summary.action else {
            return;
        };
        let Some(index) = state.auction_index_for(summary) else {
            debug!(auction_id = bid.auction_id, tx = %summary.tx_hash, "bid on unknown auction");
            return;
        };
        if state.has_order(index, &summary.tx_hash) {
            return;
        }

        outbid_active_orders(state, index);

        let max_bid = state.auctions()[index].max_bid;
        let wins = max_bid != 0 && bid.amount >= max_bid;
        let status = if wins {
            OrderStatus::Bought
        } else {
            OrderStatus::Active
        };
        let order = new_order(index, summary, payment, &bid.bidder, bid.amount, bid.quantity, status);
        state.push_order(order);

        if wins {
            if let Some(auction) = state.auction_mut(index) {
                auction.set_status(AuctionStatus::Ended);
            }
        }
    }
}

/// Records a purchase. Once every auctioned token is bought the auction ends
/// and any still-active bid is outbid.
pub struct BoughtHandler;

impl ActionHandler for BoughtHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Bought
    }

    fn handle(&self, state: &mut ReindexState, summary: &ActionSummary, payment: &PaymentToken) {
        let Action::Bought(bought) = &summary.action else {
            return;
        };
        let Some(index) = state.auction_index_for(summary) else {
            debug!(auction_id = bought.auction_id, tx = %summary.tx_hash, "purchase from unknown auction");
            return;
        };
        if state.has_order(index, &summary.tx_hash) {
            return;
        }

        let order = new_order(
            index,
            summary,
            payment,
            &bought.buyer,
            bought.price,
            bought.quantity,
            OrderStatus::Bought,
        );
        state.push_order(order);

        let sold_out = state.bought_tokens(index) >= state.auctions()[index].nr_auctioned_tokens;
        if sold_out {
            outbid_active_orders(state, index);
            if let Some(auction) = state.auction_mut(index) {
                auction.set_status(AuctionStatus::Ended);
            }
        }
    }
}
