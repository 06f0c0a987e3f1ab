use tracing::debug;

use crate::action::{Action, ActionKind, ActionSummary};
use crate::handler::ActionHandler;
use crate::records::{AuctionStatus, OfferRecord, OfferStatus};
use crate::state::ReindexState;
use crate::types::{denominate, token_identifier, PaymentToken};

/// An accepted offer takes the NFT off the market.
fn close_listing(state: &mut ReindexState, summary: &ActionSummary) {
    if let Some(auction) = state.auction_for_mut(summary) {
        auction.set_status(AuctionStatus::Closed);
    }
}

/// Creates an offer. Keyed by the marketplace offer id.
pub struct OfferCreatedHandler;

impl ActionHandler for OfferCreatedHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::OfferCreated
    }

    fn handle(&self, state: &mut ReindexState, summary: &ActionSummary, payment: &PaymentToken) {
        let Action::OfferCreated(created) = &summary.action else {
            return;
        };
        if state.offer_index(created.offer_id).is_some() {
            debug!(offer_id = created.offer_id, "offer already created");
            return;
        }

        // collection-wide offers carry nonce 0
        let identifier = if created.nonce == 0 {
            created.collection.clone()
        } else {
            token_identifier(&created.collection, created.nonce)
        };
        state.push_offer(OfferRecord {
            marketplace_offer_id: created.offer_id,
            marketplace_key: summary.marketplace_key.clone(),
            collection: created.collection.clone(),
            nonce: created.nonce,
            identifier,
            price_token: payment.identifier.clone(),
            price_nonce: payment.nonce,
            price_amount: created.amount,
            price_amount_denominated: denominate(created.amount, payment.decimals),
            quantity: created.quantity,
            owner_address: created.owner.clone(),
            status: OfferStatus::Created,
            end_date: created.deadline,
            block_hash: summary.tx_hash.clone(),
            accepted_tx_hash: None,
            timestamp: summary.timestamp,
        });
    }
}

pub struct OfferAcceptedHandler;

impl ActionHandler for OfferAcceptedHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::OfferAccepted
    }

    fn handle(&self, state: &mut ReindexState, summary: &ActionSummary, _payment: &PaymentToken) {
        let Action::OfferAccepted(accepted) = &summary.action else {
            return;
        };
        let Some(offer) = state.offer_by_id_mut(accepted.offer_id) else {
            debug!(offer_id = accepted.offer_id, "accepted offer is unknown");
            return;
        };
        if offer.set_status(OfferStatus::Accepted) {
            offer.accepted_tx_hash = Some(summary.tx_hash.clone());
        }
        close_listing(state, summary);
    }
}

pub struct OfferClosedHandler;

impl ActionHandler for OfferClosedHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::OfferClosed
    }

    fn handle(&self, state: &mut ReindexState, summary: &ActionSummary, _payment: &PaymentToken) {
        let Action::OfferClosed(closed) = &summary.action else {
            return;
        };
        if let Some(offer) = state.offer_by_id_mut(closed.offer_id) {
            offer.set_status(OfferStatus::Closed);
        }
    }
}

/// Settles a collection-wide offer. The event names the offer owner and the
/// price, not our offer id, so the first open collection offer of that owner
/// at that price is the one accepted. Keyed by the accepting tx hash.
pub struct GlobalOfferAcceptedHandler;

impl ActionHandler for GlobalOfferAcceptedHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::GlobalOfferAccepted
    }

    fn handle(&self, state: &mut ReindexState, summary: &ActionSummary, _payment: &PaymentToken) {
        let Action::GlobalOfferAccepted(accepted) = &summary.action else {
            return;
        };
        if state.offer_accepted_by(&summary.tx_hash).is_some() {
            return;
        }

        let matching = state.offers().iter().position(|o| {
            o.status == OfferStatus::Created
                && o.nonce == 0
                && o.collection == accepted.collection
                && o.owner_address == accepted.offer_owner
                && o.price_amount == accepted.amount
        });
        let offer = match matching {
            Some(index) => state.offer_mut(index),
            None => None,
        };
        match offer {
            Some(offer) => {
                offer.set_status(OfferStatus::Accepted);
                offer.accepted_tx_hash = Some(summary.tx_hash.clone());
            }
            None => debug!(
                global_offer_id = accepted.global_offer_id,
                collection = %accepted.collection,
                "no open collection offer matches"
            ),
        }
        close_listing(state, summary);
    }
}
