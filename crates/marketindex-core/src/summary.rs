//! Event set summarizer — turns the logs of one transaction into actions.
//!
//! A transaction against a marketplace typically emits the marketplace's own
//! log (e.g. `bid`) next to protocol logs such as the token transfer that
//! carried the payment. The marketplace log decides the action; transfer logs
//! only fill in a payment token the action log leaves out. A transaction that
//! emits several marketplace logs (a bulk purchase) yields one action per log.

use crate::action::{
    Action, ActionKind, ActionSummary, AuctionClosed, AuctionEnded, AuctionStarted, BidPlaced,
    GlobalOfferAccepted, ListingUpdated, OfferAccepted, OfferClosed, OfferCreated, PriceUpdated,
    TokensBought,
};
use crate::error::{SummaryError, TopicError};
use crate::records::AuctionType;
use crate::topics::Topics;
use crate::types::{Marketplace, RawEvent};

/// How an event identifier is treated by the summarizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// A marketplace action the reindexer replays.
    Action(ActionKind),
    /// A token transfer; may carry the payment token.
    Transfer(TransferLayout),
    /// Protocol or system noise.
    Ignored,
    /// Not in the vocabulary at all.
    Unknown,
}

/// Topic layout of a transfer log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferLayout {
    /// `token, nonce, amount, receiver`
    Single,
    /// `token₁, nonce₁, amount₁, …, receiver`
    Multi,
}

/// Maps an event identifier to its class.
pub fn classify(identifier: &str) -> EventClass {
    use ActionKind::*;
    match identifier {
        "auctionToken" | "listing" | "nftSwap" => EventClass::Action(StartedAuction),
        "bid" => EventClass::Action(Bid),
        "buySft" | "buy" | "bulkBuy" | "purchase" => EventClass::Action(Bought),
        "endAuction" => EventClass::Action(EndedAuction),
        "withdraw" | "withdrawSwap" => EventClass::Action(ClosedAuction),
        "changePrice" | "updatePrice" | "nftSwapUpdate" => EventClass::Action(PriceUpdated),
        "update_listing" | "nftSwapExtend" => EventClass::Action(Updated),
        "sendOffer" => EventClass::Action(OfferCreated),
        "acceptOffer" => EventClass::Action(OfferAccepted),
        "withdrawOffer" => EventClass::Action(OfferClosed),
        "acceptGlobalOffer" => EventClass::Action(GlobalOfferAccepted),
        "ESDTTransfer" | "ESDTNFTTransfer" => EventClass::Transfer(TransferLayout::Single),
        "MultiESDTNFTTransfer" => EventClass::Transfer(TransferLayout::Multi),
        // Offer edits carry no topic layout the reindexer replays.
        "update_offer_event" => EventClass::Ignored,
        "writeLog" | "completedTxEvent" | "signalError" | "internalVMErrors" | "SCUpgrade"
        | "SCDeploy" => EventClass::Ignored,
        _ => EventClass::Unknown,
    }
}

/// Stateless summarizer for the event sets of one marketplace.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventSetSummarizer;

impl EventSetSummarizer {
    pub fn new() -> Self {
        Self
    }

    /// Summarize one event set into its actions, in log order.
    ///
    /// Returns an empty list when the set carries no replayable action,
    /// [`SummaryError::UnknownAction`] when the marketplace contract emitted an
    /// identifier outside the vocabulary, and [`SummaryError::Decode`] when any
    /// action log is malformed.
    pub fn summarize(
        &self,
        marketplace: &Marketplace,
        set: &[RawEvent],
    ) -> Result<Vec<ActionSummary>, SummaryError> {
        let Some(head) = set.first() else {
            return Ok(Vec::new());
        };

        let mut action_logs: Vec<(&RawEvent, ActionKind)> = Vec::new();
        for event in set.iter().filter(|e| e.address == marketplace.address) {
            match classify(&event.identifier) {
                EventClass::Action(kind) => action_logs.push((event, kind)),
                EventClass::Unknown => {
                    return Err(SummaryError::UnknownAction {
                        identifier: event.identifier.clone(),
                        tx_hash: head.tx_hash.clone(),
                    });
                }
                EventClass::Transfer(_) | EventClass::Ignored => {}
            }
        }
        if action_logs.is_empty() {
            return Ok(Vec::new());
        }

        let transfer_payment = payment_from_transfers(marketplace, set);
        action_logs
            .into_iter()
            .map(|(event, kind)| {
                let decoded = decode_action(kind, Topics::new(&event.topics)).map_err(|source| {
                    SummaryError::Decode {
                        identifier: event.identifier.clone(),
                        tx_hash: head.tx_hash.clone(),
                        source,
                    }
                })?;
                let (mut payment_token, mut payment_nonce) =
                    (decoded.payment_token, decoded.payment_nonce);
                if payment_token.is_none() {
                    if let Some((token, nonce)) = &transfer_payment {
                        payment_token = Some(token.clone());
                        payment_nonce = Some(*nonce);
                    }
                }
                Ok(ActionSummary {
                    tx_hash: head.tx_hash.clone(),
                    timestamp: head.timestamp,
                    marketplace_key: marketplace.key.clone(),
                    payment_token,
                    payment_nonce,
                    action: decoded.action,
                })
            })
            .collect()
    }
}

struct Decoded {
    action: Action,
    payment_token: Option<String>,
    payment_nonce: Option<u64>,
}

impl Decoded {
    fn new(action: Action) -> Self {
        Self {
            action,
            payment_token: None,
            payment_nonce: None,
        }
    }

    /// Payment token at `token_at`, nonce at `token_at + 1`.
    fn with_payment(mut self, t: Topics<'_>, token_at: usize) -> Result<Self, TopicError> {
        self.payment_token = t.string_opt(token_at)?;
        if self.payment_token.is_some() {
            self.payment_nonce = Some(t.u64_or_default(token_at + 1)?);
        }
        Ok(self)
    }
}

/// `None` when the topic is absent or empty.
fn u128_present(t: Topics<'_>, index: usize) -> Result<Option<u128>, TopicError> {
    match t.raw(index)? {
        Some(bytes) if !bytes.is_empty() => t.u128(index).map(Some),
        _ => Ok(None),
    }
}

// Topic 0 of a marketplace log is the event name; arguments start at 1.
fn decode_action(kind: ActionKind, t: Topics<'_>) -> Result<Decoded, TopicError> {
    let decoded = match kind {
        ActionKind::StartedAuction => Decoded::new(Action::StartedAuction(AuctionStarted {
            collection: t.string(1)?,
            nonce: t.u64(2)?,
            auction_id: t.u64(3)?,
            quantity: t.u64(4)?.max(1),
            owner: t.address(5)?,
            min_bid: t.u128(6)?,
            max_bid: t.u128_or_default(7)?,
            start_time: t.timestamp_or_default(8)?,
            deadline: t.timestamp_or_default(9)?,
            auction_type: AuctionType::from_discriminant(t.u64_or_default(12)?),
            min_bid_diff: t.u128_or_default(13)?,
        }))
        .with_payment(t, 10)?,

        ActionKind::Bid => Decoded::new(Action::Bid(BidPlaced {
            collection: t.string(1)?,
            nonce: t.u64(2)?,
            auction_id: t.u64(3)?,
            quantity: t.u64_or_default(4)?.max(1),
            bidder: t.address(5)?,
            amount: t.u128(6)?,
        }))
        .with_payment(t, 7)?,

        ActionKind::Bought => Decoded::new(Action::Bought(TokensBought {
            collection: t.string(1)?,
            nonce: t.u64(2)?,
            auction_id: t.u64(3)?,
            quantity: t.u64_or_default(4)?.max(1),
            buyer: t.address(5)?,
            price: t.u128(6)?,
        }))
        .with_payment(t, 7)?,

        ActionKind::EndedAuction => {
            let mut decoded = Decoded::new(Action::EndedAuction(AuctionEnded {
                collection: t.string(1)?,
                nonce: t.u64(2)?,
                auction_id: t.u64(3)?,
                winner: t.address_opt(5)?,
                amount: t.u128_or_default(6)?,
            }));
            decoded.payment_token = t.string_opt(7)?;
            decoded
        }

        ActionKind::ClosedAuction => Decoded::new(Action::ClosedAuction(AuctionClosed {
            collection: t.string(1)?,
            nonce: t.u64(2)?,
            auction_id: t.u64(3)?,
        })),

        ActionKind::PriceUpdated => Decoded::new(Action::PriceUpdated(PriceUpdated {
            collection: t.string(1)?,
            nonce: t.u64(2)?,
            auction_id: t.u64(3)?,
            new_price: t.u128(4)?,
        }))
        .with_payment(t, 5)?,

        ActionKind::Updated => {
            let deadline = match t.u64_or_default(5)? {
                0 => None,
                _ => Some(t.timestamp_or_default(5)?),
            };
            let mut decoded = Decoded::new(Action::Updated(ListingUpdated {
                collection: t.string(1)?,
                nonce: t.u64(2)?,
                auction_id: t.u64(3)?,
                new_price: u128_present(t, 4)?,
                deadline,
            }));
            decoded.payment_token = t.string_opt(6)?;
            decoded
        }

        ActionKind::OfferCreated => Decoded::new(Action::OfferCreated(OfferCreated {
            collection: t.string(1)?,
            nonce: t.u64_or_default(2)?,
            offer_id: t.u64(3)?,
            amount: t.u128(6)?,
            deadline: t.timestamp_or_default(7)?,
            owner: t.address(8)?,
            quantity: t.u64_or_default(9)?.max(1),
        }))
        .with_payment(t, 4)?,

        ActionKind::OfferAccepted => Decoded::new(Action::OfferAccepted(OfferAccepted {
            collection: t.string(1)?,
            nonce: t.u64(2)?,
            offer_id: t.u64(3)?,
            seller: t.address(4)?,
            auction_id: t.u64_or_default(5)?,
        })),

        ActionKind::OfferClosed => Decoded::new(Action::OfferClosed(OfferClosed {
            collection: t.string(1)?,
            nonce: t.u64_or_default(2)?,
            offer_id: t.u64(3)?,
        })),

        ActionKind::GlobalOfferAccepted => {
            Decoded::new(Action::GlobalOfferAccepted(GlobalOfferAccepted {
                global_offer_id: t.u64(1)?,
                collection: t.string(2)?,
                nonce: t.u64(3)?,
                offer_owner: t.address(4)?,
                seller: t.address(5)?,
                amount: t.u128(6)?,
                auction_id: t.u64_or_default(7)?,
            }))
        }
    };
    Ok(decoded)
}

/// Payment token and nonce from the first transfer paid into the marketplace.
/// Malformed transfer logs are ignored.
fn payment_from_transfers(marketplace: &Marketplace, set: &[RawEvent]) -> Option<(String, u64)> {
    set.iter().find_map(|event| {
        let EventClass::Transfer(layout) = classify(&event.identifier) else {
            return None;
        };
        let t = Topics::new(&event.topics);
        let receiver_at = match layout {
            TransferLayout::Single => 3,
            TransferLayout::Multi => t.len().checked_sub(1)?,
        };
        let receiver = t.address(receiver_at).ok()?;
        if receiver != marketplace.address {
            return None;
        }
        let token = t.string(0).ok()?;
        let nonce = t.u64_or_default(1).ok()?;
        Some((token, nonce))
    })
}
