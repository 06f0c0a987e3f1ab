//! Shared fixtures for the reindex integration tests: raw marketplace logs
//! encoded the way the chain stores them, and a reindexer wired to the
//! in-memory backends.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use marketindex_core::topics::{encode_address, encode_str, encode_uint, pubkey_to_address};
use marketindex_core::types::{Marketplace, MarketplaceKind, RawEvent};
use marketindex_reindex::{DispatchObserver, ReindexBuilder, ReindexOutcome};
use marketindex_storage::{
    MemoryEventStore, MemoryMarketplaces, MemoryMetadata, MemorySink, MemoryTokens, Snapshot,
};

pub const COLLECTION: &str = "APE-1a2b3c";

pub fn addr(seed: u8) -> String {
    pubkey_to_address(&[seed; 32]).unwrap()
}

pub fn market() -> String {
    addr(200)
}

fn address_topic(seed: u8) -> String {
    encode_address(&addr(seed)).unwrap()
}

// ─── Raw logs ────────────────────────────────────────────────────────────────

/// A log emitted by the marketplace contract. Topic 0 is the event name.
pub fn log(timestamp: i64, tx: &str, identifier: &str, args: Vec<String>) -> RawEvent {
    let mut topics = vec![encode_str(identifier)];
    topics.extend(args);
    RawEvent {
        timestamp,
        tx_hash: tx.into(),
        original_tx_hash: None,
        identifier: identifier.into(),
        address: market(),
        topics,
    }
}

/// The same log under another event name, as emitted by a different
/// marketplace contract family.
pub fn renamed(mut event: RawEvent, identifier: &str) -> RawEvent {
    event.identifier = identifier.into();
    if let Some(name) = event.topics.first_mut() {
        *name = encode_str(identifier);
    }
    event
}

/// Turn `event` into a smart-contract result of `original`.
pub fn scr(mut event: RawEvent, scr_hash: &str, original: &str) -> RawEvent {
    event.tx_hash = scr_hash.into();
    event.original_tx_hash = Some(original.into());
    event
}

pub fn started(timestamp: i64, tx: &str, auction_id: u64, min_bid: u128, max_bid: u128) -> RawEvent {
    started_with(timestamp, tx, auction_id, 1, min_bid, max_bid, 0, None)
}

#[allow(clippy::too_many_arguments)]
pub fn started_with(
    timestamp: i64,
    tx: &str,
    auction_id: u64,
    quantity: u64,
    min_bid: u128,
    max_bid: u128,
    deadline: i64,
    token: Option<&str>,
) -> RawEvent {
    let mut args = vec![
        encode_str(COLLECTION),
        encode_uint(auction_id as u128),
        encode_uint(auction_id as u128),
        encode_uint(quantity as u128),
        address_topic(1),
        encode_uint(min_bid),
        encode_uint(max_bid),
        encode_uint(timestamp as u128),
        encode_uint(deadline as u128),
    ];
    if let Some(token) = token {
        args.push(encode_str(token));
        args.push(encode_uint(0));
    }
    log(timestamp, tx, "auctionToken", args)
}

pub fn bid(timestamp: i64, tx: &str, auction_id: u64, bidder: u8, amount: u128) -> RawEvent {
    log(
        timestamp,
        tx,
        "bid",
        vec![
            encode_str(COLLECTION),
            encode_uint(auction_id as u128),
            encode_uint(auction_id as u128),
            encode_uint(1),
            address_topic(bidder),
            encode_uint(amount),
        ],
    )
}

pub fn buy(timestamp: i64, tx: &str, auction_id: u64, buyer: u8, quantity: u64, price: u128) -> RawEvent {
    purchase(timestamp, tx, auction_id, auction_id, buyer, quantity, price)
}

/// A purchase naming the listing by `nonce` and `auction_id` separately.
#[allow(clippy::too_many_arguments)]
pub fn purchase(
    timestamp: i64,
    tx: &str,
    nonce: u64,
    auction_id: u64,
    buyer: u8,
    quantity: u64,
    price: u128,
) -> RawEvent {
    log(
        timestamp,
        tx,
        "buySft",
        vec![
            encode_str(COLLECTION),
            encode_uint(nonce as u128),
            encode_uint(auction_id as u128),
            encode_uint(quantity as u128),
            address_topic(buyer),
            encode_uint(price),
        ],
    )
}

pub fn end_auction(timestamp: i64, tx: &str, auction_id: u64, winner: u8, amount: u128) -> RawEvent {
    log(
        timestamp,
        tx,
        "endAuction",
        vec![
            encode_str(COLLECTION),
            encode_uint(auction_id as u128),
            encode_uint(auction_id as u128),
            encode_uint(1),
            address_topic(winner),
            encode_uint(amount),
        ],
    )
}

pub fn withdraw(timestamp: i64, tx: &str, auction_id: u64) -> RawEvent {
    log(
        timestamp,
        tx,
        "withdraw",
        vec![
            encode_str(COLLECTION),
            encode_uint(auction_id as u128),
            encode_uint(auction_id as u128),
        ],
    )
}

pub fn change_price(timestamp: i64, tx: &str, auction_id: u64, price: u128) -> RawEvent {
    log(
        timestamp,
        tx,
        "changePrice",
        vec![
            encode_str(COLLECTION),
            encode_uint(auction_id as u128),
            encode_uint(auction_id as u128),
            encode_uint(price),
        ],
    )
}

#[allow(clippy::too_many_arguments)]
pub fn send_offer(
    timestamp: i64,
    tx: &str,
    offer_id: u64,
    nonce: u64,
    amount: u128,
    owner: u8,
    deadline: i64,
) -> RawEvent {
    log(
        timestamp,
        tx,
        "sendOffer",
        vec![
            encode_str(COLLECTION),
            encode_uint(nonce as u128),
            encode_uint(offer_id as u128),
            encode_str("EGLD"),
            encode_uint(0),
            encode_uint(amount),
            encode_uint(deadline as u128),
            address_topic(owner),
            encode_uint(1),
        ],
    )
}

pub fn accept_offer(timestamp: i64, tx: &str, offer_id: u64, nonce: u64, seller: u8, auction_id: u64) -> RawEvent {
    log(
        timestamp,
        tx,
        "acceptOffer",
        vec![
            encode_str(COLLECTION),
            encode_uint(nonce as u128),
            encode_uint(offer_id as u128),
            address_topic(seller),
            encode_uint(auction_id as u128),
        ],
    )
}

pub fn withdraw_offer(timestamp: i64, tx: &str, offer_id: u64) -> RawEvent {
    log(
        timestamp,
        tx,
        "withdrawOffer",
        vec![
            encode_str(COLLECTION),
            encode_uint(0),
            encode_uint(offer_id as u128),
        ],
    )
}

#[allow(clippy::too_many_arguments)]
pub fn accept_global_offer(
    timestamp: i64,
    tx: &str,
    global_offer_id: u64,
    nonce: u64,
    offer_owner: u8,
    seller: u8,
    amount: u128,
    auction_id: u64,
) -> RawEvent {
    log(
        timestamp,
        tx,
        "acceptGlobalOffer",
        vec![
            encode_uint(global_offer_id as u128),
            encode_str(COLLECTION),
            encode_uint(nonce as u128),
            address_topic(offer_owner),
            address_topic(seller),
            encode_uint(amount),
            encode_uint(auction_id as u128),
        ],
    )
}

/// `ESDTTransfer` of `token` from account `from` into the marketplace.
pub fn transfer(timestamp: i64, tx: &str, from: u8, token: &str, amount: u128) -> RawEvent {
    RawEvent {
        timestamp,
        tx_hash: tx.into(),
        original_tx_hash: None,
        identifier: "ESDTTransfer".into(),
        address: addr(from),
        topics: vec![
            encode_str(token),
            encode_uint(0),
            encode_uint(amount),
            encode_address(&market()).unwrap(),
        ],
    }
}

/// A protocol log the summarizer ignores.
pub fn completed(timestamp: i64, tx: &str) -> RawEvent {
    RawEvent {
        timestamp,
        tx_hash: tx.into(),
        original_tx_hash: None,
        identifier: "completedTxEvent".into(),
        address: market(),
        topics: vec![],
    }
}

/// The key an event is grouped under.
pub fn set_key(event: &RawEvent) -> &str {
    event.original_tx_hash.as_deref().unwrap_or(&event.tx_hash)
}

// ─── Observer ────────────────────────────────────────────────────────────────

/// Records every event set handed to the summarizer.
#[derive(Default)]
pub struct Recorder {
    sets: Mutex<Vec<Vec<RawEvent>>>,
}

impl Recorder {
    pub fn sets(&self) -> Vec<Vec<RawEvent>> {
        self.sets.lock().unwrap().clone()
    }

    /// Set keys in dispatch order.
    pub fn keys(&self) -> Vec<String> {
        self.sets()
            .iter()
            .map(|set| set_key(&set[0]).to_string())
            .collect()
    }

    /// Dispatched event count per set key.
    pub fn counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for set in self.sets() {
            *counts.entry(set_key(&set[0]).to_string()).or_default() += set.len();
        }
        counts
    }
}

impl DispatchObserver for Recorder {
    fn on_event_set(&self, set: &[RawEvent]) {
        self.sets.lock().unwrap().push(set.to_vec());
    }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

/// A builder wired to in-memory collaborators, plus handles to inspect them.
pub struct Setup {
    pub builder: ReindexBuilder,
    pub events: Arc<MemoryEventStore>,
    pub marketplaces: Arc<MemoryMarketplaces>,
    pub tokens: Arc<MemoryTokens>,
    pub metadata: Arc<MemoryMetadata>,
    pub sink: Arc<MemorySink>,
    pub recorder: Arc<Recorder>,
}

pub fn setup(events: Vec<RawEvent>, page_size: usize) -> Setup {
    let events = Arc::new(MemoryEventStore::from_events(&market(), events));
    let marketplaces = Arc::new(
        MemoryMarketplaces::new()
            .with(Marketplace::new("xoxno", market(), MarketplaceKind::Internal)),
    );
    let tokens = Arc::new(MemoryTokens::new().with("USDC-c76f1f", 6));
    let metadata = Arc::new(MemoryMetadata::new());
    let sink = Arc::new(MemorySink::new());
    let recorder = Arc::new(Recorder::default());

    let builder = ReindexBuilder::new()
        .page_size(page_size)
        .event_store(events.clone())
        .marketplaces(marketplaces.clone())
        .tokens(tokens.clone())
        .metadata(metadata.clone())
        .sink(sink.clone())
        .observer(recorder.clone())
        .clock(|| 0);

    Setup {
        builder,
        events,
        marketplaces,
        tokens,
        metadata,
        sink,
        recorder,
    }
}

/// Replay `events` with `page_size` and return the outcome, the persisted
/// snapshot and the observed event sets.
pub async fn replay(events: Vec<RawEvent>, page_size: usize) -> (ReindexOutcome, Snapshot, Arc<Recorder>) {
    let setup = setup(events, page_size);
    let reindexer = setup.builder.build().unwrap();
    let outcome = reindexer.reindex(&market()).await;
    (outcome, setup.sink.snapshot(), setup.recorder)
}
