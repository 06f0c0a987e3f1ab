//! In-memory collaborators for development and testing.
//!
//! Nothing here survives a restart. Every type is `Send + Sync` and can be
//! shared behind an `Arc` with the reindexer and the test that inspects it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;

use marketindex_core::error::ReindexError;
use marketindex_core::records::{AuctionRecord, OfferRecord, OrderRecord};
use marketindex_core::services::{
    EventStore, MarketplaceRegistry, MetadataService, PersistenceSink, TokenService,
};
use marketindex_core::types::{Marketplace, NftTags, RawEvent, Token};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Event store ─────────────────────────────────────────────────────────────

/// Event log kept per marketplace address.
///
/// Events with equal timestamps are served in insertion order.
#[derive(Default)]
pub struct MemoryEventStore {
    logs: Mutex<HashMap<String, Vec<RawEvent>>>,
    requests: Mutex<usize>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding `events` under `address`.
    pub fn from_events(address: &str, events: impl IntoIterator<Item = RawEvent>) -> Self {
        let store = Self::new();
        store.extend(address, events);
        store
    }

    /// Parse a JSON array of events and file them under `address`.
    pub fn from_json(address: &str, json: &str) -> Result<Self, ReindexError> {
        let events: Vec<RawEvent> = serde_json::from_str(json)
            .map_err(|e| ReindexError::EventStore(format!("invalid event dump: {e}")))?;
        Ok(Self::from_events(address, events))
    }

    pub fn insert(&self, address: &str, event: RawEvent) {
        lock(&self.logs)
            .entry(address.to_string())
            .or_default()
            .push(event);
    }

    pub fn extend(&self, address: &str, events: impl IntoIterator<Item = RawEvent>) {
        lock(&self.logs)
            .entry(address.to_string())
            .or_default()
            .extend(events);
    }

    /// Number of events stored under `address`.
    pub fn len(&self, address: &str) -> usize {
        lock(&self.logs).get(address).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, address: &str) -> bool {
        self.len(address) == 0
    }

    /// Number of `events_ascending` calls served so far.
    pub fn requests(&self) -> usize {
        *lock(&self.requests)
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn events_ascending(
        &self,
        address: &str,
        from_timestamp: i64,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<RawEvent>, ReindexError> {
        *lock(&self.requests) += 1;

        let logs = lock(&self.logs);
        let Some(log) = logs.get(address) else {
            return Ok(Vec::new());
        };
        let mut matching: Vec<&RawEvent> =
            log.iter().filter(|e| e.timestamp >= from_timestamp).collect();
        matching.sort_by_key(|e| e.timestamp);

        Ok(matching
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }
}

// ─── Marketplace registry ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryMarketplaces {
    by_address: Mutex<HashMap<String, Marketplace>>,
}

impl MemoryMarketplaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `marketplace`, replacing any previous one at its address.
    pub fn register(&self, marketplace: Marketplace) {
        lock(&self.by_address).insert(marketplace.address.clone(), marketplace);
    }

    pub fn with(self, marketplace: Marketplace) -> Self {
        self.register(marketplace);
        self
    }
}

#[async_trait]
impl MarketplaceRegistry for MemoryMarketplaces {
    async fn marketplace_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Marketplace>, ReindexError> {
        Ok(lock(&self.by_address).get(address).cloned())
    }
}

// ─── Token service ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryTokens {
    tokens: Mutex<HashMap<String, Token>>,
    lookups: Mutex<usize>,
}

impl MemoryTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identifier: impl Into<String>, decimals: u32) {
        let identifier = identifier.into();
        lock(&self.tokens).insert(
            identifier.clone(),
            Token {
                identifier,
                decimals,
            },
        );
    }

    pub fn with(self, identifier: impl Into<String>, decimals: u32) -> Self {
        self.insert(identifier, decimals);
        self
    }

    /// Number of lookups served so far.
    pub fn lookups(&self) -> usize {
        *lock(&self.lookups)
    }
}

#[async_trait]
impl TokenService for MemoryTokens {
    async fn token(&self, identifier: &str) -> Result<Option<Token>, ReindexError> {
        *lock(&self.lookups) += 1;
        Ok(lock(&self.tokens).get(identifier).cloned())
    }
}

// ─── Metadata service ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryMetadata {
    tags: Mutex<HashMap<String, Vec<String>>>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, S>(&self, identifier: impl Into<String>, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.tags).insert(identifier.into(), tags.into_iter().map(Into::into).collect());
    }

    /// Identifier batches requested so far, in arrival order.
    pub fn requests(&self) -> Vec<Vec<String>> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl MetadataService for MemoryMetadata {
    async fn nfts_by_identifiers(
        &self,
        identifiers: &[String],
        offset: usize,
        _fields: &[&str],
    ) -> Result<Vec<NftTags>, ReindexError> {
        lock(&self.requests).push(identifiers.to_vec());

        let tags = lock(&self.tags);
        Ok(identifiers
            .iter()
            .filter_map(|id| {
                tags.get(id).map(|t| NftTags {
                    identifier: id.clone(),
                    tags: t.clone(),
                })
            })
            .skip(offset)
            .collect())
    }
}

// ─── Persistence sink ────────────────────────────────────────────────────────

/// Everything a [`MemorySink`] holds, as plain rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub auctions: Vec<AuctionRecord>,
    pub orders: Vec<OrderRecord>,
    pub offers: Vec<OfferRecord>,
}

#[derive(Default)]
struct Tables {
    auctions: Vec<AuctionRecord>,
    auction_keys: HashMap<(u64, String), usize>,
    orders: Vec<OrderRecord>,
    order_keys: HashMap<(i64, String), usize>,
    offers: Vec<OfferRecord>,
    offer_keys: HashMap<(u64, String), usize>,
}

/// Persistence sink with upsert-on-natural-key semantics.
///
/// Auction ids are assigned sequentially from `1` and stay stable across
/// repeated saves of the same auction.
#[derive(Default)]
pub struct MemorySink {
    tables: Mutex<Tables>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auctions(&self) -> Vec<AuctionRecord> {
        lock(&self.tables).auctions.clone()
    }

    pub fn orders(&self) -> Vec<OrderRecord> {
        lock(&self.tables).orders.clone()
    }

    pub fn offers(&self) -> Vec<OfferRecord> {
        lock(&self.tables).offers.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        let tables = lock(&self.tables);
        Snapshot {
            auctions: tables.auctions.clone(),
            orders: tables.orders.clone(),
            offers: tables.offers.clone(),
        }
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn save_auctions(&self, auctions: &[AuctionRecord]) -> Result<Vec<i64>, ReindexError> {
        let mut guard = lock(&self.tables);
        let tables = &mut *guard;
        let mut ids = Vec::with_capacity(auctions.len());

        for auction in auctions {
            let key = (auction.marketplace_auction_id, auction.marketplace_key.clone());
            let index = match tables.auction_keys.get(&key) {
                Some(&index) => index,
                None => {
                    let index = tables.auctions.len();
                    tables.auction_keys.insert(key, index);
                    tables.auctions.push(auction.clone());
                    index
                }
            };
            let id = index as i64 + 1;
            tables.auctions[index] = AuctionRecord {
                id: Some(id),
                ..auction.clone()
            };
            ids.push(id);
        }

        tracing::debug!(count = auctions.len(), "auctions saved");
        Ok(ids)
    }

    async fn save_orders(&self, orders: &[OrderRecord]) -> Result<(), ReindexError> {
        let mut guard = lock(&self.tables);
        let tables = &mut *guard;

        for order in orders {
            let auction_id = order.auction_id.ok_or_else(|| {
                ReindexError::Persistence(format!("order {} has no auction id", order.block_hash))
            })?;
            let key = (auction_id, order.block_hash.clone());
            match tables.order_keys.get(&key) {
                Some(&index) => tables.orders[index] = order.clone(),
                None => {
                    let index = tables.orders.len();
                    tables.order_keys.insert(key, index);
                    tables.orders.push(order.clone());
                }
            }
        }

        tracing::debug!(count = orders.len(), "orders saved");
        Ok(())
    }

    async fn save_offers(&self, offers: &[OfferRecord]) -> Result<(), ReindexError> {
        let mut guard = lock(&self.tables);
        let tables = &mut *guard;

        for offer in offers {
            let key = (offer.marketplace_offer_id, offer.marketplace_key.clone());
            match tables.offer_keys.get(&key) {
                Some(&index) => tables.offers[index] = offer.clone(),
                None => {
                    let index = tables.offers.len();
                    tables.offer_keys.insert(key, index);
                    tables.offers.push(offer.clone());
                }
            }
        }

        tracing::debug!(count = offers.len(), "offers saved");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use marketindex_core::records::{AuctionStatus, AuctionType, OfferStatus, OrderStatus};
    use marketindex_core::types::MarketplaceKind;

    fn event(timestamp: i64, tx: &str) -> RawEvent {
        RawEvent {
            timestamp,
            tx_hash: tx.into(),
            original_tx_hash: None,
            identifier: "bid".into(),
            address: "erd1market".into(),
            topics: vec![],
        }
    }

    fn auction(id: u64) -> AuctionRecord {
        AuctionRecord {
            id: None,
            marketplace_auction_id: id,
            marketplace_key: "xoxno".into(),
            collection: "APE-1a2b3c".into(),
            nonce: id,
            identifier: format!("APE-1a2b3c-{id:02x}"),
            nr_auctioned_tokens: 1,
            status: AuctionStatus::Running,
            auction_type: AuctionType::Nft,
            payment_token: "EGLD".into(),
            payment_nonce: 0,
            owner_address: "erd1owner".into(),
            min_bid: 1,
            min_bid_denominated: 0.0,
            max_bid: 0,
            max_bid_denominated: 0.0,
            min_bid_diff: 0,
            start_date: 1,
            end_date: 0,
            tags: vec![],
            block_hash: format!("start-{id}"),
        }
    }

    fn order(auction_id: Option<i64>, tx: &str) -> OrderRecord {
        OrderRecord {
            auction_index: 0,
            auction_id,
            marketplace_key: "xoxno".into(),
            owner_address: "erd1bidder".into(),
            price_token: "EGLD".into(),
            price_nonce: 0,
            price_amount: 5,
            price_amount_denominated: 0.0,
            bought_tokens: 0,
            status: OrderStatus::Active,
            block_hash: tx.into(),
            timestamp: 2,
        }
    }

    fn offer(id: u64, status: OfferStatus) -> OfferRecord {
        OfferRecord {
            marketplace_offer_id: id,
            marketplace_key: "xoxno".into(),
            collection: "APE-1a2b3c".into(),
            nonce: 0,
            identifier: "APE-1a2b3c".into(),
            price_token: "EGLD".into(),
            price_nonce: 0,
            price_amount: 1,
            price_amount_denominated: 0.0,
            quantity: 1,
            owner_address: "erd1owner".into(),
            status,
            end_date: 0,
            block_hash: format!("offer-{id}"),
            accepted_tx_hash: None,
            timestamp: 1,
        }
    }

    // ── Event store ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn events_are_served_from_inclusive_with_skip() {
        let store = MemoryEventStore::from_events(
            "erd1market",
            [event(20, "c"), event(10, "a"), event(20, "d"), event(10, "b")],
        );

        let page = store.events_ascending("erd1market", 0, 0, 3).await.unwrap();
        let txs: Vec<_> = page.iter().map(|e| e.tx_hash.as_str()).collect();
        assert_eq!(txs, ["a", "b", "c"]);

        let page = store.events_ascending("erd1market", 20, 1, 10).await.unwrap();
        let txs: Vec<_> = page.iter().map(|e| e.tx_hash.as_str()).collect();
        assert_eq!(txs, ["d"]);
        assert_eq!(store.requests(), 2);
    }

    #[tokio::test]
    async fn unknown_address_has_empty_log() {
        let store = MemoryEventStore::new();
        assert!(store.events_ascending("erd1none", 0, 0, 10).await.unwrap().is_empty());
        assert!(store.is_empty("erd1none"));
    }

    #[test]
    fn event_dump_must_be_valid_json() {
        let store = MemoryEventStore::from_json(
            "erd1market",
            r#"[{"timestamp":1,"txHash":"a","identifier":"bid","address":"erd1market"}]"#,
        )
        .unwrap();
        assert_eq!(store.len("erd1market"), 1);
        assert!(matches!(
            MemoryEventStore::from_json("erd1market", "{"),
            Err(ReindexError::EventStore(_))
        ));
    }

    // ── Registries ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn marketplaces_by_address() {
        let registry = MemoryMarketplaces::new()
            .with(Marketplace::new("xoxno", "erd1market", MarketplaceKind::Internal));
        let found = registry.marketplace_by_address("erd1market").await.unwrap().unwrap();
        assert_eq!(found.key, "xoxno");
        assert!(registry.marketplace_by_address("erd1other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tokens_count_lookups() {
        let tokens = MemoryTokens::new().with("USDC-c76f1f", 6);
        assert_eq!(tokens.token("USDC-c76f1f").await.unwrap().unwrap().decimals, 6);
        assert!(tokens.token("WEIRD-000000").await.unwrap().is_none());
        assert_eq!(tokens.lookups(), 2);
    }

    #[tokio::test]
    async fn metadata_leaves_out_unknown_nfts() {
        let metadata = MemoryMetadata::new();
        metadata.insert("APE-1a2b3c-01", ["art", "pfp"]);

        let ids = vec!["APE-1a2b3c-01".to_string(), "APE-1a2b3c-02".to_string()];
        let found = metadata.nfts_by_identifiers(&ids, 0, &["identifier", "tags"]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tags, vec!["art".to_string(), "pfp".to_string()]);
        assert_eq!(metadata.requests(), vec![ids]);
    }

    // ── Sink ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn auction_ids_are_stable_across_saves() {
        let sink = MemorySink::new();
        let first = sink.save_auctions(&[auction(7), auction(9)]).await.unwrap();
        assert_eq!(first, vec![1, 2]);

        let mut ended = auction(9);
        ended.status = AuctionStatus::Ended;
        let second = sink.save_auctions(&[ended, auction(11)]).await.unwrap();
        assert_eq!(second, vec![2, 3]);

        let stored = sink.auctions();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[1].status, AuctionStatus::Ended);
        assert_eq!(stored[1].id, Some(2));
    }

    #[tokio::test]
    async fn orders_upsert_on_auction_and_tx() {
        let sink = MemorySink::new();
        sink.save_orders(&[order(Some(1), "bid-1"), order(Some(1), "bid-2")]).await.unwrap();

        let mut outbid = order(Some(1), "bid-1");
        outbid.status = OrderStatus::Outbid;
        sink.save_orders(&[outbid]).await.unwrap();

        let orders = sink.orders();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].status, OrderStatus::Outbid);
    }

    #[tokio::test]
    async fn unbound_order_is_refused() {
        let sink = MemorySink::new();
        let err = sink.save_orders(&[order(None, "bid-1")]).await.unwrap_err();
        assert!(matches!(err, ReindexError::Persistence(_)));
    }

    #[tokio::test]
    async fn saving_twice_keeps_one_copy() {
        let sink = MemorySink::new();
        let offers = [offer(1, OfferStatus::Created), offer(2, OfferStatus::Closed)];
        sink.save_offers(&offers).await.unwrap();
        sink.save_offers(&offers).await.unwrap();
        sink.save_auctions(&[auction(1)]).await.unwrap();
        sink.save_auctions(&[auction(1)]).await.unwrap();

        let snapshot = sink.snapshot();
        assert_eq!(snapshot.offers.len(), 2);
        assert_eq!(snapshot.auctions.len(), 1);
    }
}
