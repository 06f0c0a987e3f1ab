//! How a run ends when the log or a collaborator misbehaves.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use marketindex_core::action::ActionKind;
use marketindex_core::error::ReindexError;
use marketindex_core::handler::HandlerRegistry;
use marketindex_core::lock::ReindexLocks;
use marketindex_core::records::{AuctionRecord, OfferRecord, OrderRecord};
use marketindex_core::services::{EventStore, PersistenceSink};
use marketindex_core::types::RawEvent;
use marketindex_reindex::ReindexOutcome;

fn unknown_action(timestamp: i64, tx: &str) -> RawEvent {
    log(timestamp, tx, "claimRoyalties", vec![])
}

#[tokio::test]
async fn unknown_marketplace_action_aborts_as_version_skew() {
    let (outcome, snapshot, _) = replay(
        vec![
            started(10, "start-1", 1, 100, 0),
            unknown_action(20, "mystery"),
            bid(30, "bid-1", 1, 11, 150),
        ],
        1000,
    )
    .await;

    let err = match outcome {
        ReindexOutcome::Failed(err) => err,
        other => panic!("expected failure, got {other:?}"),
    };
    assert!(err.is_version_skew());
    assert!(matches!(
        err,
        ReindexError::UnsupportedAction { ref identifier, ref tx_hash }
            if identifier == "claimRoyalties" && tx_hash == "mystery"
    ));
    assert!(snapshot.auctions.is_empty(), "a failed run persists nothing");
}

#[tokio::test]
async fn unknown_identifier_from_another_contract_is_ignored() {
    let mut foreign = unknown_action(20, "bid-1");
    foreign.address = addr(77);
    let (outcome, snapshot, _) = replay(
        vec![started(10, "start-1", 1, 100, 0), foreign, bid(20, "bid-1", 1, 11, 150)],
        1000,
    )
    .await;

    assert!(outcome.is_completed());
    assert_eq!(snapshot.orders.len(), 1);
}

#[tokio::test]
async fn malformed_set_is_skipped() {
    let mut broken = bid(20, "bid-bad", 1, 11, 150);
    broken.topics[6] = "not base64!".into();

    let (outcome, snapshot, _) = replay(
        vec![started(10, "start-1", 1, 100, 0), broken, bid(30, "bid-ok", 1, 12, 200)],
        1000,
    )
    .await;

    let report = outcome.report().expect("decode errors do not abort");
    assert_eq!(report.sets_skipped, 1);
    assert_eq!(report.sets_dispatched, 2);
    assert_eq!(snapshot.orders.len(), 1);
    assert_eq!(snapshot.orders[0].block_hash, "bid-ok");
}

#[tokio::test]
async fn unregistered_marketplace_fails() {
    let setup = setup(vec![], 10);
    let reindexer = setup.builder.build().unwrap();

    let outcome = reindexer.reindex(&addr(99)).await;
    assert!(matches!(
        outcome,
        ReindexOutcome::Failed(ReindexError::MarketplaceNotFound { .. })
    ));
    assert!(!reindexer.locks().is_locked(&addr(99)), "lock released on failure");
}

#[tokio::test]
async fn concurrent_request_is_dropped() {
    let locks = ReindexLocks::new();
    let setup = setup(vec![started(10, "start-1", 1, 100, 0)], 1000);
    let reindexer = setup.builder.locks(locks.clone()).build().unwrap();

    let guard = locks.try_acquire(&market()).unwrap();
    assert!(matches!(
        reindexer.reindex(&market()).await,
        ReindexOutcome::AlreadyRunning
    ));
    assert!(setup.sink.auctions().is_empty());
    assert_eq!(setup.events.requests(), 0);

    drop(guard);
    assert!(reindexer.reindex(&market()).await.is_completed());
    assert_eq!(setup.sink.auctions().len(), 1);
    assert!(!locks.is_locked(&market()));
}

#[tokio::test]
async fn missing_handler_aborts() {
    let setup = setup(vec![started(10, "start-1", 1, 100, 0)], 1000);
    let reindexer = setup.builder.handlers(HandlerRegistry::new()).build().unwrap();

    assert!(matches!(
        reindexer.reindex(&market()).await,
        ReindexOutcome::Failed(ReindexError::MissingHandler {
            kind: ActionKind::StartedAuction
        })
    ));
}

struct BrokenStore;

#[async_trait]
impl EventStore for BrokenStore {
    async fn events_ascending(
        &self,
        _address: &str,
        _from_timestamp: i64,
        _skip: usize,
        _limit: usize,
    ) -> Result<Vec<RawEvent>, ReindexError> {
        Err(ReindexError::EventStore("connection reset".into()))
    }
}

#[tokio::test]
async fn event_store_errors_are_not_retried() {
    let setup = setup(vec![], 10);
    let reindexer = setup.builder.event_store(Arc::new(BrokenStore)).build().unwrap();

    let outcome = reindexer.reindex(&market()).await;
    assert!(matches!(outcome, ReindexOutcome::Failed(ReindexError::EventStore(_))));
    assert!(!reindexer.locks().is_locked(&market()));
}

/// Returns fewer ids than it was given auctions.
struct ShortSink;

#[async_trait]
impl PersistenceSink for ShortSink {
    async fn save_auctions(&self, _auctions: &[AuctionRecord]) -> Result<Vec<i64>, ReindexError> {
        Ok(vec![])
    }

    async fn save_orders(&self, _orders: &[OrderRecord]) -> Result<(), ReindexError> {
        panic!("orders must not be saved without auction ids")
    }

    async fn save_offers(&self, _offers: &[OfferRecord]) -> Result<(), ReindexError> {
        Ok(())
    }
}

#[tokio::test]
async fn id_count_mismatch_is_a_persistence_error() {
    let setup = setup(
        vec![started(10, "start-1", 1, 100, 0), bid(20, "bid-1", 1, 11, 150)],
        1000,
    );
    let reindexer = setup.builder.sink(Arc::new(ShortSink)).build().unwrap();

    assert!(matches!(
        reindexer.reindex(&market()).await,
        ReindexOutcome::Failed(ReindexError::Persistence(_))
    ));
}
