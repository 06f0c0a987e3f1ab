//! The reindex driver — replays a marketplace's event log into a snapshot.
//!
//! # Run
//! 1. Take the marketplace's named lock (contention = `AlreadyRunning`)
//! 2. Page the log through [`EventPager`], buffering whatever cannot be
//!    dispatched yet
//! 3. Group the buffer into event sets, summarize, dispatch each action to
//!    its handler in log order
//! 4. Flush the buffer once the log is exhausted
//! 5. Sweep expired auctions and offers, backfill missing tags
//! 6. Persist auctions, then orders (bound to auction ids), then offers

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use marketindex_core::config::{ReindexConfig, RunPhase};
use marketindex_core::error::{ReindexError, SummaryError};
use marketindex_core::handler::HandlerRegistry;
use marketindex_core::lock::ReindexLocks;
use marketindex_core::records::{AuctionRecord, OrderRecord};
use marketindex_core::services::{EventStore, MarketplaceRegistry, MetadataService, PersistenceSink};
use marketindex_core::state::{ExpirySweep, ReindexState};
use marketindex_core::summary::EventSetSummarizer;
use marketindex_core::types::RawEvent;

use crate::fetcher::EventPager;
use crate::payment::PaymentResolver;
use crate::tags::backfill_tags;

/// Sees every event set right before it is summarized.
pub trait DispatchObserver: Send + Sync {
    fn on_event_set(&self, set: &[RawEvent]);
}

/// Source of "now" for the expiry sweep, in unix seconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Counters of one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub marketplace_key: String,
    pub address: String,
    pub pages_fetched: usize,
    pub events_read: usize,
    pub sets_dispatched: usize,
    /// Summaries handed to handlers; a bulk transaction adds several.
    pub actions_dispatched: usize,
    /// Sets without a replayable action or that failed to decode.
    pub sets_skipped: usize,
    pub events_dropped: usize,
    pub auctions_persisted: usize,
    pub orders_persisted: usize,
    pub offers_persisted: usize,
    pub expired: ExpirySweep,
    pub tags_backfilled: usize,
    pub elapsed_ms: u64,
}

/// How a reindex request ended.
#[derive(Debug)]
pub enum ReindexOutcome {
    Completed(ReindexReport),
    /// Another run holds the marketplace's lock; the request was dropped.
    AlreadyRunning,
    Failed(ReindexError),
}

impl ReindexOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn report(&self) -> Option<&ReindexReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Rebuilds marketplace state from the event log. Built by
/// [`crate::ReindexBuilder`].
pub struct Reindexer {
    pub(crate) config: ReindexConfig,
    pub(crate) events: Arc<dyn EventStore>,
    pub(crate) marketplaces: Arc<dyn MarketplaceRegistry>,
    pub(crate) metadata: Arc<dyn MetadataService>,
    pub(crate) sink: Arc<dyn PersistenceSink>,
    pub(crate) payments: PaymentResolver,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) summarizer: EventSetSummarizer,
    pub(crate) locks: ReindexLocks,
    pub(crate) observer: Option<Arc<dyn DispatchObserver>>,
    pub(crate) clock: Clock,
}

impl Reindexer {
    pub fn config(&self) -> &ReindexConfig {
        &self.config
    }

    /// The lock registry; share it to keep several reindexers mutually exclusive.
    pub fn locks(&self) -> &ReindexLocks {
        &self.locks
    }

    /// Reindex one marketplace. Failures are logged and reported in the
    /// outcome, never propagated.
    pub async fn reindex(&self, address: &str) -> ReindexOutcome {
        match self.try_reindex(address).await {
            Ok(Some(report)) => ReindexOutcome::Completed(report),
            Ok(None) => ReindexOutcome::AlreadyRunning,
            Err(err) => {
                tracing::error!(
                    address,
                    phase = %RunPhase::Failed,
                    error = %err,
                    version_skew = err.is_version_skew(),
                    "reindex failed"
                );
                ReindexOutcome::Failed(err)
            }
        }
    }

    /// Reindex one marketplace. `Ok(None)` when a run for it is already in progress.
    pub async fn try_reindex(&self, address: &str) -> Result<Option<ReindexReport>, ReindexError> {
        let Some(_guard) = self.locks.try_acquire(address) else {
            tracing::info!(address, "reindex already running, request dropped");
            return Ok(None);
        };
        let started = Instant::now();

        let marketplace = self
            .marketplaces
            .marketplace_by_address(address)
            .await?
            .ok_or_else(|| ReindexError::MarketplaceNotFound {
                address: address.to_string(),
            })?;
        tracing::info!(address, key = %marketplace.key, "reindex started");

        let mut report = ReindexReport {
            marketplace_key: marketplace.key.clone(),
            address: address.to_string(),
            ..ReindexReport::default()
        };
        let mut state = ReindexState::new(marketplace);

        tracing::debug!(address, phase = %RunPhase::Replaying, "run phase");
        self.replay(&mut state, &mut report).await?;

        tracing::debug!(address, phase = %RunPhase::Sweeping, "run phase");
        report.expired = state.expire_items_older_than((self.clock)());

        tracing::debug!(address, phase = %RunPhase::BackfillingTags, "run phase");
        report.tags_backfilled = backfill_tags(
            &mut state,
            self.metadata.as_ref(),
            self.config.metadata_batch_size,
            self.config.metadata_concurrency,
        )
        .await?;

        tracing::debug!(address, phase = %RunPhase::Persisting, "run phase");
        self.persist(state, &mut report).await?;

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            address,
            phase = %RunPhase::Done,
            key = %report.marketplace_key,
            pages = report.pages_fetched,
            events = report.events_read,
            sets = report.sets_dispatched,
            actions = report.actions_dispatched,
            skipped = report.sets_skipped,
            auctions = report.auctions_persisted,
            orders = report.orders_persisted,
            offers = report.offers_persisted,
            expired = report.expired.total(),
            elapsed_ms = report.elapsed_ms,
            "reindex complete"
        );
        Ok(Some(report))
    }

    async fn replay(
        &self,
        state: &mut ReindexState,
        report: &mut ReindexReport,
    ) -> Result<(), ReindexError> {
        let address = state.marketplace().address.clone();
        let mut pager = EventPager::new(self.events.clone(), &address, self.config.page_size);
        let mut carry: Vec<RawEvent> = Vec::new();

        loop {
            let page = pager.next_page().await?;
            report.pages_fetched += 1;
            report.events_read += page.fetched;
            carry.extend(page.events);

            carry = self.process_buffer(state, carry, false, report).await?;

            tracing::debug!(
                address = %address,
                page = report.pages_fetched,
                fetched = page.fetched,
                carried = carry.len(),
                from_timestamp = pager.cursor().from_timestamp,
                "page processed"
            );

            if page.is_last {
                break;
            }
        }

        let left = self.process_buffer(state, carry, true, report).await?;
        if !left.is_empty() {
            tracing::warn!(address = %address, events = left.len(), "undispatched events dropped");
            report.events_dropped += left.len();
        }
        Ok(())
    }

    /// Dispatch every complete event set at the head of `buffer` and return
    /// the events that must wait for the next page.
    ///
    /// A set waits while it is the whole buffer or while the buffer holds
    /// nothing later than its timestamp; either way more of its events may
    /// still be on the next page. The final pass waits for nothing.
    pub(crate) async fn process_buffer(
        &self,
        state: &mut ReindexState,
        buffer: Vec<RawEvent>,
        is_final: bool,
        report: &mut ReindexReport,
    ) -> Result<Vec<RawEvent>, ReindexError> {
        let mut rest = buffer;

        while let Some(head) = rest.first() {
            let tx_hash = head
                .original_tx_hash
                .clone()
                .unwrap_or_else(|| head.tx_hash.clone());
            let head_timestamp = head.timestamp;

            if !is_final {
                let whole_buffer = rest.iter().all(|e| e.belongs_to(&tx_hash));
                let later_in_buffer = rest.iter().any(|e| e.timestamp > head_timestamp);
                if whole_buffer || !later_in_buffer {
                    return Ok(rest);
                }
            }

            let (set, others): (Vec<RawEvent>, Vec<RawEvent>) =
                rest.into_iter().partition(|e| e.belongs_to(&tx_hash));
            rest = others;

            self.dispatch_set(state, &set, report).await?;
        }

        Ok(rest)
    }

    async fn dispatch_set(
        &self,
        state: &mut ReindexState,
        set: &[RawEvent],
        report: &mut ReindexReport,
    ) -> Result<(), ReindexError> {
        if let Some(observer) = &self.observer {
            observer.on_event_set(set);
        }

        let summaries = match self.summarizer.summarize(state.marketplace(), set) {
            Ok(summaries) if summaries.is_empty() => {
                report.sets_skipped += 1;
                return Ok(());
            }
            Ok(summaries) => summaries,
            Err(err @ SummaryError::UnknownAction { .. }) => return Err(err.into()),
            Err(err @ SummaryError::Decode { .. }) => {
                tracing::warn!(error = %err, "event set skipped");
                report.sets_skipped += 1;
                return Ok(());
            }
        };

        for summary in &summaries {
            let payment = self.payments.resolve(state, summary).await?;
            self.handlers.dispatch(state, summary, &payment)?;
        }
        report.sets_dispatched += 1;
        report.actions_dispatched += summaries.len();
        Ok(())
    }

    async fn persist(
        &self,
        state: ReindexState,
        report: &mut ReindexReport,
    ) -> Result<(), ReindexError> {
        let (mut auctions, mut orders, offers) = state.into_records();

        let ids = self.sink.save_auctions(&auctions).await?;
        if ids.len() != auctions.len() {
            return Err(ReindexError::Persistence(format!(
                "sink returned {} ids for {} auctions",
                ids.len(),
                auctions.len()
            )));
        }
        bind_auction_ids(&mut auctions, &mut orders, &ids)?;

        self.sink.save_orders(&orders).await?;
        self.sink.save_offers(&offers).await?;

        report.auctions_persisted = auctions.len();
        report.orders_persisted = orders.len();
        report.offers_persisted = offers.len();
        Ok(())
    }
}

fn bind_auction_ids(
    auctions: &mut [AuctionRecord],
    orders: &mut [OrderRecord],
    ids: &[i64],
) -> Result<(), ReindexError> {
    for (auction, id) in auctions.iter_mut().zip(ids) {
        auction.id = Some(*id);
    }
    for order in orders.iter_mut() {
        let id = ids.get(order.auction_index).ok_or_else(|| {
            ReindexError::Persistence(format!(
                "order {} refers to auction #{} of {}",
                order.block_hash,
                order.auction_index,
                ids.len()
            ))
        })?;
        order.auction_id = Some(*id);
    }
    Ok(())
}
