//! Fluent builder API for creating reindexers.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use marketindex_reindex::ReindexBuilder;
//! use marketindex_storage::memory::{
//!     MemoryEventStore, MemoryMarketplaces, MemoryMetadata, MemorySink, MemoryTokens,
//! };
//!
//! let reindexer = ReindexBuilder::new()
//!     .page_size(500)
//!     .metadata_batch_size(50)
//!     .event_store(Arc::new(MemoryEventStore::new()))
//!     .marketplaces(Arc::new(MemoryMarketplaces::new()))
//!     .tokens(Arc::new(MemoryTokens::new()))
//!     .metadata(Arc::new(MemoryMetadata::new()))
//!     .sink(Arc::new(MemorySink::new()))
//!     .build()
//!     .expect("all collaborators set");
//! ```

use std::sync::Arc;

use marketindex_core::config::ReindexConfig;
use marketindex_core::error::ReindexError;
use marketindex_core::handler::HandlerRegistry;
use marketindex_core::lock::ReindexLocks;
use marketindex_core::services::{
    EventStore, MarketplaceRegistry, MetadataService, PersistenceSink, TokenService,
};
use marketindex_core::summary::EventSetSummarizer;

use crate::payment::PaymentResolver;
use crate::reindex::{Clock, DispatchObserver, Reindexer};

/// Fluent builder for [`Reindexer`] and its [`ReindexConfig`].
#[derive(Default)]
pub struct ReindexBuilder {
    config: ReindexConfig,
    events: Option<Arc<dyn EventStore>>,
    marketplaces: Option<Arc<dyn MarketplaceRegistry>>,
    tokens: Option<Arc<dyn TokenService>>,
    metadata: Option<Arc<dyn MetadataService>>,
    sink: Option<Arc<dyn PersistenceSink>>,
    handlers: Option<HandlerRegistry>,
    locks: Option<ReindexLocks>,
    observer: Option<Arc<dyn DispatchObserver>>,
    clock: Option<Clock>,
}

impl ReindexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ReindexConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of events per event store page.
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set the number of identifiers per metadata request.
    pub fn metadata_batch_size(mut self, size: usize) -> Self {
        self.config.metadata_batch_size = size;
        self
    }

    /// Set how many metadata requests may be in flight.
    pub fn metadata_concurrency(mut self, n: usize) -> Self {
        self.config.metadata_concurrency = n;
        self
    }

    /// Set the native token and its decimals.
    pub fn native_token(mut self, identifier: impl Into<String>, decimals: u32) -> Self {
        self.config.native_token = identifier.into();
        self.config.native_decimals = decimals;
        self
    }

    pub fn event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.events = Some(store);
        self
    }

    pub fn marketplaces(mut self, registry: Arc<dyn MarketplaceRegistry>) -> Self {
        self.marketplaces = Some(registry);
        self
    }

    pub fn tokens(mut self, tokens: Arc<dyn TokenService>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn metadata(mut self, metadata: Arc<dyn MetadataService>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use a custom handler registry instead of [`HandlerRegistry::standard`].
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Share a lock registry with other reindexers.
    pub fn locks(mut self, locks: ReindexLocks) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Observe every event set before it is summarized.
    pub fn observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Override "now" (unix seconds) for the expiry sweep.
    pub fn clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Build the `ReindexConfig` only.
    pub fn build_config(self) -> ReindexConfig {
        self.config
    }

    /// Build the reindexer. Fails if the configuration is invalid or a
    /// collaborator is missing.
    pub fn build(self) -> Result<Reindexer, ReindexError> {
        self.config.validate()?;
        let tokens = required(self.tokens, "token service")?;
        Ok(Reindexer {
            payments: PaymentResolver::new(tokens, &self.config),
            events: required(self.events, "event store")?,
            marketplaces: required(self.marketplaces, "marketplace registry")?,
            metadata: required(self.metadata, "metadata service")?,
            sink: required(self.sink, "persistence sink")?,
            handlers: self.handlers.unwrap_or_else(HandlerRegistry::standard),
            summarizer: EventSetSummarizer::new(),
            locks: self.locks.unwrap_or_default(),
            observer: self.observer,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(|| chrono::Utc::now().timestamp())),
            config: self.config,
        })
    }
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, ReindexError> {
    value.ok_or_else(|| ReindexError::Config(format!("missing {name}")))
}
