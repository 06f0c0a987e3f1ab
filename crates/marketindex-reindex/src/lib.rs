//! marketindex-reindex — event log pager, reindex driver and builder API.

pub mod builder;
pub mod fetcher;
pub mod payment;
pub mod reindex;
pub mod tags;

pub use builder::ReindexBuilder;
pub use fetcher::{EventPager, Page, PageCursor};
pub use reindex::{DispatchObserver, ReindexOutcome, ReindexReport, Reindexer};
