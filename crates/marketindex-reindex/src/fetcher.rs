//! Event log pager.
//!
//! Reads the marketplace log through an [`EventStore`] in ascending pages and
//! trims every page at a point where no transaction can straddle it. Events
//! of one transaction share a timestamp, so the only unsafe cut is inside the
//! run of events carrying the page's last timestamp:
//!
//! - page spans several timestamps: the trailing run at the last timestamp is
//!   dropped and the next fetch restarts at that timestamp
//! - page is one timestamp: all of it is handed out and the next fetch skips
//!   past it within the same timestamp
//! - short page: the log is exhausted and the page is handed out whole

use std::sync::Arc;

use marketindex_core::error::ReindexError;
use marketindex_core::services::EventStore;
use marketindex_core::types::RawEvent;

/// One trimmed page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Events safe to append to the replay buffer.
    pub events: Vec<RawEvent>,
    /// Events returned by the store, before trimming.
    pub fetched: usize,
    /// `true` once the store has no more events.
    pub is_last: bool,
}

/// Position of the next fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub from_timestamp: i64,
    pub skip: usize,
}

/// Pages the event log of one marketplace.
pub struct EventPager {
    store: Arc<dyn EventStore>,
    address: String,
    page_size: usize,
    cursor: PageCursor,
    exhausted: bool,
}

impl EventPager {
    pub fn new(store: Arc<dyn EventStore>, address: impl Into<String>, page_size: usize) -> Self {
        Self {
            store,
            address: address.into(),
            page_size: page_size.max(1),
            cursor: PageCursor::default(),
            exhausted: false,
        }
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// Fetch and trim the next page. After the last page, returns an empty
    /// last page.
    pub async fn next_page(&mut self) -> Result<Page, ReindexError> {
        if self.exhausted {
            return Ok(Page {
                is_last: true,
                ..Page::default()
            });
        }

        let events = self
            .store
            .events_ascending(
                &self.address,
                self.cursor.from_timestamp,
                self.cursor.skip,
                self.page_size,
            )
            .await?;
        let fetched = events.len();

        if fetched < self.page_size {
            self.exhausted = true;
            return Ok(Page {
                events,
                fetched,
                is_last: true,
            });
        }

        let (events, cursor) = trim_page(events, self.cursor);
        self.cursor = cursor;
        Ok(Page {
            events,
            fetched,
            is_last: false,
        })
    }
}

/// Cut a full page at a safe boundary and compute where the next fetch starts.
pub fn trim_page(mut events: Vec<RawEvent>, cursor: PageCursor) -> (Vec<RawEvent>, PageCursor) {
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return (events, cursor);
    };
    let (first, last) = (first.timestamp, last.timestamp);

    if first != last {
        let cut = events
            .iter()
            .position(|e| e.timestamp == last)
            .unwrap_or(events.len());
        events.truncate(cut);
        return (
            events,
            PageCursor {
                from_timestamp: last,
                skip: 0,
            },
        );
    }

    // whole page shares one timestamp
    let skip = if cursor.from_timestamp == last {
        cursor.skip + events.len()
    } else {
        events.len()
    };
    (
        events,
        PageCursor {
            from_timestamp: last,
            skip,
        },
    )
}
