//! Cursor-based paging over one filter of the remote collection.

use crate::entries::{DiaryEntry, EntryFilter};
use crate::error::SyncError;
use crate::remote::{PageCursor, RemoteStore};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    Initial,
    Positioned(PageCursor),
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    /// A full page came back; there may be more.
    More,
    /// The collection is drained; later calls return nothing.
    Exhausted,
    /// Nobody is signed in, nothing was asked of the store.
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub entries: Vec<DiaryEntry>,
    pub status: PageStatus,
}

impl Page {
    fn empty(status: PageStatus) -> Self {
        Self {
            entries: Vec::new(),
            status,
        }
    }
}

/// Pages through one filter scope, newest `date_string` first.
///
/// Calls must not overlap: callers wait for one page before asking for the
/// next. Taking `&mut self` makes that hold within one owner; owners sharing
/// an engine serialize through their own loading flag.
pub struct PaginationEngine<S> {
    store: Arc<S>,
    filter: EntryFilter,
    page_size: usize,
    state: CursorState,
}

impl<S: RemoteStore> PaginationEngine<S> {
    pub fn new(store: Arc<S>, filter: EntryFilter, page_size: usize) -> Self {
        Self {
            store,
            filter,
            page_size: page_size.max(1),
            state: CursorState::Initial,
        }
    }

    pub fn filter(&self) -> EntryFilter {
        self.filter
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    pub fn reset_query(&mut self) {
        self.state = CursorState::Initial;
    }

    /// Fetches the page after the current position.
    ///
    /// A failed fetch leaves the position untouched, so calling again retries
    /// the same page.
    pub async fn get_next_page(&mut self) -> Result<Page, SyncError> {
        let cursor = match &self.state {
            CursorState::Exhausted => return Ok(Page::empty(PageStatus::Exhausted)),
            CursorState::Initial => None,
            CursorState::Positioned(cursor) => Some(cursor),
        };

        if self.store.user_id().is_none() {
            tracing::debug!(filter = %self.filter, "Skipping page fetch, no user");
            return Ok(Page::empty(PageStatus::Unauthenticated));
        }

        let entries = self
            .store
            .fetch_page(self.filter, cursor, self.page_size)
            .await
            .inspect_err(|err| tracing::warn!(filter = %self.filter, %err, "Page fetch failed"))?;

        let status = match entries.last() {
            Some(last) if entries.len() >= self.page_size => {
                self.state = CursorState::Positioned(PageCursor::after(self.filter, last));
                PageStatus::More
            }
            _ => {
                self.state = CursorState::Exhausted;
                PageStatus::Exhausted
            }
        };

        tracing::debug!(
            filter = %self.filter,
            count = entries.len(),
            ?status,
            "Fetched page"
        );

        Ok(Page { entries, status })
    }
}
