//! Merges the live feed and page fetches into one [`EntryStore`].
//!
//! Remote calls run on spawned tasks. Their results come back as events on a
//! channel and are applied one at a time by [`SyncCoordinator::pump`], which is
//! the only place that mutates the store and the month index.

use crate::entries::{DiaryEntry, EntryFilter};
use crate::error::{StoreError, SyncError};
use crate::month_index::MonthIndex;
use crate::pagination::{Page, PageStatus, PaginationEngine};
use crate::remote::RemoteStore;
use crate::store::EntryStore;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    Browse,
    Search(String),
}

/// Outcome of applying one event, for the presentation layer.
#[derive(Debug)]
pub enum Applied {
    /// A page was merged; `appended` counts entries not seen before.
    Page { appended: usize, status: PageStatus },
    /// The first page after a reset replaced the contents.
    Refreshed { count: usize, status: PageStatus },
    /// A live snapshot replaced the contents.
    Live { count: usize },
    /// Search results replaced the contents.
    Search { count: usize },
    /// The request failed; the contents are unchanged.
    Failed(SyncError),
    /// The result belonged to a view that is gone.
    Discarded,
}

enum Event {
    Page {
        scope: u64,
        replace: bool,
        result: Result<Page, SyncError>,
    },
    Live(Result<Vec<DiaryEntry>, StoreError>),
    Search {
        scope: u64,
        result: Result<Vec<DiaryEntry>, SyncError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Entry(DiaryEntry),
    /// Stand-in for an entry that is still uploading. Never stored.
    UploadPlaceholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthSection {
    pub key: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListSnapshot {
    pub sections: Vec<MonthSection>,
}

impl ListSnapshot {
    /// First image of every entry, in display order.
    pub fn cover_urls(&self) -> impl Iterator<Item = &str> + '_ {
        self.sections
            .iter()
            .flat_map(|section| &section.rows)
            .filter_map(|row| match row {
                Row::Entry(entry) => entry.image_urls.first().map(String::as_str),
                Row::UploadPlaceholder => None,
            })
    }
}

type SharedEngine<S> = Arc<Mutex<PaginationEngine<S>>>;

pub struct SyncCoordinator<S> {
    store: Arc<S>,
    page_size: usize,
    filter: EntryFilter,
    mode: ViewMode,
    /// Bumped whenever the view changes; results tagged with an older value
    /// are dropped.
    scope: u64,
    engine: SharedEngine<S>,
    entries: EntryStore,
    index: MonthIndex,
    loading: bool,
    uploading: bool,
    events: mpsc::UnboundedSender<Event>,
    inbox: mpsc::UnboundedReceiver<Event>,
    live: Option<JoinHandle<()>>,
}

impl<S: RemoteStore + 'static> SyncCoordinator<S> {
    pub fn new(store: Arc<S>, filter: EntryFilter, page_size: usize) -> Self {
        let (events, inbox) = mpsc::unbounded_channel();

        Self {
            engine: Self::engine_for(&store, filter, page_size),
            store,
            page_size,
            filter,
            mode: ViewMode::Browse,
            scope: 0,
            entries: EntryStore::new(),
            index: MonthIndex::default(),
            loading: false,
            uploading: false,
            events,
            inbox,
            live: None,
        }
    }

    fn engine_for(store: &Arc<S>, filter: EntryFilter, page_size: usize) -> SharedEngine<S> {
        Arc::new(Mutex::new(PaginationEngine::new(
            Arc::clone(store),
            filter,
            page_size,
        )))
    }

    pub fn entries(&self) -> &EntryStore {
        &self.entries
    }

    pub fn index(&self) -> &MonthIndex {
        &self.index
    }

    pub fn filter(&self) -> EntryFilter {
        self.filter
    }

    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_searching(&self) -> bool {
        matches!(self.mode, ViewMode::Search(_))
    }

    /// Subscribes to the live feed of active entries. Replaces an earlier
    /// subscription.
    pub fn start_live_feed(&mut self) {
        self.stop_live_feed();

        let mut feed = self.store.subscribe(EntryFilter::Active);
        let events = self.events.clone();

        self.live = Some(tokio::spawn(async move {
            while let Some(snapshot) = feed.next().await {
                if events.send(Event::Live(snapshot)).is_err() {
                    break;
                }
            }
            tracing::debug!("Live feed ended");
        }));
    }

    pub fn stop_live_feed(&mut self) {
        if let Some(task) = self.live.take() {
            task.abort();
        }
    }

    /// Asks for the next page. Returns `false` without doing anything while a
    /// page is loading or a search is active.
    pub fn request_next_page(&mut self) -> bool {
        if self.is_searching() || self.loading {
            return false;
        }

        self.spawn_page(false);
        true
    }

    /// Starts over from the newest entry; the first page replaces the contents.
    ///
    /// The reset gets an engine of its own. A page request still in flight
    /// keeps the old one, so it cannot move the new cursor.
    pub fn refresh(&mut self) -> bool {
        if self.is_searching() {
            return false;
        }

        self.scope += 1;
        self.engine = Self::engine_for(&self.store, self.filter, self.page_size);
        self.spawn_page(true);
        true
    }

    /// Switches between the active list and the trash. Each filter pages with
    /// its own cursor, so the switch starts from the top.
    pub fn set_filter(&mut self, filter: EntryFilter) {
        tracing::debug!(from = %self.filter, to = %filter, "Switching filter");

        self.filter = filter;
        self.mode = ViewMode::Browse;
        self.replace_contents(Vec::new());
        self.refresh();
    }

    /// Replaces the contents with entries of the current filter whose title or
    /// content contains `query`. Paging and live updates pause until
    /// [`SyncCoordinator::end_search`].
    pub fn begin_search(&mut self, query: impl Into<String>) {
        let query = query.into();

        self.scope += 1;
        self.loading = false;
        self.mode = ViewMode::Search(query.clone());

        let scope = self.scope;
        let filter = self.filter;
        let store = Arc::clone(&self.store);
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = search(store.as_ref(), filter, &query).await;
            // The coordinator may be gone; nothing is waiting then.
            let _ = events.send(Event::Search { scope, result });
        });
    }

    pub fn end_search(&mut self) {
        if !self.is_searching() {
            return;
        }

        self.mode = ViewMode::Browse;
        self.refresh();
    }

    /// Upload state lives outside the store; it only adds a placeholder row
    /// to [`SyncCoordinator::snapshot`].
    pub fn set_uploading(&mut self, uploading: bool) {
        self.uploading = uploading;
    }

    pub fn snapshot(&self) -> ListSnapshot {
        let mut sections: Vec<MonthSection> = self
            .index
            .sections()
            .map(|(key, entries)| MonthSection {
                key: key.to_owned(),
                rows: entries.iter().cloned().map(Row::Entry).collect(),
            })
            .collect();

        if self.uploading && self.filter == EntryFilter::Active {
            match sections.first_mut() {
                Some(newest) => newest.rows.insert(0, Row::UploadPlaceholder),
                None => sections.push(MonthSection {
                    key: String::new(),
                    rows: vec![Row::UploadPlaceholder],
                }),
            }
        }

        ListSnapshot { sections }
    }

    /// Waits for the next result and applies it.
    pub async fn pump(&mut self) -> Option<Applied> {
        let event = self.inbox.recv().await?;
        Some(self.apply(event))
    }

    /// Applies every result that has already arrived.
    pub fn pump_ready(&mut self) -> Vec<Applied> {
        let mut applied = Vec::new();
        while let Ok(event) = self.inbox.try_recv() {
            applied.push(self.apply(event));
        }
        applied
    }

    fn spawn_page(&mut self, replace: bool) {
        self.loading = true;

        let scope = self.scope;
        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = engine.lock().await.get_next_page().await;

            let _ = events.send(Event::Page {
                scope,
                replace,
                result,
            });
        });
    }

    fn apply(&mut self, event: Event) -> Applied {
        match event {
            Event::Page {
                scope,
                replace,
                result,
            } => {
                if scope != self.scope || self.is_searching() {
                    tracing::debug!(scope, current = self.scope, "Dropping stale page");
                    return Applied::Discarded;
                }
                self.loading = false;

                let page = match result {
                    Ok(page) => page,
                    Err(err) => return Applied::Failed(err),
                };

                let filter = self.filter;
                let fresh = page.entries.into_iter().filter(|entry| filter.admits(entry));

                if replace {
                    self.replace_contents(fresh.collect());
                    Applied::Refreshed {
                        count: self.entries.len(),
                        status: page.status,
                    }
                } else {
                    let appended = self.entries.append_new(fresh);
                    if appended > 0 {
                        self.rebuild_index();
                    }
                    Applied::Page {
                        appended,
                        status: page.status,
                    }
                }
            }
            Event::Live(result) => {
                if self.filter != EntryFilter::Active || self.is_searching() {
                    return Applied::Discarded;
                }

                match result {
                    Ok(snapshot) => {
                        let active = snapshot.into_iter().filter(|entry| !entry.is_deleted);
                        self.replace_contents(active.collect());
                        Applied::Live {
                            count: self.entries.len(),
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, "Live feed error");
                        Applied::Failed(err.into())
                    }
                }
            }
            Event::Search { scope, result } => {
                if scope != self.scope || !self.is_searching() {
                    return Applied::Discarded;
                }

                match result {
                    Ok(found) => {
                        self.replace_contents(found);
                        Applied::Search {
                            count: self.entries.len(),
                        }
                    }
                    Err(err) => Applied::Failed(err),
                }
            }
        }
    }

    fn replace_contents(&mut self, entries: Vec<DiaryEntry>) {
        self.entries.replace_all(entries);
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.index = MonthIndex::rebuild(self.entries.view(self.filter));
    }
}

impl<S> Drop for SyncCoordinator<S> {
    fn drop(&mut self) {
        if let Some(task) = self.live.take() {
            task.abort();
        }
    }
}

/// One-shot full fetch of `filter`, narrowed to entries matching `query`.
async fn search<S: RemoteStore>(
    store: &S,
    filter: EntryFilter,
    query: &str,
) -> Result<Vec<DiaryEntry>, SyncError> {
    if store.user_id().is_none() {
        return Ok(Vec::new());
    }

    let found: Vec<DiaryEntry> = store
        .fetch_all(filter)
        .await?
        .into_iter()
        .filter(|entry| filter.admits(entry) && entry.matches(query))
        .collect();

    tracing::debug!(%filter, query, count = found.len(), "Search finished");

    Ok(found)
}
