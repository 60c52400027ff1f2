#![allow(dead_code)]

use async_trait::async_trait;
use diary::remote::SnapshotStream;
use diary::{DiaryEntry, EntryFilter, LocalStore, PageCursor, RemoteStore, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn entry(id: &str, date: &str) -> DiaryEntry {
    DiaryEntry::new(format!("title {id}"), format!("content {id}"), date).with_id(id)
}

pub fn seeded(entries: Vec<DiaryEntry>) -> LocalStore {
    LocalStore::with_entries(Some("me".into()), entries)
}

pub fn ids(entries: &[DiaryEntry]) -> Vec<&str> {
    entries.iter().filter_map(DiaryEntry::key).collect()
}

/// Wraps a [`LocalStore`] and fails the next `n` page fetches.
pub struct FlakyStore {
    pub inner: LocalStore,
    failures: AtomicUsize,
    pub page_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: LocalStore) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(0),
            page_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for FlakyStore {
    fn user_id(&self) -> Option<String> {
        self.inner.user_id()
    }

    fn subscribe(&self, filter: EntryFilter) -> SnapshotStream {
        self.inner.subscribe(filter)
    }

    async fn fetch_page(
        &self,
        filter: EntryFilter,
        cursor: Option<&PageCursor>,
        limit: usize,
    ) -> Result<Vec<DiaryEntry>, StoreError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Backend("connection reset".into()));
        }

        self.inner.fetch_page(filter, cursor, limit).await
    }

    async fn fetch_all(&self, filter: EntryFilter) -> Result<Vec<DiaryEntry>, StoreError> {
        self.inner.fetch_all(filter).await
    }

    async fn write(&self, entry: DiaryEntry) -> Result<DiaryEntry, StoreError> {
        self.inner.write(entry).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
}
