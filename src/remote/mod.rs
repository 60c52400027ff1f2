//! Interfaces of the remote document store and blob store, plus the local
//! implementations the binary and the tests run against.

use crate::entries::{DiaryEntry, EntryFilter};
use crate::error::StoreError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::cmp::Ordering;

mod local;

pub use local::{DirBlobStore, LocalStore};

/// Live feed of full snapshots, one item per remote change.
pub type SnapshotStream = BoxStream<'static, Result<Vec<DiaryEntry>, StoreError>>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Identity the store acts for, `None` when nobody is signed in.
    fn user_id(&self) -> Option<String>;

    /// Current matching entries right away, then again after every change.
    fn subscribe(&self, filter: EntryFilter) -> SnapshotStream;

    /// Up to `limit` matching entries in feed order, starting strictly after
    /// `cursor` when one is given.
    async fn fetch_page(
        &self,
        filter: EntryFilter,
        cursor: Option<&PageCursor>,
        limit: usize,
    ) -> Result<Vec<DiaryEntry>, StoreError>;

    async fn fetch_all(&self, filter: EntryFilter) -> Result<Vec<DiaryEntry>, StoreError>;

    /// Stores a full snapshot and returns it as stored, with its id assigned.
    async fn write(&self, entry: DiaryEntry) -> Result<DiaryEntry, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StoreError>;

    /// Stores `bytes` under `root` and returns the URL to fetch them from.
    async fn upload(&self, root: &str, bytes: Vec<u8>) -> Result<String, StoreError>;

    async fn delete(&self, url: &str) -> Result<(), StoreError>;
}

/// Position after the last entry of a page. Only valid for the filter it was
/// taken under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    filter: EntryFilter,
    date_string: String,
    id: String,
}

impl PageCursor {
    pub fn after(filter: EntryFilter, entry: &DiaryEntry) -> Self {
        Self {
            filter,
            date_string: entry.date_string.clone(),
            id: entry.key().unwrap_or_default().to_owned(),
        }
    }

    pub fn filter(&self) -> EntryFilter {
        self.filter
    }

    /// Whether `entry` comes strictly after this position in feed order.
    pub fn precedes(&self, entry: &DiaryEntry) -> bool {
        let position = (self.date_string.as_str(), self.id.as_str());
        (entry.date_string.as_str(), entry.key().unwrap_or_default()) < position
    }
}

/// Feed order: `date_string` descending, id descending on ties.
pub fn feed_order(a: &DiaryEntry, b: &DiaryEntry) -> Ordering {
    (b.date_string.as_str(), b.key().unwrap_or_default())
        .cmp(&(a.date_string.as_str(), a.key().unwrap_or_default()))
}
