use super::{BlobStore, PageCursor, RemoteStore, SnapshotStream, feed_order};
use crate::entries::{DiaryEntry, EntryFilter};
use crate::error::StoreError;
use async_trait::async_trait;
use futures::{StreamExt, stream};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Entries {
    owner: Option<String>,
    entries: Vec<DiaryEntry>,
}

impl Entries {
    fn matching(&self, filter: EntryFilter) -> Vec<DiaryEntry> {
        let mut found: Vec<DiaryEntry> = self
            .entries
            .iter()
            .filter(|entry| filter.admits(entry))
            .cloned()
            .collect();
        found.sort_by(feed_order);
        found
    }
}

/// Document store kept in process, optionally persisted to a JSON file.
pub struct LocalStore {
    state: Arc<Mutex<Entries>>,
    path: Option<PathBuf>,
    revision: watch::Sender<u64>,
}

impl LocalStore {
    pub fn new(owner: Option<String>) -> Self {
        Self::from_state(
            Entries {
                owner,
                entries: Vec::new(),
            },
            None,
        )
    }

    /// In-memory store seeded with entries as they are, ids included.
    pub fn with_entries(owner: Option<String>, entries: Vec<DiaryEntry>) -> Self {
        Self::from_state(Entries { owner, entries }, None)
    }

    /// Creates a new store file; fails if one exists already.
    pub fn create(path: impl Into<PathBuf>, owner: Option<String>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = Entries {
            owner,
            entries: Vec::new(),
        };

        serde_json::to_writer(File::create_new(&path)?, &state)?;

        Ok(Self::from_state(state, Some(path)))
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state: Entries = serde_json::from_reader(File::open(&path)?)?;

        Ok(Self::from_state(state, Some(path)))
    }

    fn from_state(state: Entries, path: Option<PathBuf>) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            path,
            revision: watch::Sender::new(0),
        }
    }

    pub fn set_owner(&self, owner: Option<String>) {
        self.state.lock().owner = owner;
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Applies `change` to a copy, persists the copy and only then swaps it
    /// in; subscribers hear about it afterwards. On error nothing changes.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Entries) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let out = {
            let mut state = self.state.lock();
            let mut next = state.clone();
            let out = change(&mut next)?;
            if let Some(path) = &self.path {
                persist(path, &next)?;
            }
            *state = next;
            out
        };

        self.revision.send_modify(|rev| *rev += 1);

        Ok(out)
    }

    fn require_user(&self) -> Result<String, StoreError> {
        self.user_id().ok_or(StoreError::Unauthenticated)
    }
}

fn persist(path: &Path, state: &Entries) -> Result<(), StoreError> {
    let staged = path.with_extension("json.new");

    serde_json::to_writer(File::create(&staged)?, state)?;
    fs::rename(&staged, path)?;

    Ok(())
}

#[async_trait]
impl RemoteStore for LocalStore {
    fn user_id(&self) -> Option<String> {
        self.state.lock().owner.clone()
    }

    fn subscribe(&self, filter: EntryFilter) -> SnapshotStream {
        if self.user_id().is_none() {
            return stream::empty::<Result<Vec<DiaryEntry>, StoreError>>().boxed();
        }

        let state = Arc::clone(&self.state);
        let revisions = self.revision.subscribe();

        stream::unfold((revisions, true), move |(mut revisions, first)| {
            let state = Arc::clone(&state);
            async move {
                if !first && revisions.changed().await.is_err() {
                    return None;
                }
                revisions.borrow_and_update();

                let snapshot = state.lock().matching(filter);
                Some((Ok(snapshot), (revisions, false)))
            }
        })
        .boxed()
    }

    async fn fetch_page(
        &self,
        filter: EntryFilter,
        cursor: Option<&PageCursor>,
        limit: usize,
    ) -> Result<Vec<DiaryEntry>, StoreError> {
        self.require_user()?;

        if let Some(cursor) = cursor {
            if cursor.filter() != filter {
                return Err(StoreError::CursorScope {
                    cursor: cursor.filter(),
                    query: filter,
                });
            }
        }

        let page = self
            .state
            .lock()
            .matching(filter)
            .into_iter()
            .filter(|entry| cursor.is_none_or(|cursor| cursor.precedes(entry)))
            .take(limit)
            .collect();

        Ok(page)
    }

    async fn fetch_all(&self, filter: EntryFilter) -> Result<Vec<DiaryEntry>, StoreError> {
        self.require_user()?;

        Ok(self.state.lock().matching(filter))
    }

    async fn write(&self, mut entry: DiaryEntry) -> Result<DiaryEntry, StoreError> {
        let user = self.require_user()?;

        if entry.key().is_none() {
            entry.id = Some(Uuid::new_v4().to_string());
        }
        entry.user_id = user;

        self.mutate(|state| {
            let id = entry.key();
            match state.entries.iter_mut().find(|stored| stored.key() == id) {
                Some(stored) => *stored = entry.clone(),
                None => state.entries.push(entry.clone()),
            }
            Ok(entry)
        })
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.require_user()?;

        self.mutate(|state| {
            let before = state.entries.len();
            state.entries.retain(|entry| entry.key() != Some(id));

            if state.entries.len() == before {
                return Err(StoreError::NotFound(id.to_owned()));
            }
            Ok(())
        })
    }
}

/// Blob store over a directory; URLs look like `file://<name>`.
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, url: &str) -> Result<PathBuf, StoreError> {
        let name = url
            .strip_prefix("file://")
            .filter(|name| !name.is_empty() && !name.contains(['/', '\\']) && *name != "..")
            .ok_or_else(|| StoreError::Backend(format!("Not a blob URL: {url}")))?;

        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for DirBlobStore {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        Ok(tokio::fs::read(self.resolve(url)?).await?)
    }

    async fn upload(&self, root: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        let prefix: String = root
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        let url = format!("file://{prefix}_{}", Uuid::new_v4());

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.resolve(&url)?, bytes).await?;

        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), StoreError> {
        Ok(tokio::fs::remove_file(self.resolve(url)?).await?)
    }
}
