//! Whole-snapshot writes against the remote stores.

use crate::entries::DiaryEntry;
use crate::error::{StoreError, SyncError};
use crate::remote::{BlobStore, RemoteStore};
use futures::future::join_all;
use std::sync::Arc;
use time::OffsetDateTime;

pub struct EntryWriter<S, B> {
    pub(crate) store: Arc<S>,
    pub(crate) blobs: Arc<B>,
}

impl<S, B> Clone for EntryWriter<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            blobs: Arc::clone(&self.blobs),
        }
    }
}

impl<S: RemoteStore, B: BlobStore> EntryWriter<S, B> {
    pub fn new(store: Arc<S>, blobs: Arc<B>) -> Self {
        Self { store, blobs }
    }

    /// Uploads every image, waits for all of them, then stores the entry
    /// with the URLs of the uploads that succeeded, in input order.
    pub async fn create(
        &self,
        mut draft: DiaryEntry,
        images: Vec<Vec<u8>>,
    ) -> Result<DiaryEntry, SyncError> {
        let user = self.store.user_id().ok_or(SyncError::AuthRequired)?;

        let uploads = join_all(
            images
                .into_iter()
                .map(|bytes| self.blobs.upload(&user, bytes)),
        )
        .await;

        for upload in uploads {
            match upload {
                Ok(url) => draft.image_urls.push(url),
                Err(err) => tracing::warn!(%err, "Image upload failed, saving entry without it"),
            }
        }

        if draft.created_at.is_none() {
            draft.created_at = Some(OffsetDateTime::now_utc());
        }

        let stored = self.store.write(draft).await.map_err(SyncError::write)?;
        tracing::info!(id = stored.key(), images = stored.image_urls.len(), "Entry created");

        Ok(stored)
    }

    /// Writes `entry` back as a whole.
    pub async fn update(&self, entry: DiaryEntry) -> Result<DiaryEntry, SyncError> {
        if entry.key().is_none() {
            return Err(SyncError::WriteFailed(StoreError::MissingId));
        }

        self.store.write(entry).await.map_err(SyncError::write)
    }

    pub async fn move_to_trash(
        &self,
        entry: &DiaryEntry,
        now: OffsetDateTime,
    ) -> Result<DiaryEntry, SyncError> {
        self.update(entry.trashed(now)).await
    }

    pub async fn restore(&self, entry: &DiaryEntry) -> Result<DiaryEntry, SyncError> {
        self.update(entry.restored()).await
    }

    /// Deletes the images (failures are logged and skipped), then the entry.
    pub async fn delete_permanently(&self, entry: &DiaryEntry) -> Result<(), SyncError> {
        let id = entry
            .key()
            .ok_or(SyncError::WriteFailed(StoreError::MissingId))?;

        let deletions = join_all(entry.image_urls.iter().map(|url| self.blobs.delete(url))).await;
        for (url, result) in entry.image_urls.iter().zip(deletions) {
            if let Err(err) = result {
                tracing::warn!(%url, %err, "Could not delete image");
            }
        }

        self.store.delete(id).await.map_err(SyncError::write)?;
        tracing::info!(id, "Entry deleted");

        Ok(())
    }
}
