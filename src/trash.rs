//! Bulk operations over the trash.

use crate::entries::{DiaryEntry, EntryFilter};
use crate::error::SyncError;
use crate::remote::{BlobStore, RemoteStore};
use crate::writer::EntryWriter;
use futures::future::join_all;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyOutcome {
    AlreadyEmpty,
    Emptied(usize),
}

impl<S: RemoteStore, B: BlobStore> EntryWriter<S, B> {
    async fn trashed(&self) -> Result<Vec<DiaryEntry>, SyncError> {
        if self.store.user_id().is_none() {
            return Ok(Vec::new());
        }
        Ok(self.store.fetch_all(EntryFilter::Trash).await?)
    }

    /// Deletes every entry in `doomed`; returns how many went through.
    async fn delete_all(&self, doomed: &[DiaryEntry]) -> usize {
        join_all(doomed.iter().map(|entry| self.delete_permanently(entry)))
            .await
            .into_iter()
            .filter(|result| {
                if let Err(err) = result {
                    tracing::warn!(%err, "Permanent delete failed");
                }
                result.is_ok()
            })
            .count()
    }

    /// Permanently deletes entries that sat in the trash longer than
    /// `retention`.
    pub async fn purge_expired(
        &self,
        now: OffsetDateTime,
        retention: Duration,
    ) -> Result<usize, SyncError> {
        let threshold = now - retention;

        let expired: Vec<DiaryEntry> = self
            .trashed()
            .await?
            .into_iter()
            .filter(|entry| entry.delete_date.is_some_and(|at| at < threshold))
            .collect();

        let purged = self.delete_all(&expired).await;
        if purged > 0 {
            tracing::info!(purged, "Purged expired trash");
        }

        Ok(purged)
    }

    pub async fn restore_all(&self) -> Result<usize, SyncError> {
        let trashed = self.trashed().await?;

        let restored = join_all(trashed.iter().map(|entry| self.restore(entry)))
            .await
            .into_iter()
            .filter(|result| {
                if let Err(err) = result {
                    tracing::warn!(%err, "Restore failed");
                }
                result.is_ok()
            })
            .count();

        Ok(restored)
    }

    pub async fn empty_trash(&self) -> Result<EmptyOutcome, SyncError> {
        let trashed = self.trashed().await?;

        if trashed.is_empty() {
            return Ok(EmptyOutcome::AlreadyEmpty);
        }

        Ok(EmptyOutcome::Emptied(self.delete_all(&trashed).await))
    }
}
