use crate::entries::EntryFilter;
use thiserror::Error;

/// Failures reported by the remote collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No signed-in user")]
    Unauthenticated,

    #[error("Entry {0} does not exist")]
    NotFound(String),

    #[error("Entry has no id yet")]
    MissingId,

    #[error("Cursor belongs to the {cursor} filter, query is for {query}")]
    CursorScope {
        cursor: EntryFilter,
        query: EntryFilter,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Backend(String),
}

/// Failures surfaced by the sync core.
///
/// Every variant is absorbed at the component boundary: callers get an empty
/// or partial result together with one of these, never a panic.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No identity available")]
    AuthRequired,

    #[error("Fetch failed: {0}")]
    FetchFailed(#[source] StoreError),

    #[error("Write failed: {0}")]
    WriteFailed(#[source] StoreError),

    #[error("Image fetch failed for {url}: {reason}")]
    ImageFetchFailed { url: String, reason: String },

    #[error("Entry {id:?} has malformed date {date_string:?}")]
    ParseFailure {
        id: Option<String>,
        date_string: String,
        #[source]
        source: time::error::Parse,
    },
}

impl SyncError {
    /// Classifies a store error raised by a write or delete.
    pub fn write(err: StoreError) -> Self {
        match err {
            StoreError::Unauthenticated => SyncError::AuthRequired,
            other => SyncError::WriteFailed(other),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthenticated => SyncError::AuthRequired,
            other => SyncError::FetchFailed(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Malformed config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
