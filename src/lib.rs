//! Diary client core: paged and live-synced entries, grouped by month, with
//! a shared image cache.

pub mod config;
pub mod entries;
pub mod error;
pub mod image_cache;
pub mod logging;
pub mod month_index;
pub mod pagination;
pub mod remote;
pub mod store;
pub mod sync;
pub mod trash;
pub mod writer;

pub use config::DiaryConfig;
pub use entries::{DiaryEntry, EntryFilter};
pub use error::{ConfigError, StoreError, SyncError};
pub use image_cache::{Image, ImageCache, Lookup};
pub use month_index::MonthIndex;
pub use pagination::{CursorState, Page, PageStatus, PaginationEngine};
pub use remote::{BlobStore, DirBlobStore, LocalStore, PageCursor, RemoteStore};
pub use store::EntryStore;
pub use sync::{Applied, ListSnapshot, MonthSection, Row, SyncCoordinator, ViewMode};
pub use trash::EmptyOutcome;
pub use writer::EntryWriter;
