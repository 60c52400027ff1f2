use serde::{Deserialize, Serialize};
use std::fmt;
use time::{
    OffsetDateTime, PrimitiveDateTime, format_description::BorrowedFormatItem,
    macros::format_description,
};

/// Layout of `date_string`. Lexicographic order equals chronological order.
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// One diary record as stored remotely.
///
/// Snapshots are values: changing any field means writing a whole new snapshot
/// back, never patching single fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub content: String,
    pub date_string: String,
    #[serde(default)]
    pub emotion: String,
    #[serde(default)]
    pub weather: String,
    #[serde(default, rename = "imageURL")]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub delete_date: Option<OffsetDateTime>,
    #[serde(default, rename = "userID")]
    pub user_id: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub weather_description: Option<String>,
    #[serde(default)]
    pub weather_temp: Option<f64>,
}

impl DiaryEntry {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        date_string: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            date_string: date_string.into(),
            emotion: String::new(),
            weather: String::new(),
            image_urls: Vec::new(),
            is_deleted: false,
            delete_date: None,
            user_id: String::new(),
            created_at: None,
            location: None,
            weather_description: None,
            weather_temp: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The id, treating an empty string the same as a missing one.
    pub fn key(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn timestamp(&self) -> Result<PrimitiveDateTime, time::error::Parse> {
        PrimitiveDateTime::parse(&self.date_string, DATE_FORMAT)
    }

    /// Snapshot moved to the trash at `now`.
    pub fn trashed(&self, now: OffsetDateTime) -> Self {
        Self {
            is_deleted: true,
            delete_date: Some(now),
            ..self.clone()
        }
    }

    /// Snapshot taken back out of the trash.
    pub fn restored(&self) -> Self {
        Self {
            is_deleted: false,
            delete_date: None,
            ..self.clone()
        }
    }

    /// Case-insensitive match on title or content.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();

        self.title.to_lowercase().contains(&query) || self.content.to_lowercase().contains(&query)
    }
}

pub fn format_date(at: PrimitiveDateTime) -> String {
    // The format description only contains numeric components.
    at.format(DATE_FORMAT).unwrap_or_default()
}

/// Which slice of the collection a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntryFilter {
    #[default]
    Active,
    Trash,
}

impl EntryFilter {
    pub fn admits(self, entry: &DiaryEntry) -> bool {
        match self {
            EntryFilter::Active => !entry.is_deleted,
            EntryFilter::Trash => entry.is_deleted && entry.delete_date.is_some(),
        }
    }
}

impl fmt::Display for EntryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryFilter::Active => f.write_str("active"),
            EntryFilter::Trash => f.write_str("trash"),
        }
    }
}
