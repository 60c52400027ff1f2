//! Per-diary settings, read from `diary.toml` next to `diary.json`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = "diary.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiaryConfig {
    /// Entries per page when scrolling the list.
    pub page_size: usize,

    /// Number of decoded images kept in memory.
    pub image_cache_capacity: usize,

    /// Hours an entry stays in the trash before it is purged.
    pub trash_retention_hours: u32,

    /// Default log filter, overridden by `RUST_LOG`.
    pub log_filter: String,
}

impl Default for DiaryConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            image_cache_capacity: 100,
            trash_retention_hours: 72,
            log_filter: "info".to_owned(),
        }
    }
}

impl DiaryConfig {
    /// Reads the config in `dir`; a missing file means defaults.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);

        let config: Self = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(err.into()),
        };

        Ok(config.clamped())
    }

    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        std::fs::write(dir.join(CONFIG_FILE), toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn trash_retention(&self) -> time::Duration {
        time::Duration::hours(i64::from(self.trash_retention_hours))
    }

    fn clamped(mut self) -> Self {
        self.page_size = self.page_size.max(1);
        self.image_cache_capacity = self.image_cache_capacity.max(1);
        self
    }
}
