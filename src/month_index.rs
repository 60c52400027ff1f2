//! Month-bucketed view over a set of entries.

use crate::entries::DiaryEntry;
use crate::error::SyncError;
use std::collections::{BTreeMap, BTreeSet};
use time::PrimitiveDateTime;

/// Entries grouped by `YYYY.MM`, newest month first and newest entry first
/// within a month.
///
/// Purely derived: [`MonthIndex::rebuild`] recomputes it from scratch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthIndex {
    months: Vec<String>,
    buckets: BTreeMap<String, Vec<DiaryEntry>>,
}

impl MonthIndex {
    pub fn rebuild<'a>(entries: impl IntoIterator<Item = &'a DiaryEntry>) -> Self {
        let mut stamped: BTreeMap<String, Vec<(PrimitiveDateTime, &DiaryEntry)>> = BTreeMap::new();

        for entry in entries {
            let at = match entry.timestamp() {
                Ok(at) => at,
                Err(source) => {
                    let err = SyncError::ParseFailure {
                        id: entry.id.clone(),
                        date_string: entry.date_string.clone(),
                        source,
                    };
                    tracing::warn!(%err, "Leaving entry out of month index");
                    continue;
                }
            };

            stamped.entry(month_key(at)).or_default().push((at, entry));
        }

        let buckets: BTreeMap<String, Vec<DiaryEntry>> = stamped
            .into_iter()
            .map(|(key, mut bucket)| {
                // Stable, so equal timestamps keep their input order.
                bucket.sort_by(|a, b| b.0.cmp(&a.0));
                let bucket = bucket.into_iter().map(|(_, entry)| entry.clone()).collect();
                (key, bucket)
            })
            .collect();

        let months = buckets.keys().rev().cloned().collect();

        Self { months, buckets }
    }

    /// Month keys, newest first.
    pub fn months(&self) -> &[String] {
        &self.months
    }

    pub fn entries(&self, month: &str) -> &[DiaryEntry] {
        self.buckets.get(month).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &[DiaryEntry])> + '_ {
        self.months
            .iter()
            .map(|month| (month.as_str(), self.entries(month)))
    }

    /// Days of the month that have at least one active entry, per month,
    /// newest month first. Months holding only trashed entries are left out.
    pub fn active_days(&self) -> impl Iterator<Item = (&str, BTreeSet<u8>)> + '_ {
        self.sections()
            .map(|(month, entries)| {
                let days: BTreeSet<u8> = entries
                    .iter()
                    .filter(|entry| !entry.is_deleted)
                    .filter_map(|entry| entry.timestamp().ok())
                    .map(|at| at.day())
                    .collect();
                (month, days)
            })
            .filter(|(_, days)| !days.is_empty())
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}

pub fn month_key(at: PrimitiveDateTime) -> String {
    format!("{:04}.{:02}", at.year(), u8::from(at.month()))
}
