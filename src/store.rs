use crate::entries::{DiaryEntry, EntryFilter};
use std::collections::HashMap;

/// Canonical in-memory collection of entry snapshots.
///
/// Entries keep their insertion order; an id maps to at most one snapshot.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: Vec<DiaryEntry>,
    positions: HashMap<String, usize>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[DiaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&DiaryEntry> {
        self.positions.get(id).map(|&at| &self.entries[at])
    }

    /// Query-time projection for one view.
    pub fn view(&self, filter: EntryFilter) -> impl Iterator<Item = &DiaryEntry> + '_ {
        self.entries.iter().filter(move |entry| filter.admits(entry))
    }

    /// Replaces snapshots with known ids in place and appends the rest.
    /// Entries without an id are always appended.
    ///
    /// Returns how many entries were appended.
    pub fn upsert_many(&mut self, incoming: impl IntoIterator<Item = DiaryEntry>) -> usize {
        let mut appended = 0;

        for entry in incoming {
            match entry.key().map(str::to_owned) {
                Some(id) => match self.positions.get(&id) {
                    Some(&at) => self.entries[at] = entry,
                    None => {
                        self.positions.insert(id, self.entries.len());
                        self.entries.push(entry);
                        appended += 1;
                    }
                },
                None => {
                    self.entries.push(entry);
                    appended += 1;
                }
            }
        }

        appended
    }

    /// Appends only entries whose id is not present yet, keeping their order.
    pub fn append_new(&mut self, incoming: impl IntoIterator<Item = DiaryEntry>) -> usize {
        let fresh: Vec<DiaryEntry> = incoming
            .into_iter()
            .filter(|entry| entry.key().is_none_or(|id| !self.contains(id)))
            .collect();

        self.upsert_many(fresh)
    }

    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = DiaryEntry>) {
        self.entries.clear();
        self.positions.clear();
        self.upsert_many(entries);
    }
}
