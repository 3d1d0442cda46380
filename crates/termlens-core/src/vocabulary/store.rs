//! Entry storage seam
//!
//! The matching core does not own a storage engine. [`EntryStore`] is the
//! minimal interface a persistence backend implements; [`MemoryEntryStore`]
//! backs tests and the directory loader.

use std::collections::BTreeMap;

use super::entry::{Entry, EntryId, EntryMode};
use crate::error::{MatchError, Result};

/// Storage operations for one vocabulary's entries.
pub trait EntryStore: Send + Sync {
    /// Store a new entry under a fresh id and return that id.
    fn insert(&mut self, entry: Entry) -> Result<EntryId>;

    /// Retrieve an entry by id.
    fn get(&self, id: EntryId) -> Result<Option<Entry>>;

    /// Replace an existing entry.
    ///
    /// Returns `MatchError::EntryNotFound` if the id is unknown.
    fn update(&mut self, entry: Entry) -> Result<()>;

    /// Delete an entry. Returns `true` if it existed.
    fn remove(&mut self, id: EntryId) -> Result<bool>;

    /// Every entry in ascending id order.
    fn all(&self) -> Result<Vec<Entry>>;

    fn count(&self) -> Result<usize> {
        Ok(self.all()?.len())
    }

    fn count_mode(&self, mode: EntryMode) -> Result<usize> {
        Ok(self.all()?.iter().filter(|e| e.mode == mode).count())
    }

    /// Delete every entry.
    fn clear(&mut self) -> Result<()>;
}

/// In-memory entry store.
#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    entries: BTreeMap<EntryId, Entry>,
    next_id: EntryId,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl EntryStore for MemoryEntryStore {
    fn insert(&mut self, mut entry: Entry) -> Result<EntryId> {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        entry.id = id;
        self.entries.insert(id, entry);
        Ok(id)
    }

    fn get(&self, id: EntryId) -> Result<Option<Entry>> {
        Ok(self.entries.get(&id).cloned())
    }

    fn update(&mut self, entry: Entry) -> Result<()> {
        match self.entries.get_mut(&entry.id) {
            Some(slot) => {
                *slot = entry;
                Ok(())
            }
            None => Err(MatchError::EntryNotFound(entry.id)),
        }
    }

    fn remove(&mut self, id: EntryId) -> Result<bool> {
        Ok(self.entries.remove(&id).is_some())
    }

    fn all(&self) -> Result<Vec<Entry>> {
        Ok(self.entries.values().cloned().collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    fn count_mode(&self, mode: EntryMode) -> Result<usize> {
        Ok(self.entries.values().filter(|e| e.mode == mode).count())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}
