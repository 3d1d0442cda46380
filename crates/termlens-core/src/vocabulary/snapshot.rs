//! Immutable compiled view of a vocabulary.
//!
//! Built from the entry table by compile and swapped in whole. Queries hold
//! an `Arc<IndexSnapshot>` for their entire duration, so a concurrent
//! compile never exposes a half-built structure.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::entry::{Entry, EntryId, EntryMode};
use crate::error::Result;
use crate::ngram::{IndexStats, NgramIndex};
use crate::scoring::LanguageProfile;
use crate::spans::TermStopwords;

/// Fixed seeds keep `index_hash` stable across processes.
const HASH_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// The query-time view of one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub id: EntryId,
    pub label: String,
    pub identifier: String,
    pub norm1: String,
    pub norm2: String,
    pub mode: EntryMode,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl IndexedEntry {
    pub fn has_any_tag(&self, required: &BTreeSet<String>) -> bool {
        required.is_empty() || required.iter().any(|t| self.tags.contains(t))
    }
}

impl From<&Entry> for IndexedEntry {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id,
            label: entry.label.clone(),
            identifier: entry.identifier.clone(),
            norm1: entry.norm1.clone(),
            norm2: entry.norm2.clone(),
            mode: entry.mode,
            tags: entry.tags.clone(),
        }
    }
}

/// Compiled index plus the entry rows it points at.
#[derive(Debug)]
pub struct IndexSnapshot {
    vocabulary: String,
    profile: LanguageProfile,
    generation: u64,
    /// norm2 → active entry ids
    index: NgramIndex<EntryId>,
    entries: BTreeMap<EntryId, IndexedEntry>,
    /// label → active and AutoExpanded entry ids
    by_label: BTreeMap<String, Vec<EntryId>>,
    /// norm2 → AutoExpanded entry ids
    expanded_by_norm2: BTreeMap<String, Vec<EntryId>>,
    stopwords: TermStopwords,
    index_hash: String,
    /// SHA-256 over every entry row the compile saw, BLACK included
    entries_digest: String,
}

impl IndexSnapshot {
    /// Build from the entry table. BLACK entries are ignored; AutoExpanded
    /// entries are reachable by literal lookup only.
    pub fn build(
        vocabulary: &str,
        profile: LanguageProfile,
        generation: u64,
        entries: &[Entry],
    ) -> Self {
        let rows: Vec<IndexedEntry> = entries
            .iter()
            .filter(|e| e.mode != EntryMode::Black)
            .map(IndexedEntry::from)
            .collect();
        let stopwords =
            TermStopwords::from_labels(entries.iter().map(|e| e.label.as_str()));
        Self::from_rows(
            vocabulary,
            profile,
            generation,
            rows,
            stopwords,
            entries_digest(entries),
        )
    }

    pub(crate) fn from_rows(
        vocabulary: &str,
        profile: LanguageProfile,
        generation: u64,
        rows: Vec<IndexedEntry>,
        stopwords: TermStopwords,
        entries_digest: String,
    ) -> Self {
        let mut by_label: BTreeMap<String, Vec<EntryId>> = BTreeMap::new();
        let mut expanded_by_norm2: BTreeMap<String, Vec<EntryId>> = BTreeMap::new();
        let mut indexed = Vec::new();

        for row in &rows {
            by_label.entry(row.label.clone()).or_default().push(row.id);
            if row.mode.is_active() {
                indexed.push((row.norm2.clone(), row.id));
            } else if row.mode == EntryMode::AutoExpanded && !row.norm2.is_empty() {
                expanded_by_norm2
                    .entry(row.norm2.clone())
                    .or_default()
                    .push(row.id);
            }
        }

        let index = NgramIndex::build(profile.ngram_order(), indexed);
        let entries: BTreeMap<EntryId, IndexedEntry> =
            rows.into_iter().map(|row| (row.id, row)).collect();
        let index_hash = compute_hash(&index, &entries);

        Self {
            vocabulary: vocabulary.to_string(),
            profile,
            generation,
            index,
            entries,
            by_label,
            expanded_by_norm2,
            stopwords,
            index_hash,
            entries_digest,
        }
    }

    pub fn vocabulary(&self) -> &str {
        &self.vocabulary
    }

    pub fn profile(&self) -> LanguageProfile {
        self.profile
    }

    /// Vocabulary generation this snapshot was compiled from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn index_hash(&self) -> &str {
        &self.index_hash
    }

    /// Digest of the entry table this snapshot was built from.
    ///
    /// Ids are not part of it; two tables holding the same rows in the
    /// same order share a digest.
    pub fn entries_digest(&self) -> &str {
        &self.entries_digest
    }

    pub fn stopwords(&self) -> &TermStopwords {
        &self.stopwords
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Entries visible to queries (everything but BLACK).
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, id: EntryId) -> Option<&IndexedEntry> {
        self.entries.get(&id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexedEntry> {
        self.entries.values()
    }

    pub(crate) fn ngram_index(&self) -> &NgramIndex<EntryId> {
        &self.index
    }

    /// Indexed norm2 keys similar to `norm2` under this vocabulary's measure.
    pub fn retrieve(&self, norm2: &str, threshold: f64) -> Result<Vec<&str>> {
        self.index.retrieve(norm2, self.profile.measure(), threshold)
    }

    /// Active entries stored under an exact norm2 key.
    pub fn active_for_norm2(&self, norm2: &str) -> impl Iterator<Item = &IndexedEntry> {
        self.resolve(self.index.payloads(norm2))
    }

    /// AutoExpanded entries whose norm2 equals `norm2` exactly.
    pub fn expanded_for_norm2(&self, norm2: &str) -> impl Iterator<Item = &IndexedEntry> {
        self.resolve(ids_or_empty(self.expanded_by_norm2.get(norm2)))
    }

    /// Non-BLACK entries whose label equals `label` exactly.
    pub fn by_label(&self, label: &str) -> impl Iterator<Item = &IndexedEntry> {
        self.resolve(ids_or_empty(self.by_label.get(label)))
    }

    fn resolve<'s>(&'s self, ids: &'s [EntryId]) -> impl Iterator<Item = &'s IndexedEntry> {
        ids.iter().filter_map(move |id| self.entries.get(id))
    }
}

fn ids_or_empty(ids: Option<&Vec<EntryId>>) -> &[EntryId] {
    ids.map_or(&[], Vec::as_slice)
}

/// Row digest of an entry table in id order.
pub(crate) fn entries_digest(entries: &[Entry]) -> String {
    let mut hasher = Sha256::new();
    for entry in entries {
        for field in [
            entry.label.as_str(),
            entry.identifier.as_str(),
            entry.mode.as_str(),
            entry.norm1.as_str(),
            entry.norm2.as_str(),
        ] {
            hasher.update(field.as_bytes());
            hasher.update([0x1f]);
        }
        for tag in &entry.tags {
            hasher.update(tag.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}

/// Change-detection hash over keys, payloads and entry rows.
fn compute_hash(index: &NgramIndex<EntryId>, entries: &BTreeMap<EntryId, IndexedEntry>) -> String {
    let [k0, k1, k2, k3] = HASH_SEEDS;
    let mut hasher = RandomState::with_seeds(k0, k1, k2, k3).build_hasher();
    for (key, ids) in index.iter() {
        key.hash(&mut hasher);
        ids.hash(&mut hasher);
    }
    for entry in entries.values() {
        entry.id.hash(&mut hasher);
        entry.label.hash(&mut hasher);
        entry.identifier.hash(&mut hasher);
        entry.norm2.hash(&mut hasher);
        entry.mode.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}
