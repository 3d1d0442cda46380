//! Vocabularies: curated entries, their lifecycle and the compiled index
//!
//! A [`Vocabulary`] owns a live entry table (behind an [`EntryStore`]) and
//! an optional compiled [`IndexSnapshot`]. Curation mutates the table and
//! marks entries dirty; nothing a query can see changes until
//! [`Vocabulary::compile`] builds a new snapshot and swaps it in.
//!
//! ```rust
//! use termlens_core::normalize::BasicNormalizer;
//! use termlens_core::vocabulary::{CompileOutcome, Vocabulary, VocabularyConfig};
//!
//! let vocab = Vocabulary::new("drugs", VocabularyConfig::default()).unwrap();
//! let normalizer = BasicNormalizer::new();
//! vocab.create_entry("aspirin", "D001", Vec::<String>::new(), &normalizer).unwrap();
//! assert!(vocab.is_compilable().unwrap());
//!
//! let outcome = vocab.compile().unwrap();
//! assert!(matches!(outcome, CompileOutcome::Compiled(_)));
//! assert!(!vocab.is_compilable().unwrap());
//! ```

pub mod artifact;
mod entry;
pub mod lifecycle;
mod snapshot;
mod store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

pub use entry::{parse_entry_line, validate_tag, Entry, EntryId, EntryMode, RawEntry};
pub use lifecycle::UndoOutcome;
pub use snapshot::{IndexSnapshot, IndexedEntry};
use snapshot::entries_digest;
pub use store::{EntryStore, MemoryEntryStore};

use crate::error::{MatchError, Result};
use crate::ngram::validate_threshold;
use crate::normalize::Normalizer;
use crate::scoring::LanguageProfile;

/// Per-vocabulary defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Minimum score for approximate hits; `1.0` means exact label lookup
    pub threshold: f64,
    pub min_tokens: usize,
    pub max_tokens: usize,
    /// `kor`, `jpn`, or anything else for the default profile
    pub language: Option<String>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            min_tokens: 1,
            max_tokens: 6,
            language: None,
        }
    }
}

impl VocabularyConfig {
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)?;
        if self.min_tokens == 0 || self.min_tokens > self.max_tokens {
            return Err(MatchError::Validation(format!(
                "invalid token window [{}, {}]",
                self.min_tokens, self.max_tokens
            )));
        }
        Ok(())
    }

    pub fn profile(&self) -> LanguageProfile {
        LanguageProfile::from_language(self.language.as_deref())
    }
}

/// Entry counts by mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCounts {
    pub gray: usize,
    pub white: usize,
    pub black: usize,
    pub auto_expanded: usize,
}

impl EntryCounts {
    /// Entries that are not BLACK.
    pub fn entries_num(&self) -> usize {
        self.gray + self.white + self.auto_expanded
    }

    pub fn total(&self) -> usize {
        self.entries_num() + self.black
    }
}

/// Summary of a finished compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileReport {
    pub vocabulary: String,
    pub generation: u64,
    /// Entries visible to queries
    pub entries: usize,
    /// Distinct norm2 keys in the approximate index
    pub keys: usize,
    pub index_hash: String,
    pub elapsed_ms: u64,
}

/// Result of a compile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Compiled(CompileReport),
    /// Another compile of the same vocabulary is in progress; nothing ran
    AlreadyRunning,
    /// Every entry was removed while the snapshot was being built; nothing
    /// was saved or installed
    Discarded,
}

/// One synonym proposed by an expander.
#[derive(Debug, Clone, PartialEq)]
pub struct Synonym {
    pub label: String,
    /// Provenance confidence in [0, 1)
    pub score: f64,
}

/// Source of synonyms for synonym expansion.
pub trait SynonymExpander: Send + Sync {
    /// Synonyms for the concept `identifier`, known under `labels`.
    fn expand(&self, identifier: &str, labels: &[String]) -> Vec<Synonym>;
}

/// Vocabulary names: at least three characters, starting with a letter or
/// `_`, then letters, digits, `_`, `-`, space or parentheses.
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_first = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest =
        chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' ' | '(' | ')'));
    if name.chars().count() < 3 || !valid_first || !valid_rest {
        return Err(MatchError::Validation(format!(
            "invalid vocabulary name '{name}'"
        )));
    }
    Ok(())
}

/// A named collection of entries plus its compiled index.
pub struct Vocabulary {
    name: String,
    config: VocabularyConfig,
    profile: LanguageProfile,
    store: RwLock<Box<dyn EntryStore>>,
    /// Bumped on every entry mutation
    generation: AtomicU64,
    /// Generation the installed snapshot reflects
    compiled_generation: AtomicU64,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
    compile_guard: Mutex<()>,
    index_dir: Option<PathBuf>,
    /// Set when an artifact was corrupt and the rebuild failed
    failed: AtomicBool,
    /// Bumped by `empty_entries(None)`
    clear_epoch: AtomicU64,
}

impl std::fmt::Debug for Vocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vocabulary")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl Vocabulary {
    /// An empty, never compiled vocabulary backed by a [`MemoryEntryStore`].
    pub fn new(name: impl Into<String>, config: VocabularyConfig) -> Result<Self> {
        Self::with_store(name, config, Box::new(MemoryEntryStore::new()))
    }

    pub fn with_store(
        name: impl Into<String>,
        config: VocabularyConfig,
        store: Box<dyn EntryStore>,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        config.validate()?;
        let profile = config.profile();
        Ok(Self {
            name,
            config,
            profile,
            store: RwLock::new(store),
            generation: AtomicU64::new(0),
            compiled_generation: AtomicU64::new(0),
            snapshot: RwLock::new(None),
            compile_guard: Mutex::new(()),
            index_dir: None,
            failed: AtomicBool::new(false),
            clear_epoch: AtomicU64::new(0),
        })
    }

    /// Persist compiled artifacts under `index_dir/<name>/`.
    pub fn with_index_dir(mut self, index_dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(index_dir.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &VocabularyConfig {
        &self.config
    }

    pub fn profile(&self) -> LanguageProfile {
        self.profile
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn index_dir(&self) -> Option<&Path> {
        self.index_dir.as_deref()
    }

    /// The compiled snapshot queries should use.
    ///
    /// `Ok(None)` if never compiled; `IndexUnavailable` after a failed
    /// recovery until a compile succeeds.
    pub fn snapshot(&self) -> Result<Option<Arc<IndexSnapshot>>> {
        if self.failed.load(Ordering::Acquire) {
            return Err(MatchError::IndexUnavailable(self.name.clone()));
        }
        Ok(self.snapshot.read().clone())
    }

    // ---- curation ----------------------------------------------------

    fn next_revision(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn normalize_label(&self, normalizer: &dyn Normalizer, label: &str) -> Result<(String, String)> {
        let norm1 = normalizer.normalize(label, &self.profile.normalizer1())?;
        let norm2 = normalizer.normalize(label, &self.profile.normalizer2())?;
        Ok((norm1, norm2))
    }

    fn prepare_entry(
        &self,
        normalizer: &dyn Normalizer,
        raw: RawEntry,
        mode: EntryMode,
    ) -> Result<Entry> {
        let (norm1, norm2) = self.normalize_label(normalizer, &raw.label)?;
        Entry::new(raw.label, raw.identifier, norm1, norm2, mode)?.with_tags(raw.tags)
    }

    fn insert_all(&self, entries: Vec<Entry>) -> Result<Vec<EntryId>> {
        let mut store = self.store.write();
        let revision = self.next_revision();
        entries
            .into_iter()
            .map(|mut entry| {
                entry.dirty = true;
                entry.revision = revision;
                store.insert(entry)
            })
            .collect()
    }

    /// Bulk import as GRAY. Every row is normalized and validated before
    /// any is stored.
    pub fn add_entries(
        &self,
        raw_entries: Vec<RawEntry>,
        normalizer: &dyn Normalizer,
    ) -> Result<Vec<EntryId>> {
        let entries = raw_entries
            .into_iter()
            .map(|raw| self.prepare_entry(normalizer, raw, EntryMode::Gray))
            .collect::<Result<Vec<_>>>()?;
        let ids = self.insert_all(entries)?;
        debug!(vocabulary = %self.name, added = ids.len(), "Imported entries");
        Ok(ids)
    }

    /// Manually created entries start WHITE and dirty.
    pub fn create_entry<I, S>(
        &self,
        label: &str,
        identifier: &str,
        tags: I,
        normalizer: &dyn Normalizer,
    ) -> Result<EntryId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let raw = RawEntry {
            label: label.to_string(),
            identifier: identifier.to_string(),
            tags: tags.into_iter().map(Into::into).collect(),
        };
        let entry = self.prepare_entry(normalizer, raw, EntryMode::White)?;
        let ids = self.insert_all(vec![entry])?;
        Ok(ids[0])
    }

    /// Apply `transition` to one entry under the write lock.
    fn transition<T>(
        &self,
        id: EntryId,
        transition: impl FnOnce(&mut Entry, u64) -> Result<T>,
    ) -> Result<T> {
        let mut store = self.store.write();
        let mut entry = store.get(id)?.ok_or(MatchError::EntryNotFound(id))?;
        let revision = self.generation() + 1;
        let outcome = transition(&mut entry, revision)?;
        self.next_revision();
        store.update(entry)?;
        Ok(outcome)
    }

    /// GRAY → WHITE for every id. Nothing changes if any id is unknown or
    /// not confirmable.
    pub fn confirm_entries(&self, ids: &[EntryId]) -> Result<()> {
        let mut store = self.store.write();
        let revision = self.generation() + 1;
        let mut updated = Vec::with_capacity(ids.len());
        for &id in ids {
            let mut entry = store.get(id)?.ok_or(MatchError::EntryNotFound(id))?;
            lifecycle::confirm(&mut entry, revision)?;
            updated.push(entry);
        }
        self.next_revision();
        for entry in updated {
            store.update(entry)?;
        }
        Ok(())
    }

    /// GRAY → BLACK.
    pub fn turn_to_black(&self, id: EntryId) -> Result<()> {
        self.transition(id, lifecycle::reject)
    }

    /// BLACK → GRAY.
    pub fn cancel_black(&self, id: EntryId) -> Result<()> {
        self.transition(id, lifecycle::cancel_black)
    }

    /// WHITE entries are destroyed; BLACK entries return to GRAY.
    pub fn undo_entry(&self, id: EntryId) -> Result<UndoOutcome> {
        let mut store = self.store.write();
        let mut entry = store.get(id)?.ok_or(MatchError::EntryNotFound(id))?;
        let revision = self.generation() + 1;
        let outcome = lifecycle::undo(&mut entry, revision)?;
        self.next_revision();
        match outcome {
            UndoOutcome::Destroy => {
                store.remove(id)?;
            }
            UndoOutcome::Restored => store.update(entry)?,
        }
        Ok(outcome)
    }

    /// Delete one entry regardless of mode.
    pub fn remove_entry(&self, id: EntryId) -> Result<()> {
        let mut store = self.store.write();
        if !store.remove(id)? {
            return Err(MatchError::EntryNotFound(id));
        }
        self.next_revision();
        Ok(())
    }

    /// Bulk removal.
    ///
    /// `None` drops every entry together with the compiled index and its
    /// artifact. GRAY, WHITE and AUTO_EXPANDED destroy entries in that
    /// mode; BLACK moves each rejected entry back to GRAY. Returns the
    /// number of entries affected.
    pub fn empty_entries(&self, mode: Option<EntryMode>) -> Result<usize> {
        let mut store = self.store.write();
        let entries = store.all()?;
        let revision = self.next_revision();

        let affected = match mode {
            None => {
                store.clear()?;
                self.clear_epoch.fetch_add(1, Ordering::AcqRel);
                *self.snapshot.write() = None;
                if let Some(dir) = &self.index_dir {
                    artifact::remove(dir, &self.name)?;
                }
                entries.len()
            }
            Some(EntryMode::Black) => {
                let mut count = 0;
                for mut entry in entries.into_iter().filter(|e| e.mode == EntryMode::Black) {
                    lifecycle::cancel_black(&mut entry, revision)?;
                    store.update(entry)?;
                    count += 1;
                }
                count
            }
            Some(target) => {
                let mut count = 0;
                for entry in entries.iter().filter(|e| e.mode == target) {
                    if store.remove(entry.id)? {
                        count += 1;
                    }
                }
                count
            }
        };

        info!(vocabulary = %self.name, mode = ?mode, affected, "Emptied entries");
        Ok(affected)
    }

    /// Insert AUTO_EXPANDED entries proposed by `expander` for every
    /// identifier with active entries, in identifier order.
    pub fn expand_synonyms(
        &self,
        expander: &dyn SynonymExpander,
        normalizer: &dyn Normalizer,
    ) -> Result<usize> {
        let mut labels_by_identifier: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in self.entries()? {
            if entry.mode.is_active() {
                labels_by_identifier
                    .entry(entry.identifier)
                    .or_default()
                    .push(entry.label);
            }
        }

        let mut expanded = Vec::new();
        for (identifier, labels) in &labels_by_identifier {
            for synonym in expander.expand(identifier, labels) {
                let raw = RawEntry::new(synonym.label, identifier.clone());
                let entry = self
                    .prepare_entry(normalizer, raw, EntryMode::AutoExpanded)?
                    .with_score(synonym.score)?;
                expanded.push(entry);
            }
        }

        let ids = self.insert_all(expanded)?;
        info!(
            vocabulary = %self.name,
            identifiers = labels_by_identifier.len(),
            synonyms = ids.len(),
            "Expanded synonyms"
        );
        Ok(ids.len())
    }

    // ---- reads -------------------------------------------------------

    /// Live entries in id order.
    pub fn entries(&self) -> Result<Vec<Entry>> {
        self.store.read().all()
    }

    pub fn entry(&self, id: EntryId) -> Result<Entry> {
        self.store
            .read()
            .get(id)?
            .ok_or(MatchError::EntryNotFound(id))
    }

    pub fn counts(&self) -> Result<EntryCounts> {
        let store = self.store.read();
        Ok(EntryCounts {
            gray: store.count_mode(EntryMode::Gray)?,
            white: store.count_mode(EntryMode::White)?,
            black: store.count_mode(EntryMode::Black)?,
            auto_expanded: store.count_mode(EntryMode::AutoExpanded)?,
        })
    }

    /// Entries exist and the compiled index is missing or behind the table.
    pub fn is_compilable(&self) -> Result<bool> {
        let store = self.store.read();
        if store.count()? == 0 {
            return Ok(false);
        }
        let compiled = self.snapshot.read().is_some();
        Ok(!compiled || self.compiled_generation.load(Ordering::Acquire) < self.generation())
    }

    // ---- compile -----------------------------------------------------

    /// Rebuild the index from the current entries and swap it in.
    ///
    /// Returns `CompileOutcome::AlreadyRunning` without doing anything if a
    /// compile of this vocabulary is in progress.
    pub fn compile(&self) -> Result<CompileOutcome> {
        match self.prepare_compile()? {
            Some(pending) => pending.commit(),
            None => {
                warn!(vocabulary = %self.name, "Compile already running, request rejected");
                Ok(CompileOutcome::AlreadyRunning)
            }
        }
    }

    /// Build a new snapshot without installing it.
    ///
    /// Holds the compile guard until the returned value is committed or
    /// dropped. `Ok(None)` if another compile holds the guard.
    pub fn prepare_compile(&self) -> Result<Option<PendingCompile<'_>>> {
        let Some(guard) = self.compile_guard.try_lock() else {
            return Ok(None);
        };
        let started = Instant::now();

        let (generation, clear_epoch, entries) = {
            let store = self.store.read();
            (
                self.generation(),
                self.clear_epoch.load(Ordering::Acquire),
                store.all()?,
            )
        };
        info!(vocabulary = %self.name, entries = entries.len(), generation, "Compiling index");

        let snapshot = IndexSnapshot::build(&self.name, self.profile, generation, &entries);

        Ok(Some(PendingCompile {
            vocabulary: self,
            _guard: guard,
            snapshot,
            generation,
            clear_epoch,
            started,
        }))
    }

    fn install(&self, snapshot: IndexSnapshot, generation: u64) {
        *self.snapshot.write() = Some(Arc::new(snapshot));
        self.compiled_generation.store(generation, Ordering::Release);
        self.failed.store(false, Ordering::Release);
    }

    /// Clear `dirty` on WHITE entries the compile at `generation` observed.
    fn mark_compiled(&self, generation: u64) -> Result<()> {
        let mut store = self.store.write();
        for mut entry in store.all()? {
            if entry.dirty {
                lifecycle::mark_compiled(&mut entry, generation);
                if !entry.dirty {
                    store.update(entry)?;
                }
            }
        }
        Ok(())
    }

    // ---- artifact recovery ---------------------------------------------

    /// Load the persisted index, if any.
    ///
    /// The artifact is installed only if its entry digest matches the
    /// current entry table; otherwise the vocabulary stays compilable.
    /// A corrupt artifact triggers one rebuild from the entry table. If that
    /// rebuild fails the vocabulary is marked failed and queries return
    /// `IndexUnavailable` until a compile succeeds.
    pub fn open(&self) -> Result<()> {
        let Some(dir) = &self.index_dir else {
            return Ok(());
        };
        let path = artifact::artifact_path(dir, &self.name);

        match artifact::load(&path, &self.name, self.profile) {
            Ok(Some(snapshot)) => {
                let (generation, digest) = {
                    let store = self.store.read();
                    (self.generation(), entries_digest(&store.all()?))
                };
                if snapshot.entries_digest() != digest {
                    info!(
                        vocabulary = %self.name,
                        hash = %snapshot.index_hash(),
                        "Index artifact predates the current entries, compile required"
                    );
                    return Ok(());
                }
                info!(
                    vocabulary = %self.name,
                    keys = snapshot.stats().key_count,
                    hash = %snapshot.index_hash(),
                    "Loaded index artifact"
                );
                self.install(snapshot, generation);
                self.mark_compiled(generation)
            }
            Ok(None) => {
                debug!(vocabulary = %self.name, "No index artifact");
                Ok(())
            }
            Err(err @ MatchError::IndexCorrupt { .. }) => {
                warn!(vocabulary = %self.name, error = %err, "Index artifact corrupt, rebuilding");
                match self.compile() {
                    Ok(_) => Ok(()),
                    Err(rebuild) => {
                        self.failed.store(true, Ordering::Release);
                        error!(vocabulary = %self.name, error = %rebuild, "Index rebuild failed");
                        Err(MatchError::IndexUnavailable(self.name.clone()))
                    }
                }
            }
            Err(err) => Err(err),
        }
    }
}

/// A built but not yet visible snapshot.
pub struct PendingCompile<'v> {
    vocabulary: &'v Vocabulary,
    _guard: MutexGuard<'v, ()>,
    snapshot: IndexSnapshot,
    generation: u64,
    clear_epoch: u64,
    started: Instant,
}

impl PendingCompile<'_> {
    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    /// Persist the artifact (if configured), swap the snapshot in and clear
    /// dirty flags.
    ///
    /// Returns `CompileOutcome::Discarded` if the vocabulary was emptied
    /// after this compile read its entries.
    pub fn commit(self) -> Result<CompileOutcome> {
        let vocabulary = self.vocabulary;
        // Held until the install so a full clear cannot interleave.
        let store = vocabulary.store.read();
        if vocabulary.clear_epoch.load(Ordering::Acquire) != self.clear_epoch {
            warn!(
                vocabulary = %vocabulary.name,
                "Entries emptied during compile, snapshot discarded"
            );
            return Ok(CompileOutcome::Discarded);
        }
        if let Some(dir) = &vocabulary.index_dir {
            artifact::save(
                &artifact::artifact_path(dir, &vocabulary.name),
                &self.snapshot,
            )?;
        }

        let report = CompileReport {
            vocabulary: vocabulary.name.clone(),
            generation: self.generation,
            entries: self.snapshot.entry_count(),
            keys: self.snapshot.stats().key_count,
            index_hash: self.snapshot.index_hash().to_string(),
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        vocabulary.install(self.snapshot, self.generation);
        drop(store);
        vocabulary.mark_compiled(self.generation)?;

        info!(
            vocabulary = %report.vocabulary,
            entries = report.entries,
            keys = report.keys,
            elapsed_ms = report.elapsed_ms,
            hash = %report.index_hash,
            "Index compiled"
        );
        Ok(CompileOutcome::Compiled(report))
    }
}
