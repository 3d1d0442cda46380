//! Named vocabularies shared by the matcher and the service layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::info;

use crate::error::{MatchError, Result};
use crate::vocabulary::{CompileOutcome, Vocabulary};

/// Thread-safe map of vocabulary name → vocabulary.
#[derive(Debug, Default)]
pub struct VocabularyRegistry {
    vocabularies: RwLock<BTreeMap<String, Arc<Vocabulary>>>,
}

impl VocabularyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vocabulary. Names must be unique.
    pub fn register(&self, vocabulary: Vocabulary) -> Result<Arc<Vocabulary>> {
        let mut map = self.vocabularies.write();
        if map.contains_key(vocabulary.name()) {
            return Err(MatchError::Validation(format!(
                "vocabulary '{}' already registered",
                vocabulary.name()
            )));
        }
        let vocabulary = Arc::new(vocabulary);
        map.insert(vocabulary.name().to_string(), Arc::clone(&vocabulary));
        Ok(vocabulary)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Vocabulary>> {
        self.vocabularies.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Vocabulary>> {
        self.vocabularies.write().remove(name)
    }

    /// Names in ascending order.
    pub fn names(&self) -> Vec<String> {
        self.vocabularies.read().keys().cloned().collect()
    }

    pub fn all(&self) -> Vec<Arc<Vocabulary>> {
        self.vocabularies.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.vocabularies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabularies.read().is_empty()
    }

    /// Resolve a list such as `"mesh, chebi|go"`.
    ///
    /// Names are split on `,` and `|` and trimmed; duplicates collapse.
    /// Every unknown name is reported in a single `UnknownVocabulary`.
    pub fn resolve(&self, names: &str) -> Result<Vec<Arc<Vocabulary>>> {
        let map = self.vocabularies.read();
        let mut resolved: Vec<Arc<Vocabulary>> = Vec::new();
        let mut unknown: Vec<&str> = Vec::new();

        for name in names.split([',', '|']).map(str::trim).filter(|n| !n.is_empty()) {
            match map.get(name) {
                Some(v) if !resolved.iter().any(|r| r.name() == name) => resolved.push(Arc::clone(v)),
                Some(_) => {}
                None if !unknown.contains(&name) => unknown.push(name),
                None => {}
            }
        }

        if !unknown.is_empty() {
            return Err(MatchError::UnknownVocabulary(unknown.join(", ")));
        }
        if resolved.is_empty() {
            return Err(MatchError::Validation("no vocabulary specified".into()));
        }
        Ok(resolved)
    }

    /// Resolve a list of names; see [`resolve`](Self::resolve).
    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<Vocabulary>>> {
        let joined: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        self.resolve(&joined.join(","))
    }

    /// Compile every registered vocabulary. Vocabularies are independent and
    /// compile in parallel when the `parallel` feature is on.
    pub fn compile_all(&self) -> Vec<(String, Result<CompileOutcome>)> {
        let vocabularies = self.all();
        info!(vocabularies = vocabularies.len(), "Compiling all vocabularies");

        #[cfg(feature = "parallel")]
        let iter = vocabularies.par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = vocabularies.iter();

        iter.map(|v| (v.name().to_string(), v.compile())).collect()
    }
}
