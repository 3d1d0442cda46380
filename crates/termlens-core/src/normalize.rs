//! Normalization collaborator
//!
//! The matcher treats normalization as a fallible call
//! `normalize(text, profile) -> String`. Profiles are named
//! `normalizer1<suffix>` (typographic) and `normalizer2<suffix>`
//! (typographic + morphosyntactic), see [`LanguageProfile`](crate::scoring::LanguageProfile).

use ahash::AHashMap;
use parking_lot::Mutex;
use rust_stemmers::{Algorithm, Stemmer};
use thiserror::Error;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Errors from a normalization backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// Backend unreachable or profile not supported
    #[error("{0}")]
    Unavailable(String),

    /// Nothing to normalize
    #[error("empty input")]
    EmptyInput,
}

/// A normalization backend.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, text: &str, profile: &str) -> Result<String, NormalizeError>;
}

impl<N: Normalizer + ?Sized> Normalizer for std::sync::Arc<N> {
    fn normalize(&self, text: &str, profile: &str) -> Result<String, NormalizeError> {
        (**self).normalize(text, profile)
    }
}

/// English function words dropped by the morphosyntactic profile.
const FUNCTION_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is", "it",
    "of", "on", "or", "that", "the", "to", "was", "were", "with",
];

/// In-process normalizer.
///
/// `normalizer1`: NFKD, combining marks removed, lowercased, split on
/// non-alphanumerics and rejoined without separator.
/// `normalizer2`: as `normalizer1` but function words are dropped and each
/// token is stemmed before joining.
/// `_ko` / `_ja` profiles use NFKC folding with whitespace removed; they do
/// not stem.
pub struct BasicNormalizer {
    stemmer: Stemmer,
}

impl Default for BasicNormalizer {
    fn default() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }
}

impl std::fmt::Debug for BasicNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicNormalizer").finish_non_exhaustive()
    }
}

impl BasicNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn fold_latin(text: &str) -> String {
        text.nfkd()
            .filter(|c| !is_combining_mark(*c))
            .flat_map(char::to_lowercase)
            .collect()
    }

    fn fold_cjk(text: &str) -> String {
        text.nfkc()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect()
    }

    fn tokens(folded: &str) -> impl Iterator<Item = &str> {
        folded
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
    }
}

impl Normalizer for BasicNormalizer {
    fn normalize(&self, text: &str, profile: &str) -> Result<String, NormalizeError> {
        if text.trim().is_empty() {
            return Err(NormalizeError::EmptyInput);
        }

        match profile {
            "normalizer1" => Ok(Self::tokens(&Self::fold_latin(text)).collect()),
            "normalizer2" => {
                let folded = Self::fold_latin(text);
                Ok(Self::tokens(&folded)
                    .filter(|t| !FUNCTION_WORDS.contains(t))
                    .map(|t| self.stemmer.stem(t).into_owned())
                    .collect())
            }
            "normalizer1_ko" | "normalizer2_ko" | "normalizer1_ja" | "normalizer2_ja" => {
                Ok(Self::fold_cjk(text))
            }
            other => Err(NormalizeError::Unavailable(format!(
                "unsupported normalizer profile '{other}'"
            ))),
        }
    }
}

/// Memoizes another normalizer per `(profile, text)`.
///
/// Meant to live for one query so duplicate spans hit the backend once.
/// Failures are cached too.
pub struct CachingNormalizer<'a> {
    inner: &'a dyn Normalizer,
    cache: Mutex<AHashMap<(String, String), Result<String, NormalizeError>>>,
}

impl<'a> CachingNormalizer<'a> {
    pub fn new(inner: &'a dyn Normalizer) -> Self {
        Self {
            inner,
            cache: Mutex::new(AHashMap::new()),
        }
    }

    /// Number of distinct `(profile, text)` pairs seen.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl Normalizer for CachingNormalizer<'_> {
    fn normalize(&self, text: &str, profile: &str) -> Result<String, NormalizeError> {
        let key = (profile.to_string(), text.to_string());
        if let Some(hit) = self.cache.lock().get(&key) {
            return hit.clone();
        }
        let result = self.inner.normalize(text, profile);
        self.cache.lock().insert(key, result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn normalizer1_folds_case_and_punctuation() {
        let n = BasicNormalizer::new();
        assert_eq!(n.normalize("NF-kappa B", "normalizer1").unwrap(), "nfkappab");
        assert_eq!(n.normalize("NF-kappaB", "normalizer1").unwrap(), "nfkappab");
        assert_eq!(n.normalize("Café", "normalizer1").unwrap(), "cafe");
    }

    #[test]
    fn normalizer2_stems_and_drops_function_words() {
        let n = BasicNormalizer::new();
        assert_eq!(
            n.normalize("regulation of kinases", "normalizer2").unwrap(),
            n.normalize("regulation kinase", "normalizer2").unwrap()
        );
    }

    #[test]
    fn empty_input_is_an_error() {
        let n = BasicNormalizer::new();
        assert_eq!(n.normalize("  ", "normalizer1"), Err(NormalizeError::EmptyInput));
    }

    #[test]
    fn unknown_profile_is_unavailable() {
        let n = BasicNormalizer::new();
        assert!(matches!(
            n.normalize("x", "normalizer9"),
            Err(NormalizeError::Unavailable(_))
        ));
    }

    struct Counting(AtomicUsize);

    impl Normalizer for Counting {
        fn normalize(&self, text: &str, _profile: &str) -> Result<String, NormalizeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(text.to_lowercase())
        }
    }

    #[test]
    fn caching_normalizer_calls_backend_once_per_input() {
        let backend = Counting(AtomicUsize::new(0));
        let cached = CachingNormalizer::new(&backend);
        for _ in 0..3 {
            assert_eq!(cached.normalize("Aspirin", "normalizer1").unwrap(), "aspirin");
        }
        cached.normalize("Aspirin", "normalizer2").unwrap();
        assert_eq!(backend.0.load(Ordering::SeqCst), 2);
        assert_eq!(cached.len(), 2);
    }
}
