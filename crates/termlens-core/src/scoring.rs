//! Query-to-entry similarity scoring
//!
//! Scores combine three string pairs: surface (query vs label), typographic
//! (norm1 vs norm1) and morphosyntactic (norm2 vs norm2). When either norm2
//! form is present the norm2 component weighs 10 against 1 + 1.

#![allow(clippy::cast_precision_loss)]

use std::collections::HashSet;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::ngram::Measure;

/// Weight of the norm2 component in the combined score.
const NORM2_WEIGHT: f64 = 10.0;

/// Unigram share of the cosine blend used for Japanese.
const UNIGRAM_WEIGHT: f64 = 0.7;
const BIGRAM_WEIGHT: f64 = 0.3;

/// Per-vocabulary language profile.
///
/// Selects the index n-gram order, the retrieval measure, the scoring
/// function and the normalizer names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageProfile {
    #[default]
    Default,
    Korean,
    Japanese,
}

impl LanguageProfile {
    /// Resolve a vocabulary language code (`kor`, `jpn`, anything else).
    pub fn from_language(language: Option<&str>) -> Self {
        match language {
            Some("kor") => LanguageProfile::Korean,
            Some("jpn") => LanguageProfile::Japanese,
            _ => LanguageProfile::Default,
        }
    }

    /// N-gram order of the approximate index.
    pub fn ngram_order(self) -> usize {
        match self {
            LanguageProfile::Default => 3,
            LanguageProfile::Korean => 2,
            LanguageProfile::Japanese => 1,
        }
    }

    /// Measure used when retrieving from the approximate index.
    pub fn measure(self) -> Measure {
        match self {
            LanguageProfile::Default => Measure::Jaccard,
            LanguageProfile::Korean | LanguageProfile::Japanese => Measure::Cosine,
        }
    }

    fn normalizer_suffix(self) -> &'static str {
        match self {
            LanguageProfile::Default => "",
            LanguageProfile::Korean => "_ko",
            LanguageProfile::Japanese => "_ja",
        }
    }

    /// Name of the typographic normalizer profile.
    pub fn normalizer1(self) -> String {
        format!("normalizer1{}", self.normalizer_suffix())
    }

    /// Name of the typographic + morphosyntactic normalizer profile.
    pub fn normalizer2(self) -> String {
        format!("normalizer2{}", self.normalizer_suffix())
    }
}

/// A string together with its two normalized forms.
#[derive(Debug, Clone, Copy)]
pub struct Forms<'a> {
    pub surface: &'a str,
    pub norm1: &'a str,
    pub norm2: &'a str,
}

impl<'a> Forms<'a> {
    pub fn new(surface: &'a str, norm1: &'a str, norm2: &'a str) -> Self {
        Self {
            surface,
            norm1,
            norm2,
        }
    }
}

/// Score a query against an entry under `profile`, in [0, 1].
pub fn score(query: Forms<'_>, entry: Forms<'_>, profile: LanguageProfile) -> f64 {
    let value = match profile {
        LanguageProfile::Default => combined(query, entry, circular_trigrams),
        LanguageProfile::Korean => combined(query, entry, circular_bigrams),
        LanguageProfile::Japanese => {
            UNIGRAM_WEIGHT * cosine(query.surface, entry.surface, 1)
                + BIGRAM_WEIGHT * cosine(query.surface, entry.surface, 2)
        }
    };
    debug_assert!(
        (0.0..=1.0 + 1e-9).contains(&value),
        "score out of range: {value}"
    );
    value.min(1.0)
}

/// Score for a hit found by exact literal lookup; no n-grams are computed.
#[inline]
pub fn exact_score() -> f64 {
    1.0
}

fn combined(query: Forms<'_>, entry: Forms<'_>, grams: fn(&str) -> HashSet<String>) -> f64 {
    let surface = jaccard(&grams(query.surface), &grams(entry.surface));
    let norm1 = jaccard(&grams(query.norm1), &grams(entry.norm1));

    if query.norm2.is_empty() && entry.norm2.is_empty() {
        (surface + norm1) / 2.0
    } else {
        let norm2 = jaccard(&grams(query.norm2), &grams(entry.norm2));
        (surface + norm1 + NORM2_WEIGHT * norm2) / (2.0 + NORM2_WEIGHT)
    }
}

/// Jaccard similarity `|A ∩ B| / |A ∪ B|`; 0.0 when either set is empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Circular character trigrams: the last character is prepended and the
/// first appended before windowing, so every non-empty string yields as
/// many trigrams as it has characters.
pub fn circular_trigrams(text: &str) -> HashSet<String> {
    let chars: Vec<char> = text.chars().collect();
    let (Some(&first), Some(&last)) = (chars.first(), chars.last()) else {
        return HashSet::new();
    };

    let mut wrapped = Vec::with_capacity(chars.len() + 2);
    wrapped.push(last);
    wrapped.extend_from_slice(&chars);
    wrapped.push(first);

    wrapped.windows(3).map(|w| w.iter().collect()).collect()
}

/// Circular character bigrams: the first character is appended before
/// windowing.
pub fn circular_bigrams(text: &str) -> HashSet<String> {
    let chars: Vec<char> = text.chars().collect();
    let Some(&first) = chars.first() else {
        return HashSet::new();
    };

    let mut wrapped = chars.clone();
    wrapped.push(first);

    wrapped.windows(2).map(|w| w.iter().collect()).collect()
}

/// Cosine similarity of plain (non-circular) n-gram count vectors.
pub fn cosine(a: &str, b: &str, n: usize) -> f64 {
    let va = gram_counts(a, n);
    let vb = gram_counts(b, n);
    if va.is_empty() || vb.is_empty() {
        return 0.0;
    }

    let dot: f64 = va
        .iter()
        .filter_map(|(gram, &ca)| vb.get(gram).map(|&cb| (ca * cb) as f64))
        .sum();
    let norm_a: f64 = va.values().map(|&c| (c * c) as f64).sum::<f64>().sqrt();
    let norm_b: f64 = vb.values().map(|&c| (c * c) as f64).sum::<f64>().sqrt();

    dot / (norm_a * norm_b)
}

fn gram_counts(text: &str, n: usize) -> AHashMap<String, usize> {
    let chars: Vec<char> = text.chars().collect();
    let mut counts = AHashMap::new();
    if chars.len() < n {
        return counts;
    }
    for window in chars.windows(n) {
        *counts.entry(window.iter().collect::<String>()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forms(s: &str) -> Forms<'_> {
        Forms::new(s, s, s)
    }

    #[test]
    fn identical_strings_score_one() {
        for s in ["a", "ab", "aspirin", "NF-kappa B"] {
            let grams = circular_trigrams(s);
            assert_eq!(jaccard(&grams, &grams), 1.0);
            assert!((score(forms(s), forms(s), LanguageProfile::Default) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn disjoint_alphabets_score_zero() {
        let a = circular_trigrams("abcabc");
        let b = circular_trigrams("xyzxyz");
        assert_eq!(jaccard(&a, &b), 0.0);
    }

    #[test]
    fn empty_set_jaccard_is_zero() {
        assert_eq!(jaccard(&HashSet::new(), &circular_trigrams("abc")), 0.0);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn circular_trigrams_of_short_strings() {
        // "a" → "aaa"
        assert_eq!(circular_trigrams("a").len(), 1);
        // "ab" wraps to "baba"
        let grams = circular_trigrams("ab");
        assert!(grams.contains("bab"));
        assert!(grams.contains("aba"));
        assert!(circular_trigrams("").is_empty());
    }

    #[test]
    fn circular_bigrams_wrap_head() {
        let grams = circular_bigrams("abc");
        assert_eq!(grams.len(), 3);
        assert!(grams.contains("ca"));
    }

    #[test]
    fn norm2_dominates_when_present() {
        let query = Forms::new("xyz", "xyz", "kinase");
        let entry = Forms::new("abc", "abc", "kinase");
        let s = score(query, entry, LanguageProfile::Default);
        assert!((s - 10.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn unweighted_mean_without_norm2() {
        let query = Forms::new("abc", "xyz", "");
        let entry = Forms::new("abc", "uvw", "");
        let s = score(query, entry, LanguageProfile::Default);
        assert!((s - 0.5).abs() < 1e-12);
    }

    #[test]
    fn japanese_blend_ignores_normalized_forms() {
        let query = Forms::new("東京", "zzz", "zzz");
        let entry = Forms::new("東京", "yyy", "yyy");
        let s = score(query, entry, LanguageProfile::Japanese);
        assert!((s - 1.0).abs() < 1e-12);

        // single characters have no bigrams: only the unigram share remains
        let s = score(Forms::new("東", "", ""), Forms::new("東", "", ""), LanguageProfile::Japanese);
        assert!((s - 0.7).abs() < 1e-12);
    }

    #[test]
    fn korean_uses_bigrams() {
        let query = Forms::new("서울", "서울", "서울");
        let entry = Forms::new("서울시", "서울시", "서울시");
        let s = score(query, entry, LanguageProfile::Korean);
        assert!(s > 0.0 && s < 1.0);
    }

    #[test]
    fn profile_from_language() {
        assert_eq!(LanguageProfile::from_language(Some("kor")), LanguageProfile::Korean);
        assert_eq!(LanguageProfile::from_language(Some("jpn")), LanguageProfile::Japanese);
        assert_eq!(LanguageProfile::from_language(Some("eng")), LanguageProfile::Default);
        assert_eq!(LanguageProfile::from_language(None), LanguageProfile::Default);
        assert_eq!(LanguageProfile::Korean.normalizer2(), "normalizer2_ko");
        assert_eq!(LanguageProfile::Default.normalizer1(), "normalizer1");
        assert_eq!(LanguageProfile::Japanese.ngram_order(), 1);
    }
}
