//! Span-level stop rules.
//!
//! Two layers: a fixed filter applied to every span ([`is_stopword`]) and
//! per-vocabulary word lists ([`TermStopwords`]) derived from which function
//! words the vocabulary's own labels use.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Spans equal (case-insensitively) to one of these are never queried.
pub const STOP_TERMS: &[&str] = &[
    "this", "that", "these", "those", "plus", "minus", "one", "two", "three", "and", "or", "but",
    "as", "at", "by", "from", "to", "in", "of", "with", "for", "an", "the", "not", "no", "can",
    "has", "have", "had", "am", "are", "is", "was", "were", "do", "does", "did", "we", "blocked",
    "regulated", "transformed", "clear", "early", "essential", "functional", "high", "multiple",
    "little", "partial", "unclear", "cytosolic", "secreting", "function", "per", "se", "set",
    "line", "lines", "run", "activator", "binding", "bp", "cell", "dna", "factor", "factors",
    "mitochondria", "mitochondrial", "mrna", "rna", "metabolite", "reduced", "regulation",
    "regulatory", "replication", "enzyme", "fragment", "fragments", "membrane", "type",
    "dna binding", "fold", "receptor",
];

const ARTICLE_PREFIXES: &[&str] = &["the ", "a ", "an "];

const BOUNDARY_PUNCTUATION: &[char] = &['-', '(', ')', ',', '.'];

/// Words a term never contains.
pub const NO_TERM_WORDS: &[&str] = &[
    "are", "am", "be", "was", "were", "do", "did", "does", "had", "has", "have", "what", "which",
    "when", "where", "who", "how", "if", "whether", "an", "the", "this", "that", "these", "those",
    "is", "it", "its", "we", "our", "us", "they", "their", "them", "there", "then", "i", "he",
    "she", "my", "me", "his", "him", "her", "will", "shall", "may", "can", "cannot", "would",
    "should", "might", "could", "ought", "each", "every", "many", "much", "very", "more", "most",
    "than", "such", "several", "some", "both", "even", "and", "or", "but", "neither", "nor",
    "not", "never", "also", "as", "well", "e.g",
];

/// Words a term never begins with, mostly prepositions.
pub const NO_BEGIN_WORDS: &[&str] = &[
    "a", "am", "an", "and", "are", "as", "about", "above", "across", "after", "against", "along",
    "amid", "among", "around", "at", "been", "before", "behind", "below", "beneath", "beside",
    "besides", "between", "beyond", "by", "concerning", "considering", "despite", "do", "except",
    "excepting", "excluding", "for", "from", "had", "has", "have", "i", "in", "inside", "into",
    "if", "is", "it", "like", "my", "me", "of", "off", "on", "onto", "regarding", "since",
    "through", "to", "toward", "towards", "under", "underneath", "unlike", "until", "upon",
    "versus", "via", "with", "within", "without", "during", "what", "which", "when", "where",
    "who", "how", "whether",
];

/// Words a term never ends with.
pub const NO_END_WORDS: &[&str] = NO_BEGIN_WORDS;

/// Fixed stop rule for a raw span.
///
/// True when the span is a stop term, at most one character long, starts
/// with an article, starts or ends with boundary punctuation, is purely
/// numeric, or is a digit followed by one letter.
pub fn is_stopword(span: &str) -> bool {
    let lower = span.to_lowercase();
    if STOP_TERMS.contains(&lower.as_str()) {
        return true;
    }
    if span.chars().count() <= 1 {
        return true;
    }
    if ARTICLE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return true;
    }
    if span.starts_with(BOUNDARY_PUNCTUATION) || span.ends_with(BOUNDARY_PUNCTUATION) {
        return true;
    }
    if span.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return true;
    }
    let mut chars = span.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(d), Some(l), None) if d.is_ascii_digit() && l.is_ascii_alphabetic()
    )
}

/// Vocabulary-derived stop words.
///
/// Starts from the fixed lists and removes every word the vocabulary's
/// labels actually use in that position, so a vocabulary containing
/// "Which" keeps spans with "which" searchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermStopwords {
    pub no_term: BTreeSet<String>,
    pub no_begin: BTreeSet<String>,
    pub no_end: BTreeSet<String>,
}

fn owned(words: &[&str]) -> BTreeSet<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

impl TermStopwords {
    /// The unreduced lists.
    pub fn full() -> Self {
        Self {
            no_term: owned(NO_TERM_WORDS),
            no_begin: owned(NO_BEGIN_WORDS),
            no_end: owned(NO_END_WORDS),
        }
    }

    /// Reduce the fixed lists by the words used in `labels`.
    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut stop = Self::full();
        for label in labels {
            let words: Vec<String> = label.to_lowercase().split_whitespace().map(str::to_string).collect();
            for word in &words {
                stop.no_term.remove(word);
            }
            if let Some(first) = words.first() {
                stop.no_begin.remove(first);
            }
            if let Some(last) = words.last() {
                stop.no_end.remove(last);
            }
        }
        stop
    }

    /// Words that are stop words for every input. No inputs yields empty lists.
    pub fn intersect<'a, I>(all: I) -> Self
    where
        I: IntoIterator<Item = &'a TermStopwords>,
    {
        let mut iter = all.into_iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };
        iter.fold(first.clone(), |acc, next| Self {
            no_term: acc.no_term.intersection(&next.no_term).cloned().collect(),
            no_begin: acc.no_begin.intersection(&next.no_begin).cloned().collect(),
            no_end: acc.no_end.intersection(&next.no_end).cloned().collect(),
        })
    }

    /// True when a raw span contains a no-term word, starts with a no-begin
    /// word or ends with a no-end word.
    pub fn rejects(&self, span: &str) -> bool {
        let lower = span.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();
        if words.iter().any(|w| self.no_term.contains(*w)) {
            return true;
        }
        let begins = words.first().is_some_and(|w| self.no_begin.contains(*w));
        let ends = words.last().is_some_and(|w| self.no_end.contains(*w));
        begins || ends
    }

    pub fn is_empty(&self) -> bool {
        self.no_term.is_empty() && self.no_begin.is_empty() && self.no_end.is_empty()
    }
}
