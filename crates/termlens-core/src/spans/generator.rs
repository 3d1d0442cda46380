use std::collections::BTreeMap;
use std::fmt;

use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};

use super::stopwords::{is_stopword, TermStopwords};
use super::tokenizer::{tokenize, Token};
use crate::error::{MatchError, Result};

/// Character range of a span, end-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpanRange {
    pub begin: usize,
    pub end: usize,
}

/// A literal substring of the input with its character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSpan {
    pub text: String,
    pub begin: usize,
    pub end: usize,
}

/// Query string → every range it was produced from, in enumeration order.
pub type QueryOccurrences = BTreeMap<String, Vec<SpanRange>>;

/// Pre-scoring transforms, each independently togglable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanOptions {
    /// Lowercase the query string
    pub case_insensitive: bool,
    /// Replace `-` with a space
    pub replace_hyphen: bool,
    /// Replace each token by its English stem, keeping separators
    pub stemming: bool,
}

/// Enumerates candidate spans within a `[min_tokens, max_tokens]` window.
pub struct SpanGenerator {
    min_tokens: usize,
    max_tokens: usize,
    options: SpanOptions,
    term_stopwords: Option<TermStopwords>,
    stemmer: Option<Stemmer>,
}

impl fmt::Debug for SpanGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanGenerator")
            .field("min_tokens", &self.min_tokens)
            .field("max_tokens", &self.max_tokens)
            .field("options", &self.options)
            .field("term_stopwords", &self.term_stopwords.is_some())
            .finish()
    }
}

impl SpanGenerator {
    /// Window must satisfy `1 <= min_tokens <= max_tokens`.
    pub fn new(min_tokens: usize, max_tokens: usize) -> Result<Self> {
        if min_tokens == 0 {
            return Err(MatchError::Validation("min_tokens must be at least 1".into()));
        }
        if min_tokens > max_tokens {
            return Err(MatchError::Validation(format!(
                "min_tokens ({min_tokens}) exceeds max_tokens ({max_tokens})"
            )));
        }
        Ok(Self {
            min_tokens,
            max_tokens,
            options: SpanOptions::default(),
            term_stopwords: None,
            stemmer: None,
        })
    }

    pub fn with_options(mut self, options: SpanOptions) -> Self {
        self.stemmer = options
            .stemming
            .then(|| Stemmer::create(Algorithm::English));
        self.options = options;
        self
    }

    /// Also discard spans rejected by vocabulary-derived stop words.
    pub fn with_term_stopwords(mut self, stopwords: TermStopwords) -> Self {
        self.term_stopwords = Some(stopwords);
        self
    }

    pub fn options(&self) -> SpanOptions {
        self.options
    }

    /// Every kept span, shorter windows first, then by start token.
    pub fn enumerate(&self, text: &str) -> Vec<CandidateSpan> {
        let tokens = tokenize(text);
        self.windows(tokens.len())
            .filter_map(|(first, last)| {
                let raw = slice(text, &tokens[first], &tokens[last]);
                self.keep(raw).then(|| CandidateSpan {
                    text: raw.to_string(),
                    begin: tokens[first].begin,
                    end: tokens[last].end,
                })
            })
            .collect()
    }

    /// Transformed query strings with every range they occurred at.
    ///
    /// Stop rules are checked on the raw span. Stemming runs per token
    /// before case folding and hyphen replacement.
    pub fn collect_queries(&self, text: &str) -> QueryOccurrences {
        let tokens = tokenize(text);
        let mut queries = QueryOccurrences::new();

        for (first, last) in self.windows(tokens.len()) {
            let raw = slice(text, &tokens[first], &tokens[last]);
            if !self.keep(raw) {
                continue;
            }

            let mut query = match &self.stemmer {
                Some(stemmer) => stem_tokens(stemmer, text, &tokens[first..=last]),
                None => raw.to_string(),
            };
            if self.options.case_insensitive {
                query = query.to_lowercase();
            }
            if self.options.replace_hyphen {
                query = query.replace('-', " ");
            }

            queries.entry(query).or_default().push(SpanRange {
                begin: tokens[first].begin,
                end: tokens[last].end,
            });
        }

        queries
    }

    fn keep(&self, raw: &str) -> bool {
        if is_stopword(raw) {
            return false;
        }
        !self
            .term_stopwords
            .as_ref()
            .is_some_and(|stop| stop.rejects(raw))
    }

    /// `(first, last)` token indices of every window, inclusive.
    fn windows(&self, count: usize) -> impl Iterator<Item = (usize, usize)> {
        (self.min_tokens..=self.max_tokens)
            .flat_map(move |len| (0..(count + 1).saturating_sub(len)).map(move |i| (i, i + len - 1)))
    }
}

fn slice<'t>(text: &'t str, first: &Token, last: &Token) -> &'t str {
    &text[first.byte_begin..last.byte_end]
}

fn stem_tokens(stemmer: &Stemmer, text: &str, tokens: &[Token]) -> String {
    let mut query = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            query.push_str(&text[tokens[i - 1].byte_end..token.byte_begin]);
        }
        query.push_str(&stemmer.stem(token.text(text)));
    }
    query
}
