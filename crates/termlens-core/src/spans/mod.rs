//! Candidate span generation
//!
//! Turns raw text into the bounded set of multi-token substrings worth
//! querying. Spans are enumerated per token-length window, filtered by the
//! stop rules, optionally transformed (stemming, case folding, hyphen
//! replacement) and deduplicated with every offset occurrence kept.
//!
//! # Example
//!
//! ```rust
//! use termlens_core::spans::SpanGenerator;
//!
//! let generator = SpanGenerator::new(1, 2).unwrap();
//! let spans: Vec<String> = generator
//!     .enumerate("the cat sat")
//!     .into_iter()
//!     .map(|s| s.text)
//!     .collect();
//! assert_eq!(spans, vec!["cat", "sat", "cat sat"]);
//! ```

mod generator;
mod stopwords;
mod tokenizer;

pub use generator::{CandidateSpan, QueryOccurrences, SpanGenerator, SpanOptions, SpanRange};
pub use stopwords::{
    is_stopword, TermStopwords, NO_BEGIN_WORDS, NO_END_WORDS, NO_TERM_WORDS, STOP_TERMS,
};
pub use tokenizer::{tokenize, Token};
