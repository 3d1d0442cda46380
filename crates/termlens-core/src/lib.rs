//! termlens core engine
//!
//! Finds occurrences of curated vocabulary terms in free text, exactly or
//! approximately, and lets curators decide which terms are searchable.
//!
//! - [`ngram`] - approximate n-gram index with CPMerge retrieval
//! - [`spans`] - candidate span generation over raw text
//! - [`scoring`] - query/entry similarity scores per language profile
//! - [`vocabulary`] - entries, curation lifecycle, compile and artifacts
//! - [`matcher`] - multi-vocabulary matching, ranking and lookups
//!
//! # Features
//!
//! - `parallel` (default) - parallel feature extraction and multi-vocabulary
//!   compile via rayon
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use termlens_core::{BasicNormalizer, MatchOptions, Vocabulary, VocabularyConfig, VocabularyMatcher};
//!
//! let normalizer = BasicNormalizer::new();
//! let vocab = Vocabulary::new("drugs", VocabularyConfig::default()).unwrap();
//! vocab.create_entry("aspirin", "D001", Vec::<String>::new(), &normalizer).unwrap();
//! vocab.compile().unwrap();
//!
//! let matcher = VocabularyMatcher::new(&normalizer);
//! let found = matcher
//!     .match_text("Take aspirin daily", &[Arc::new(vocab)], &MatchOptions::default())
//!     .unwrap();
//! assert_eq!(found[0].identifier, "D001");
//! assert_eq!((found[0].begin, found[0].end), (5, 12));
//! ```

pub mod error;
pub mod matcher;
pub mod ngram;
pub mod normalize;
pub mod registry;
pub mod scoring;
pub mod spans;
pub mod vocabulary;

// Re-export main types at crate root
pub use error::{MatchError, Result};
pub use matcher::{
    identifiers, AnnotationResult, LabelRef, LookupOptions, MatchOptions, Ranking, TermHit,
    VocabularyMatcher,
};
pub use ngram::{Measure, NgramIndex};
pub use normalize::{BasicNormalizer, CachingNormalizer, NormalizeError, Normalizer};
pub use registry::VocabularyRegistry;
pub use scoring::LanguageProfile;
pub use spans::{CandidateSpan, SpanGenerator, SpanOptions};
pub use vocabulary::{
    parse_entry_line, CompileOutcome, CompileReport, Entry, EntryCounts, EntryId, EntryMode,
    EntryStore, MemoryEntryStore, RawEntry, Synonym, SynonymExpander, UndoOutcome, Vocabulary,
    VocabularyConfig,
};
