//! Approximate N-gram Index
//!
//! Stores normalized strings as character n-gram feature sets and answers
//! "which stored strings are at least this similar to the query" without
//! scoring every stored string.
//!
//! # Example
//!
//! ```rust
//! use termlens_core::ngram::{Measure, NgramIndex};
//!
//! let index = NgramIndex::build(
//!     3,
//!     vec![("nfkappab".to_string(), "G1"), ("interleukin".to_string(), "G2")],
//! );
//! let hits = index.retrieve("nfkappab", Measure::Jaccard, 0.6).unwrap();
//! assert_eq!(hits, vec!["nfkappab"]);
//! assert_eq!(index.payloads(hits[0]), &["G1"]);
//! ```

mod features;
mod index;
mod measure;

pub use features::extract_features;
pub use index::{IndexStats, NgramIndex, Strategy};
pub use measure::{validate_threshold, Measure};
