//! JSON request and response types of the query surface.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use termlens_core::{
    AnnotationResult, CompileReport, EntryCounts, LabelRef, Ranking, SpanOptions, TermHit,
};

/// Annotate free text with one or more vocabularies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotateRequest {
    pub text: String,
    pub vocabularies: Vec<String>,
    #[serde(default)]
    pub min_tokens: Option<usize>,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub ranking: Option<Ranking>,
    #[serde(default)]
    pub spans: SpanOptions,
}

/// One annotation in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Denotation {
    pub begin: usize,
    pub end: usize,
    pub identifier: String,
    pub dictionary: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl From<AnnotationResult> for Denotation {
    fn from(result: AnnotationResult) -> Self {
        Self {
            begin: result.begin,
            end: result.end,
            identifier: result.identifier,
            dictionary: result.vocabulary,
            score: result.score,
            tags: result.tags,
        }
    }
}

/// Denotations sorted by `begin`, then descending `score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotateResponse {
    pub denotations: Vec<Denotation>,
}

/// Look terms up directly, without span generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdLookupRequest {
    pub terms: Vec<String>,
    /// Empty means every loaded vocabulary
    #[serde(default)]
    pub dictionaries: Vec<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub ranking: Option<Ranking>,
    /// Return full entry records instead of identifiers
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_true")]
    pub use_index: bool,
}

fn default_true() -> bool {
    true
}

/// Each input term mapped to its identifiers or, when verbose, its hits.
///
/// Untagged: `Ids` is tried first, so a payload whose lists are all empty
/// reads back as `Ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdLookupResponse {
    Ids(BTreeMap<String, Vec<String>>),
    Verbose(BTreeMap<String, Vec<TermHit>>),
}

/// Labels known for a set of identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindLabelsRequest {
    pub ids: Vec<String>,
    #[serde(default)]
    pub dictionaries: Vec<String>,
}

pub type FindLabelsResponse = BTreeMap<String, Vec<LabelRef>>;

/// Result of compiling one vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompileStatus {
    Compiled(CompileReport),
    AlreadyRunning { vocabulary: String },
    /// Entries were emptied mid-compile; nothing was installed
    Discarded { vocabulary: String },
    Failed { vocabulary: String, error: String },
}

/// Per-vocabulary figures in [`ServiceStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyStats {
    pub name: String,
    pub counts: EntryCounts,
    pub generation: u64,
    pub compilable: bool,
    /// Index hash of the installed snapshot, if compiled
    pub index_hash: Option<String>,
    pub keys: usize,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub queries_served: u64,
    pub avg_query_time_us: u64,
    pub uptime_secs: u64,
    pub vocabularies: Vec<VocabularyStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub version: String,
    pub vocabularies: usize,
    /// Vocabularies whose index must be recompiled
    pub unavailable: Vec<String>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn annotate_request_defaults() {
        let req: AnnotateRequest =
            serde_json::from_str(r#"{"text": "aspirin", "vocabularies": ["drugs"]}"#).unwrap();
        assert_eq!(req.ranking, None);
        assert_eq!(req.spans, SpanOptions::default());
        assert!(req.tags.is_empty());
    }

    #[test]
    fn ranking_uses_snake_case() {
        let req: IdLookupRequest = serde_json::from_str(
            r#"{"terms": ["aspirin"], "ranking": "all_above_threshold"}"#,
        )
        .unwrap();
        assert_eq!(req.ranking, Some(Ranking::AllAboveThreshold));
        assert!(req.use_index);
        assert!(!req.verbose);
    }

    #[test]
    fn denotation_omits_empty_tags() {
        let d = Denotation {
            begin: 0,
            end: 7,
            identifier: "D001".into(),
            dictionary: "drugs".into(),
            score: 1.0,
            tags: Vec::new(),
        };
        assert_eq!(
            serde_json::to_string(&d).unwrap(),
            r#"{"begin":0,"end":7,"identifier":"D001","dictionary":"drugs","score":1.0}"#
        );
    }

    #[test]
    fn compile_status_is_tagged() {
        let status = CompileStatus::AlreadyRunning {
            vocabulary: "drugs".into(),
        };
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            r#"{"status":"already_running","vocabulary":"drugs"}"#
        );
    }

    #[test]
    fn empty_lookup_lists_read_back_as_ids() {
        let plain: IdLookupResponse =
            serde_json::from_str(r#"{"aspirin": [], "warfarin": []}"#).unwrap();
        let expected: BTreeMap<String, Vec<String>> = [
            ("aspirin".to_string(), Vec::new()),
            ("warfarin".to_string(), Vec::new()),
        ]
        .into_iter()
        .collect();
        assert_eq!(plain, IdLookupResponse::Ids(expected));

        let ids: IdLookupResponse = serde_json::from_str(r#"{"aspirin": ["D001"]}"#).unwrap();
        assert!(matches!(ids, IdLookupResponse::Ids(_)));

        let verbose: IdLookupResponse = serde_json::from_str(
            r#"{"aspirin": [{"label": "aspirin", "identifier": "D001", "vocabulary": "drugs",
                "score": 1.0, "norm1": "aspirin", "norm2": "aspirin"}]}"#,
        )
        .unwrap();
        match verbose {
            IdLookupResponse::Verbose(hits) => assert_eq!(hits["aspirin"][0].identifier, "D001"),
            other => panic!("expected verbose response, got {other:?}"),
        }
    }
}
