//! End-to-end query orchestration across vocabularies
//!
//! Spans from the generator are looked up in every vocabulary's compiled
//! snapshot, refined by the scoring engine, merged, ranked and expanded
//! back to every offset they occurred at.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MatchError, Result};
use crate::ngram::validate_threshold;
use crate::normalize::{CachingNormalizer, Normalizer};
use crate::scoring::{exact_score, score, Forms};
use crate::spans::{SpanGenerator, SpanOptions, TermStopwords};
use crate::vocabulary::{EntryId, EntryMode, IndexSnapshot, IndexedEntry, Vocabulary};

/// Scores closer than this are treated as tied.
const TIE_EPSILON: f64 = 1e-9;

/// Which hits survive for one query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    /// Every hit that passed its vocabulary's threshold
    AllAboveThreshold,
    /// Only hits at the maximum score; ties are all kept
    #[default]
    TopOnly,
}

/// Options for [`VocabularyMatcher::match_text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Defaults to the smallest `min_tokens` of the vocabularies
    pub min_tokens: Option<usize>,
    /// Defaults to the largest `max_tokens` of the vocabularies
    pub max_tokens: Option<usize>,
    /// Overrides every vocabulary's own threshold
    pub threshold: Option<f64>,
    /// Entries must carry at least one of these
    pub tags: BTreeSet<String>,
    pub ranking: Ranking,
    pub spans: SpanOptions,
    /// Skip spans whose normalization fails instead of failing the call
    pub partial_degradation: bool,
    /// Apply vocabulary-derived no-term / no-begin / no-end words
    pub use_vocabulary_stopwords: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            min_tokens: None,
            max_tokens: None,
            threshold: None,
            tags: BTreeSet::new(),
            ranking: Ranking::default(),
            spans: SpanOptions::default(),
            partial_degradation: false,
            use_vocabulary_stopwords: true,
        }
    }
}

/// One located annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationResult {
    /// Character offset, inclusive
    pub begin: usize,
    /// Character offset, exclusive
    pub end: usize,
    /// The query string the span produced after transforms
    pub query: String,
    /// Label of the matched entry
    pub matched_string: String,
    pub identifier: String,
    pub vocabulary: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// An entry that matched a term, before offset expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermHit {
    pub label: String,
    pub identifier: String,
    pub vocabulary: String,
    pub score: f64,
    pub norm1: String,
    pub norm2: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TermHit {
    fn from_entry(entry: &IndexedEntry, vocabulary: &str, score: f64) -> Self {
        Self {
            label: entry.label.clone(),
            identifier: entry.identifier.clone(),
            vocabulary: vocabulary.to_string(),
            score,
            norm1: entry.norm1.clone(),
            norm2: entry.norm2.clone(),
            tags: entry.tags.iter().cloned().collect(),
        }
    }

    fn cmp_rank(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.vocabulary.cmp(&other.vocabulary))
            .then_with(|| self.identifier.cmp(&other.identifier))
            .then_with(|| self.label.cmp(&other.label))
    }
}

/// Options for [`VocabularyMatcher::lookup_ids`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupOptions {
    pub threshold: Option<f64>,
    pub tags: BTreeSet<String>,
    pub ranking: Ranking,
    /// Without the index, approximate mode only finds entries whose norm2
    /// equals the term's norm2
    pub use_index: bool,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            threshold: None,
            tags: BTreeSet::new(),
            ranking: Ranking::default(),
            use_index: true,
        }
    }
}

/// A label known for an identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelRef {
    pub label: String,
    pub dictionary: String,
}

/// Distinct identifiers of `hits`, in hit order.
pub fn identifiers(hits: &[TermHit]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    hits.iter()
        .filter(|hit| seen.insert(hit.identifier.as_str()))
        .map(|hit| hit.identifier.clone())
        .collect()
}

struct SearchParams<'a> {
    threshold: f64,
    tags: &'a BTreeSet<String>,
    use_index: bool,
}

/// Runs queries against compiled vocabulary snapshots.
pub struct VocabularyMatcher<'n> {
    normalizer: &'n dyn Normalizer,
}

impl<'n> VocabularyMatcher<'n> {
    pub fn new(normalizer: &'n dyn Normalizer) -> Self {
        Self { normalizer }
    }

    /// Annotate `text` with entries of `vocabularies`.
    ///
    /// Results are ordered by `begin`, then descending `score`, then `end`,
    /// vocabulary, identifier and label. Vocabularies that were never
    /// compiled contribute nothing.
    pub fn match_text(
        &self,
        text: &str,
        vocabularies: &[Arc<Vocabulary>],
        options: &MatchOptions,
    ) -> Result<Vec<AnnotationResult>> {
        if let Some(threshold) = options.threshold {
            validate_threshold(threshold)?;
        }
        let compiled = compiled_snapshots(vocabularies)?;
        if text.trim().is_empty() || compiled.is_empty() {
            return Ok(Vec::new());
        }

        let min_tokens = options
            .min_tokens
            .or_else(|| compiled.iter().map(|(v, _)| v.config().min_tokens).min())
            .unwrap_or(1);
        let max_tokens = options
            .max_tokens
            .or_else(|| compiled.iter().map(|(v, _)| v.config().max_tokens).max())
            .unwrap_or(min_tokens);

        let mut generator = SpanGenerator::new(min_tokens, max_tokens)?.with_options(options.spans);
        if options.use_vocabulary_stopwords {
            let stopwords = TermStopwords::intersect(compiled.iter().map(|(_, s)| s.stopwords()));
            generator = generator.with_term_stopwords(stopwords);
        }

        let queries = generator.collect_queries(text);
        let normalizer = CachingNormalizer::new(self.normalizer);
        let mut results = Vec::new();

        'queries: for (query, ranges) in &queries {
            let mut hits = Vec::new();
            for (vocabulary, snapshot) in &compiled {
                let params = SearchParams {
                    threshold: options.threshold.unwrap_or(vocabulary.config().threshold),
                    tags: &options.tags,
                    use_index: true,
                };
                match search_term(&normalizer, snapshot, query, &params) {
                    Ok(found) => hits.extend(found),
                    Err(MatchError::NormalizationUnavailable(err)) if options.partial_degradation => {
                        warn!(query = %query, error = %err, "Normalization failed, span skipped");
                        continue 'queries;
                    }
                    Err(err) => return Err(err),
                }
            }

            for hit in rank(hits, options.ranking) {
                for range in ranges {
                    results.push(AnnotationResult {
                        begin: range.begin,
                        end: range.end,
                        query: query.clone(),
                        matched_string: hit.label.clone(),
                        identifier: hit.identifier.clone(),
                        vocabulary: hit.vocabulary.clone(),
                        score: hit.score,
                        tags: hit.tags.clone(),
                    });
                }
            }
        }

        results.sort_by(|a, b| {
            a.begin
                .cmp(&b.begin)
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| a.end.cmp(&b.end))
                .then_with(|| a.vocabulary.cmp(&b.vocabulary))
                .then_with(|| a.identifier.cmp(&b.identifier))
                .then_with(|| a.matched_string.cmp(&b.matched_string))
        });

        debug!(
            queries = queries.len(),
            normalized = normalizer.len(),
            annotations = results.len(),
            "Matched text"
        );
        Ok(results)
    }

    /// Look up each term directly, without span generation.
    ///
    /// Every input term maps to its ranked hits; terms without hits map to
    /// an empty list.
    pub fn lookup_ids(
        &self,
        terms: &[String],
        vocabularies: &[Arc<Vocabulary>],
        options: &LookupOptions,
    ) -> Result<BTreeMap<String, Vec<TermHit>>> {
        if let Some(threshold) = options.threshold {
            validate_threshold(threshold)?;
        }
        let compiled = compiled_snapshots(vocabularies)?;
        let normalizer = CachingNormalizer::new(self.normalizer);
        let mut out = BTreeMap::new();

        for term in terms {
            let query = term.trim();
            let mut hits = Vec::new();
            if !query.is_empty() {
                for (vocabulary, snapshot) in &compiled {
                    let params = SearchParams {
                        threshold: options.threshold.unwrap_or(vocabulary.config().threshold),
                        tags: &options.tags,
                        use_index: options.use_index,
                    };
                    hits.extend(search_term(&normalizer, snapshot, query, &params)?);
                }
            }
            out.insert(term.clone(), rank(hits, options.ranking));
        }

        Ok(out)
    }

    /// Labels of live, non-BLACK entries carrying each identifier.
    pub fn find_labels_by_ids(
        &self,
        ids: &[String],
        vocabularies: &[Arc<Vocabulary>],
    ) -> Result<BTreeMap<String, Vec<LabelRef>>> {
        let wanted: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
        let mut out: BTreeMap<String, Vec<LabelRef>> =
            ids.iter().map(|id| (id.clone(), Vec::new())).collect();

        for vocabulary in vocabularies {
            for entry in vocabulary.entries()? {
                if entry.mode == EntryMode::Black || !wanted.contains(entry.identifier.as_str()) {
                    continue;
                }
                if let Some(labels) = out.get_mut(&entry.identifier) {
                    labels.push(LabelRef {
                        label: entry.label,
                        dictionary: vocabulary.name().to_string(),
                    });
                }
            }
        }
        for labels in out.values_mut() {
            labels.sort();
            labels.dedup();
        }
        Ok(out)
    }
}

fn compiled_snapshots(
    vocabularies: &[Arc<Vocabulary>],
) -> Result<Vec<(&Arc<Vocabulary>, Arc<IndexSnapshot>)>> {
    let mut compiled = Vec::with_capacity(vocabularies.len());
    for vocabulary in vocabularies {
        if let Some(snapshot) = vocabulary.snapshot()? {
            compiled.push((vocabulary, snapshot));
        }
    }
    Ok(compiled)
}

/// Hits for one query string in one vocabulary snapshot.
fn search_term(
    normalizer: &dyn Normalizer,
    snapshot: &IndexSnapshot,
    query: &str,
    params: &SearchParams<'_>,
) -> Result<Vec<TermHit>> {
    if query.is_empty() || snapshot.entry_count() == 0 {
        return Ok(Vec::new());
    }
    let vocabulary = snapshot.vocabulary();

    if params.threshold >= 1.0 {
        return Ok(snapshot
            .by_label(query)
            .filter(|e| e.has_any_tag(params.tags))
            .map(|e| TermHit::from_entry(e, vocabulary, exact_score()))
            .collect());
    }

    let profile = snapshot.profile();
    let norm1 = normalizer.normalize(query, &profile.normalizer1())?;
    let norm2 = normalizer.normalize(query, &profile.normalizer2())?;

    let mut keys = if params.use_index {
        snapshot.retrieve(&norm2, params.threshold)?
    } else {
        Vec::new()
    };
    if keys.is_empty() {
        keys.push(norm2.as_str());
    }

    let mut candidates: BTreeMap<EntryId, &IndexedEntry> = BTreeMap::new();
    for key in keys {
        for entry in snapshot.active_for_norm2(key) {
            candidates.insert(entry.id, entry);
        }
    }
    for entry in snapshot.expanded_for_norm2(&norm2) {
        candidates.insert(entry.id, entry);
    }

    let query_forms = Forms::new(query, &norm1, &norm2);
    let mut hits: Vec<TermHit> = candidates
        .into_values()
        .filter(|e| e.has_any_tag(params.tags))
        .filter_map(|e| {
            let s = score(query_forms, Forms::new(&e.label, &e.norm1, &e.norm2), profile);
            (s >= params.threshold).then(|| TermHit::from_entry(e, vocabulary, s))
        })
        .collect();

    // Entries repeating a label and identifier collapse into one hit.
    hits.sort_by(TermHit::cmp_rank);
    let mut seen = BTreeSet::new();
    hits.retain(|h| seen.insert((h.label.clone(), h.identifier.clone())));
    Ok(hits)
}

/// Apply the ranking policy to the merged hits of one query string.
fn rank(mut hits: Vec<TermHit>, ranking: Ranking) -> Vec<TermHit> {
    hits.sort_by(TermHit::cmp_rank);
    if ranking == Ranking::TopOnly {
        if let Some(max) = hits.first().map(|h| h.score) {
            hits.retain(|h| h.score >= max - TIE_EPSILON);
        }
    }
    hits
}
