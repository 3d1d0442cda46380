//! Annotation service over a registry of vocabularies

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use termlens_core::{
    identifiers, CompileOutcome, LookupOptions, MatchError, MatchOptions, Normalizer, Vocabulary,
    VocabularyMatcher, VocabularyRegistry,
};
use tracing::{debug, info, warn};

use crate::api::{
    AnnotateRequest, AnnotateResponse, CompileStatus, Denotation, FindLabelsRequest,
    FindLabelsResponse, HealthStatus, IdLookupRequest, IdLookupResponse, ServiceStats,
    VocabularyStats,
};
use crate::config::AnnotatorConfig;
use crate::error::{Result, ServiceError};

/// Query and curation entry points shared by every transport.
pub struct AnnotateService {
    registry: Arc<VocabularyRegistry>,
    normalizer: Arc<dyn Normalizer>,
    config: AnnotatorConfig,
    start_time: Instant,
    queries_served: AtomicU64,
    total_query_time_us: AtomicU64,
}

impl AnnotateService {
    pub fn new(
        registry: VocabularyRegistry,
        normalizer: Arc<dyn Normalizer>,
        config: AnnotatorConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            normalizer,
            config,
            start_time: Instant::now(),
            queries_served: AtomicU64::new(0),
            total_query_time_us: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &VocabularyRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    fn record_query(&self, started: Instant) {
        let us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.queries_served.fetch_add(1, Ordering::Relaxed);
        self.total_query_time_us.fetch_add(us, Ordering::Relaxed);
    }

    fn resolve(&self, names: &[String]) -> Result<Vec<Arc<Vocabulary>>> {
        if names.is_empty() {
            return Ok(self.registry.all());
        }
        Ok(self.registry.resolve_all(names)?)
    }

    /// Annotate text on the blocking pool under the configured timeout.
    ///
    /// On timeout the worker is left to finish and its result is dropped.
    pub async fn annotate(&self, request: AnnotateRequest) -> Result<AnnotateResponse> {
        let started = Instant::now();
        if request.vocabularies.is_empty() {
            return Err(MatchError::Validation("no vocabulary specified".into()).into());
        }
        let vocabularies = self.registry.resolve_all(&request.vocabularies)?;

        let options = MatchOptions {
            min_tokens: request.min_tokens.or(self.config.min_tokens),
            max_tokens: request.max_tokens.or(self.config.max_tokens),
            threshold: request.threshold.or(self.config.threshold),
            tags: request.tags,
            ranking: request.ranking.unwrap_or_default(),
            spans: request.spans,
            partial_degradation: self.config.partial_degradation,
            ..MatchOptions::default()
        };

        let normalizer = Arc::clone(&self.normalizer);
        let text = request.text;
        let worker = tokio::task::spawn_blocking(move || {
            VocabularyMatcher::new(normalizer.as_ref()).match_text(&text, &vocabularies, &options)
        });

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let results = match tokio::time::timeout(timeout, worker).await {
            Ok(joined) => joined??,
            Err(_) => {
                warn!(timeout_ms = self.config.timeout_ms, "Annotate request timed out");
                return Err(ServiceError::Timeout(self.config.timeout_ms));
            }
        };

        self.record_query(started);
        debug!(
            denotations = results.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Annotated text"
        );
        Ok(AnnotateResponse {
            denotations: results.into_iter().map(Denotation::from).collect(),
        })
    }

    /// Bulk term lookup without span generation.
    pub fn lookup_ids(&self, request: &IdLookupRequest) -> Result<IdLookupResponse> {
        let started = Instant::now();
        let vocabularies = self.resolve(&request.dictionaries)?;
        let options = LookupOptions {
            threshold: request.threshold.or(self.config.threshold),
            tags: request.tags.clone(),
            ranking: request.ranking.unwrap_or_default(),
            use_index: request.use_index,
        };

        let hits = VocabularyMatcher::new(self.normalizer.as_ref()).lookup_ids(
            &request.terms,
            &vocabularies,
            &options,
        )?;
        self.record_query(started);

        Ok(if request.verbose {
            IdLookupResponse::Verbose(hits)
        } else {
            IdLookupResponse::Ids(
                hits.into_iter()
                    .map(|(term, hits)| (term, identifiers(&hits)))
                    .collect(),
            )
        })
    }

    /// Labels of live entries for each identifier.
    pub fn find_labels(&self, request: &FindLabelsRequest) -> Result<FindLabelsResponse> {
        let vocabularies = self.resolve(&request.dictionaries)?;
        Ok(VocabularyMatcher::new(self.normalizer.as_ref())
            .find_labels_by_ids(&request.ids, &vocabularies)?)
    }

    /// Compile one vocabulary by name.
    pub fn compile(&self, name: &str) -> Result<CompileStatus> {
        let vocabulary = self
            .registry
            .get(name)
            .ok_or_else(|| MatchError::UnknownVocabulary(name.to_string()))?;
        Ok(status(name, vocabulary.compile()))
    }

    /// Compile every vocabulary, in parallel where the core allows it.
    pub fn compile_all(&self) -> Vec<CompileStatus> {
        let mut statuses: Vec<CompileStatus> = self
            .registry
            .compile_all()
            .into_iter()
            .map(|(name, outcome)| status(&name, outcome))
            .collect();
        statuses.sort_by(|a, b| status_name(a).cmp(status_name(b)));
        statuses
    }

    /// Compile only vocabularies that have no index or a stale one.
    pub fn compile_stale(&self) -> Vec<CompileStatus> {
        let mut statuses = Vec::new();
        for vocabulary in self.registry.all() {
            let stale = match vocabulary.is_compilable() {
                Ok(stale) => stale || vocabulary.snapshot().is_err(),
                Err(err) => {
                    warn!(vocabulary = %vocabulary.name(), error = %err, "Cannot inspect vocabulary");
                    false
                }
            };
            if stale {
                statuses.push(status(vocabulary.name(), vocabulary.compile()));
            }
        }
        statuses
    }

    pub fn stats(&self) -> Result<ServiceStats> {
        let queries = self.queries_served.load(Ordering::Relaxed);
        let total_us = self.total_query_time_us.load(Ordering::Relaxed);

        let mut vocabularies = Vec::with_capacity(self.registry.len());
        for vocabulary in self.registry.all() {
            let snapshot = vocabulary.snapshot();
            let (available, compiled) = match snapshot {
                Ok(snapshot) => (true, snapshot),
                Err(_) => (false, None),
            };
            vocabularies.push(VocabularyStats {
                name: vocabulary.name().to_string(),
                counts: vocabulary.counts()?,
                generation: vocabulary.generation(),
                compilable: vocabulary.is_compilable()?,
                index_hash: compiled.as_ref().map(|s| s.index_hash().to_string()),
                keys: compiled.as_ref().map_or(0, |s| s.stats().key_count),
                available,
            });
        }

        Ok(ServiceStats {
            queries_served: queries,
            avg_query_time_us: total_us.checked_div(queries).unwrap_or(0),
            uptime_secs: self.start_time.elapsed().as_secs(),
            vocabularies,
        })
    }

    pub fn health(&self) -> HealthStatus {
        let vocabularies = self.registry.all();
        let unavailable: Vec<String> = vocabularies
            .iter()
            .filter(|v| v.snapshot().is_err())
            .map(|v| v.name().to_string())
            .collect();
        HealthStatus {
            healthy: unavailable.is_empty(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            vocabularies: vocabularies.len(),
            unavailable,
        }
    }
}

fn status(name: &str, outcome: termlens_core::Result<CompileOutcome>) -> CompileStatus {
    match outcome {
        Ok(CompileOutcome::Compiled(report)) => {
            info!(vocabulary = name, keys = report.keys, "Compiled");
            CompileStatus::Compiled(report)
        }
        Ok(CompileOutcome::AlreadyRunning) => CompileStatus::AlreadyRunning {
            vocabulary: name.to_string(),
        },
        Ok(CompileOutcome::Discarded) => CompileStatus::Discarded {
            vocabulary: name.to_string(),
        },
        Err(err) => {
            warn!(vocabulary = name, error = %err, "Compile failed");
            CompileStatus::Failed {
                vocabulary: name.to_string(),
                error: err.to_string(),
            }
        }
    }
}

fn status_name(status: &CompileStatus) -> &str {
    match status {
        CompileStatus::Compiled(report) => &report.vocabulary,
        CompileStatus::AlreadyRunning { vocabulary }
        | CompileStatus::Discarded { vocabulary }
        | CompileStatus::Failed { vocabulary, .. } => vocabulary,
    }
}
