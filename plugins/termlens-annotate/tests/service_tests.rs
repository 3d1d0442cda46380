//! Service-level tests over dictionaries loaded from disk

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use termlens_annotate::{
    load_dictionaries, AnnotateRequest, AnnotateService, AnnotatorConfig, CompileStatus,
    FindLabelsRequest, IdLookupRequest, IdLookupResponse, ServiceError,
};
use termlens_core::{BasicNormalizer, LabelRef, MatchError, NormalizeError, Normalizer};

/// Helper normalizer that sleeps before delegating
struct SlowNormalizer(Duration);

impl Normalizer for SlowNormalizer {
    fn normalize(&self, text: &str, profile: &str) -> Result<String, NormalizeError> {
        thread::sleep(self.0);
        BasicNormalizer::new().normalize(text, profile)
    }
}

/// Helper normalizer that is unreachable for any text containing "zzz"
struct FlakyNormalizer(BasicNormalizer);

impl Normalizer for FlakyNormalizer {
    fn normalize(&self, text: &str, profile: &str) -> Result<String, NormalizeError> {
        if text.contains("zzz") {
            return Err(NormalizeError::Unavailable("connection refused".into()));
        }
        self.0.normalize(text, profile)
    }
}

/// Helper to write a dictionary directory with `drugs` and `genes`
fn dictionaries() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("drugs.tsv"),
        "aspirin\tD001\tnsaid\nacetylsalicylic acid\tD001\tnsaid\nheparin\tD002\n",
    )
    .unwrap();
    fs::write(dir.path().join("genes.tsv"), "NF-kappa B\tG1\n").unwrap();
    dir
}

/// Helper to load, compile and wrap a dictionary directory
fn service_with(
    dir: &Path,
    index_dir: Option<&Path>,
    normalizer: Arc<dyn Normalizer>,
    tweak: impl FnOnce(&mut AnnotatorConfig),
) -> AnnotateService {
    let mut config = AnnotatorConfig {
        dictionaries_dir: dir.to_path_buf(),
        index_dir: index_dir.map(Path::to_path_buf),
        ..AnnotatorConfig::default()
    };
    tweak(&mut config);
    let registry = load_dictionaries(&config, &BasicNormalizer::new()).unwrap();
    let service = AnnotateService::new(registry, normalizer, config);
    service.compile_stale();
    service
}

fn service(dir: &Path) -> AnnotateService {
    service_with(dir, None, Arc::new(BasicNormalizer::new()), |_| {})
}

fn annotate_request(text: &str, vocabularies: &[&str]) -> AnnotateRequest {
    serde_json::from_value(serde_json::json!({
        "text": text,
        "vocabularies": vocabularies,
    }))
    .unwrap()
}

#[tokio::test]
async fn test_annotate_returns_denotations_in_text_order() {
    let dir = dictionaries();
    let service = service(dir.path());

    let mut request = annotate_request("heparin then aspirin", &["drugs"]);
    request.threshold = Some(1.0);
    let response = service.annotate(request).await.unwrap();

    let found: Vec<(usize, usize, &str, &str)> = response
        .denotations
        .iter()
        .map(|d| (d.begin, d.end, d.identifier.as_str(), d.dictionary.as_str()))
        .collect();
    assert_eq!(found, vec![(0, 7, "D002", "drugs"), (13, 20, "D001", "drugs")]);
    assert_eq!(response.denotations[1].tags, vec!["nsaid".to_string()]);
}

#[tokio::test]
async fn test_annotate_approximate_across_vocabularies() {
    let dir = dictionaries();
    let service = service(dir.path());

    let request: AnnotateRequest = serde_json::from_value(serde_json::json!({
        "text": "Aspirin blocks NF-kappaB activation.",
        "vocabularies": ["drugs", "genes"],
        "threshold": 0.6,
        "max_tokens": 3,
        "spans": {"case_insensitive": true, "replace_hyphen": true},
    }))
    .unwrap();
    let response = service.annotate(request).await.unwrap();

    let ids: Vec<&str> = response
        .denotations
        .iter()
        .map(|d| d.identifier.as_str())
        .collect();
    assert!(ids.contains(&"D001"));
    assert!(response
        .denotations
        .iter()
        .any(|d| d.identifier == "G1" && d.dictionary == "genes" && d.begin == 15 && d.end == 24));
    for pair in response.denotations.windows(2) {
        assert!(pair[0].begin <= pair[1].begin);
    }
}

#[tokio::test]
async fn test_annotate_rejects_unknown_vocabulary() {
    let dir = dictionaries();
    let service = service(dir.path());

    let err = service
        .annotate(annotate_request("aspirin", &["drugs", "nope"]))
        .await
        .unwrap_err();
    assert!(err.is_client_error());
    assert!(matches!(
        err,
        ServiceError::Match(MatchError::UnknownVocabulary(ref names)) if names == "nope"
    ));

    let err = service.annotate(annotate_request("aspirin", &[])).await.unwrap_err();
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_annotate_times_out() {
    let dir = dictionaries();
    let service = service_with(
        dir.path(),
        None,
        Arc::new(SlowNormalizer(Duration::from_millis(200))),
        |config| config.timeout_ms = 20,
    );

    let err = service
        .annotate(annotate_request("aspirin and heparin", &["drugs"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Timeout(20)));
    assert_eq!(service.stats().unwrap().queries_served, 0);
}

#[tokio::test]
async fn test_normalization_failure_fails_the_request() {
    let dir = dictionaries();
    let service = service_with(
        dir.path(),
        None,
        Arc::new(FlakyNormalizer(BasicNormalizer::new())),
        |_| {},
    );

    let err = service
        .annotate(annotate_request("aspirin zzz", &["drugs"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Match(MatchError::NormalizationUnavailable(_))
    ));
}

#[tokio::test]
async fn test_partial_degradation_skips_failed_spans() {
    let dir = dictionaries();
    let service = service_with(
        dir.path(),
        None,
        Arc::new(FlakyNormalizer(BasicNormalizer::new())),
        |config| config.partial_degradation = true,
    );

    let response = service
        .annotate(annotate_request("aspirin zzz", &["drugs"]))
        .await
        .unwrap();
    assert_eq!(response.denotations.len(), 1);
    assert_eq!(response.denotations[0].identifier, "D001");
    assert_eq!((response.denotations[0].begin, response.denotations[0].end), (0, 7));
}

#[test]
fn test_lookup_ids_plain_and_verbose() {
    let dir = dictionaries();
    let service = service(dir.path());

    let mut request: IdLookupRequest = serde_json::from_value(serde_json::json!({
        "terms": ["aspirin", "warfarin"],
        "dictionaries": ["drugs"],
    }))
    .unwrap();

    let plain = service.lookup_ids(&request).unwrap();
    let expected: BTreeMap<String, Vec<String>> = [
        ("aspirin".to_string(), vec!["D001".to_string()]),
        ("warfarin".to_string(), Vec::new()),
    ]
    .into_iter()
    .collect();
    assert_eq!(plain, IdLookupResponse::Ids(expected));

    request.verbose = true;
    match service.lookup_ids(&request).unwrap() {
        IdLookupResponse::Verbose(hits) => {
            assert_eq!(hits["aspirin"].len(), 1);
            assert_eq!(hits["aspirin"][0].label, "aspirin");
            assert_eq!(hits["aspirin"][0].score, 1.0);
            assert!(hits["warfarin"].is_empty());
        }
        other => panic!("expected verbose response, got {other:?}"),
    }
}

#[test]
fn test_lookup_without_dictionaries_searches_all() {
    let dir = dictionaries();
    let service = service(dir.path());

    let request: IdLookupRequest = serde_json::from_value(serde_json::json!({
        "terms": ["NF-kappa B"],
        "threshold": 1.0,
    }))
    .unwrap();
    match service.lookup_ids(&request).unwrap() {
        IdLookupResponse::Ids(ids) => assert_eq!(ids["NF-kappa B"], vec!["G1".to_string()]),
        other => panic!("expected ids, got {other:?}"),
    }
}

#[test]
fn test_find_labels() {
    let dir = dictionaries();
    let service = service(dir.path());

    let labels = service
        .find_labels(&FindLabelsRequest {
            ids: vec!["D001".into(), "X999".into()],
            dictionaries: Vec::new(),
        })
        .unwrap();

    assert_eq!(
        labels["D001"],
        vec![
            LabelRef {
                label: "acetylsalicylic acid".into(),
                dictionary: "drugs".into()
            },
            LabelRef {
                label: "aspirin".into(),
                dictionary: "drugs".into()
            },
        ]
    );
    assert!(labels["X999"].is_empty());
}

#[test]
fn test_stats_and_health_track_compiles() {
    let dir = dictionaries();
    let config = AnnotatorConfig {
        dictionaries_dir: dir.path().to_path_buf(),
        ..AnnotatorConfig::default()
    };
    let registry = load_dictionaries(&config, &BasicNormalizer::new()).unwrap();
    let service = AnnotateService::new(registry, Arc::new(BasicNormalizer::new()), config);

    let before = service.stats().unwrap();
    assert_eq!(before.vocabularies.len(), 2);
    assert!(before.vocabularies.iter().all(|v| v.compilable && v.index_hash.is_none()));

    let statuses = service.compile_all();
    assert_eq!(statuses.len(), 2);
    assert!(statuses
        .iter()
        .all(|s| matches!(s, CompileStatus::Compiled(_))));

    let after = service.stats().unwrap();
    let drugs = after.vocabularies.iter().find(|v| v.name == "drugs").unwrap();
    assert!(!drugs.compilable);
    assert!(drugs.index_hash.is_some());
    assert_eq!(drugs.counts.gray, 3);
    assert_eq!(drugs.keys, 3);

    let health = service.health();
    assert!(health.healthy);
    assert_eq!(health.vocabularies, 2);
}

#[test]
fn test_compile_unknown_vocabulary_is_error() {
    let dir = dictionaries();
    let service = service(dir.path());
    let err = service.compile("nope").unwrap_err();
    assert!(err.is_client_error());
}

#[test]
fn test_artifacts_survive_restart() {
    let dir = dictionaries();
    let index = TempDir::new().unwrap();

    let first = service_with(
        dir.path(),
        Some(index.path()),
        Arc::new(BasicNormalizer::new()),
        |_| {},
    );
    let hashes: Vec<Option<String>> = first
        .stats()
        .unwrap()
        .vocabularies
        .into_iter()
        .map(|v| v.index_hash)
        .collect();
    assert!(index.path().join("drugs").join("index.json").exists());

    let config = AnnotatorConfig {
        dictionaries_dir: dir.path().to_path_buf(),
        index_dir: Some(index.path().to_path_buf()),
        ..AnnotatorConfig::default()
    };
    let registry = load_dictionaries(&config, &BasicNormalizer::new()).unwrap();
    let second = AnnotateService::new(registry, Arc::new(BasicNormalizer::new()), config);

    assert!(second.compile_stale().is_empty());
    let reloaded: Vec<Option<String>> = second
        .stats()
        .unwrap()
        .vocabularies
        .into_iter()
        .map(|v| v.index_hash)
        .collect();
    assert_eq!(reloaded, hashes);
}

#[tokio::test]
async fn test_edited_dictionary_is_recompiled_on_restart() {
    let dir = dictionaries();
    let index = TempDir::new().unwrap();
    let first = service_with(
        dir.path(),
        Some(index.path()),
        Arc::new(BasicNormalizer::new()),
        |_| {},
    );
    assert!(first.registry().get("drugs").unwrap().snapshot().unwrap().is_some());

    fs::write(dir.path().join("drugs.tsv"), "heparin\tD002\nwarfarin\tD003\n").unwrap();
    let config = AnnotatorConfig {
        dictionaries_dir: dir.path().to_path_buf(),
        index_dir: Some(index.path().to_path_buf()),
        ..AnnotatorConfig::default()
    };
    let registry = load_dictionaries(&config, &BasicNormalizer::new()).unwrap();
    let second = AnnotateService::new(registry, Arc::new(BasicNormalizer::new()), config);

    let recompiled = second.compile_stale();
    assert_eq!(recompiled.len(), 1);
    assert!(matches!(&recompiled[0], CompileStatus::Compiled(report) if report.vocabulary == "drugs"));

    let mut request = annotate_request("aspirin then warfarin", &["drugs"]);
    request.threshold = Some(1.0);
    let response = second.annotate(request).await.unwrap();
    let ids: Vec<&str> = response
        .denotations
        .iter()
        .map(|d| d.identifier.as_str())
        .collect();
    assert_eq!(ids, vec!["D003"]);
}
