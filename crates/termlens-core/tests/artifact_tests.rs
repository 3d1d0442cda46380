//! Persisted index artifacts and recovery on open

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use termlens_core::vocabulary::artifact;
use termlens_core::{
    BasicNormalizer, CompileOutcome, MatchError, MatchOptions, RawEntry, Vocabulary,
    VocabularyConfig, VocabularyMatcher,
};

/// Helper to build a vocabulary persisting under `dir` with the same rows
/// every time, as a loader would on each start.
fn drugs(dir: &Path) -> Vocabulary {
    let vocab = Vocabulary::new("drugs", VocabularyConfig::default())
        .unwrap()
        .with_index_dir(dir);
    vocab
        .add_entries(
            vec![RawEntry::new("aspirin", "D001"), RawEntry::new("heparin", "D002")],
            &BasicNormalizer::new(),
        )
        .unwrap();
    vocab
}

#[test]
fn test_reopen_loads_the_artifact() {
    let dir = TempDir::new().unwrap();
    let first = drugs(dir.path());
    first.compile().unwrap();
    let hash = first.snapshot().unwrap().unwrap().index_hash().to_string();
    assert!(artifact::artifact_path(dir.path(), "drugs").exists());

    let second = drugs(dir.path());
    assert!(second.is_compilable().unwrap());
    second.open().unwrap();

    assert!(!second.is_compilable().unwrap());
    let snapshot = second.snapshot().unwrap().unwrap();
    assert_eq!(snapshot.index_hash(), hash);
}

#[test]
fn test_artifact_from_other_entries_is_not_installed() {
    let dir = TempDir::new().unwrap();
    drugs(dir.path()).compile().unwrap();

    // Same vocabulary, different rows: "aspirin" gone, "warfarin" added.
    let edited = Vocabulary::new("drugs", VocabularyConfig::default())
        .unwrap()
        .with_index_dir(dir.path());
    edited
        .add_entries(
            vec![RawEntry::new("heparin", "D002"), RawEntry::new("warfarin", "D003")],
            &BasicNormalizer::new(),
        )
        .unwrap();
    edited.open().unwrap();

    assert!(edited.snapshot().unwrap().is_none());
    assert!(edited.is_compilable().unwrap());

    assert!(matches!(edited.compile().unwrap(), CompileOutcome::Compiled(_)));
    let snapshot = edited.snapshot().unwrap().unwrap();
    assert_eq!(snapshot.by_label("aspirin").count(), 0);
    assert_eq!(snapshot.by_label("warfarin").count(), 1);

    // The rewritten artifact now matches the edited rows.
    let reopened = Vocabulary::new("drugs", VocabularyConfig::default())
        .unwrap()
        .with_index_dir(dir.path());
    reopened
        .add_entries(
            vec![RawEntry::new("heparin", "D002"), RawEntry::new("warfarin", "D003")],
            &BasicNormalizer::new(),
        )
        .unwrap();
    reopened.open().unwrap();
    assert!(!reopened.is_compilable().unwrap());
}

#[test]
fn test_rejected_entry_makes_artifact_stale() {
    let dir = TempDir::new().unwrap();
    let first = drugs(dir.path());
    first.compile().unwrap();

    let second = drugs(dir.path());
    let heparin = second.entries().unwrap()[1].id;
    second.turn_to_black(heparin).unwrap();
    second.open().unwrap();

    assert!(second.snapshot().unwrap().is_none());
    assert!(second.is_compilable().unwrap());
}

#[test]
fn test_open_without_artifact_leaves_vocabulary_uncompiled() {
    let dir = TempDir::new().unwrap();
    let vocab = drugs(dir.path());
    vocab.open().unwrap();
    assert!(vocab.snapshot().unwrap().is_none());
    assert!(vocab.is_compilable().unwrap());
}

#[test]
fn test_corrupt_artifact_is_rebuilt() {
    let dir = TempDir::new().unwrap();
    let path = artifact::artifact_path(dir.path(), "drugs");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "not a checksum\n{\"broken\":").unwrap();

    let vocab = drugs(dir.path());
    vocab.open().unwrap();

    let snapshot = vocab.snapshot().unwrap().unwrap();
    assert_eq!(snapshot.entry_count(), 2);
    // The rebuilt artifact now loads cleanly.
    let reloaded = drugs(dir.path());
    reloaded.open().unwrap();
    assert_eq!(
        reloaded.snapshot().unwrap().unwrap().index_hash(),
        snapshot.index_hash()
    );
}

#[test]
fn test_failed_rebuild_makes_vocabulary_unavailable() {
    let dir = TempDir::new().unwrap();
    let path = artifact::artifact_path(dir.path(), "drugs");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "garbage").unwrap();
    // A directory in place of the temporary file makes the rewrite fail.
    let blocker = path.with_extension("json.tmp");
    fs::create_dir_all(&blocker).unwrap();

    let vocab = Arc::new(drugs(dir.path()));
    let err = vocab.open().unwrap_err();
    assert!(matches!(err, MatchError::IndexUnavailable(_)));
    assert!(matches!(
        vocab.snapshot(),
        Err(MatchError::IndexUnavailable(_))
    ));

    let normalizer = BasicNormalizer::new();
    let matcher = VocabularyMatcher::new(&normalizer);
    let err = matcher
        .match_text("aspirin", std::slice::from_ref(&vocab), &MatchOptions::default())
        .unwrap_err();
    assert!(matches!(err, MatchError::IndexUnavailable(_)));

    fs::remove_dir_all(&blocker).unwrap();
    vocab.compile().unwrap();
    let found = matcher
        .match_text("aspirin", std::slice::from_ref(&vocab), &MatchOptions::default())
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn test_empty_all_removes_the_artifact() {
    let dir = TempDir::new().unwrap();
    let vocab = drugs(dir.path());
    vocab.compile().unwrap();
    let path = artifact::artifact_path(dir.path(), "drugs");
    assert!(path.exists());

    vocab.empty_entries(None).unwrap();
    assert!(!path.exists());
    assert!(vocab.snapshot().unwrap().is_none());
}

#[test]
fn test_emptying_during_compile_writes_no_artifact() {
    let dir = TempDir::new().unwrap();
    let vocab = drugs(dir.path());
    let path = artifact::artifact_path(dir.path(), "drugs");

    let pending = vocab.prepare_compile().unwrap().unwrap();
    assert_eq!(vocab.empty_entries(None).unwrap(), 2);
    assert_eq!(pending.commit().unwrap(), CompileOutcome::Discarded);

    assert!(!path.exists());
    assert!(vocab.snapshot().unwrap().is_none());
    assert!(!vocab.is_compilable().unwrap());
}
