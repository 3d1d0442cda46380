//! Curation lifecycle, compile visibility and snapshot atomicity

use std::sync::Arc;
use std::thread;

use termlens_core::{
    BasicNormalizer, CompileOutcome, MatchOptions, RawEntry, Vocabulary, VocabularyConfig,
    VocabularyMatcher,
};

fn exact() -> MatchOptions {
    MatchOptions {
        threshold: Some(1.0),
        ..MatchOptions::default()
    }
}

fn hits(vocab: &Arc<Vocabulary>, text: &str) -> usize {
    let normalizer = BasicNormalizer::new();
    VocabularyMatcher::new(&normalizer)
        .match_text(text, std::slice::from_ref(vocab), &exact())
        .unwrap()
        .len()
}

#[test]
fn test_black_entries_leave_the_index_only_after_compile() {
    let normalizer = BasicNormalizer::new();
    let vocab = Arc::new(Vocabulary::new("drugs", VocabularyConfig::default()).unwrap());
    let ids = vocab
        .add_entries(vec![RawEntry::new("aspirin", "D001")], &normalizer)
        .unwrap();
    vocab.compile().unwrap();
    assert_eq!(hits(&vocab, "aspirin"), 1);

    // GRAY -> BLACK: the live index is untouched until compile
    vocab.turn_to_black(ids[0]).unwrap();
    assert_eq!(hits(&vocab, "aspirin"), 1);
    assert!(vocab.is_compilable().unwrap());
    vocab.compile().unwrap();
    assert_eq!(hits(&vocab, "aspirin"), 0);

    // BLACK -> GRAY: absent until the next compile
    vocab.cancel_black(ids[0]).unwrap();
    assert_eq!(hits(&vocab, "aspirin"), 0);
    vocab.compile().unwrap();
    assert_eq!(hits(&vocab, "aspirin"), 1);
}

#[test]
fn test_black_entries_are_absent_from_approximate_index() {
    let normalizer = BasicNormalizer::new();
    let vocab = Vocabulary::new("drugs", VocabularyConfig::default()).unwrap();
    let ids = vocab
        .add_entries(
            vec![RawEntry::new("aspirin", "D001"), RawEntry::new("heparin", "D002")],
            &normalizer,
        )
        .unwrap();
    vocab.turn_to_black(ids[0]).unwrap();
    vocab.compile().unwrap();

    let snapshot = vocab.snapshot().unwrap().unwrap();
    assert!(snapshot.retrieve("aspirin", 0.5).unwrap().is_empty());
    assert_eq!(snapshot.retrieve("heparin", 0.5).unwrap(), vec!["heparin"]);
}

#[test]
fn test_queries_see_the_old_snapshot_until_commit() {
    let normalizer = BasicNormalizer::new();
    let vocab = Arc::new(Vocabulary::new("drugs", VocabularyConfig::default()).unwrap());
    vocab
        .create_entry("aspirin", "D001", Vec::<String>::new(), &normalizer)
        .unwrap();
    vocab.compile().unwrap();
    vocab
        .create_entry("heparin", "D002", Vec::<String>::new(), &normalizer)
        .unwrap();

    let before = vocab.snapshot().unwrap().unwrap();
    let pending = vocab.prepare_compile().unwrap().unwrap();
    assert_eq!(pending.snapshot().by_label("heparin").count(), 1);

    // Built but not committed: concurrent readers still use the old index,
    // and a second compile is turned away.
    thread::scope(|s| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let vocab = Arc::clone(&vocab);
                s.spawn(move || (hits(&vocab, "aspirin"), hits(&vocab, "heparin")))
            })
            .collect();
        let compiler = {
            let vocab = Arc::clone(&vocab);
            s.spawn(move || vocab.compile().unwrap())
        };

        for reader in readers {
            assert_eq!(reader.join().unwrap(), (1, 0));
        }
        assert_eq!(compiler.join().unwrap(), CompileOutcome::AlreadyRunning);
    });

    pending.commit().unwrap();
    assert_eq!(hits(&vocab, "heparin"), 1);

    // A reader holding the old snapshot keeps a consistent view.
    assert_eq!(before.by_label("heparin").count(), 0);
    assert_eq!(before.by_label("aspirin").count(), 1);
}

#[test]
fn test_dropped_compile_changes_nothing() {
    let normalizer = BasicNormalizer::new();
    let vocab = Vocabulary::new("drugs", VocabularyConfig::default()).unwrap();
    vocab
        .create_entry("aspirin", "D001", Vec::<String>::new(), &normalizer)
        .unwrap();

    let pending = vocab.prepare_compile().unwrap().unwrap();
    drop(pending);

    assert!(vocab.snapshot().unwrap().is_none());
    assert!(vocab.is_compilable().unwrap());
    assert!(matches!(vocab.compile().unwrap(), CompileOutcome::Compiled(_)));
}

#[test]
fn test_white_entries_are_destroyed_by_undo() {
    let normalizer = BasicNormalizer::new();
    let vocab = Arc::new(Vocabulary::new("drugs", VocabularyConfig::default()).unwrap());
    let id = vocab
        .create_entry("aspirin", "D001", Vec::<String>::new(), &normalizer)
        .unwrap();
    vocab.compile().unwrap();
    assert_eq!(hits(&vocab, "aspirin"), 1);

    vocab.undo_entry(id).unwrap();
    vocab.compile().unwrap();
    assert_eq!(hits(&vocab, "aspirin"), 0);
    assert_eq!(vocab.counts().unwrap().total(), 0);
}
