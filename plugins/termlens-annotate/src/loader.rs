//! TSV dictionary directory loader
//!
//! Every `<name>.tsv` in the dictionaries directory becomes one vocabulary.
//! Rows are `label<TAB>identifier[<TAB>tag|tag]` and are imported GRAY;
//! rows with a missing field or an out-of-bounds label are skipped. An
//! optional `<name>.json` next to it holds the vocabulary's
//! [`VocabularyConfig`]. When an index directory is configured, the
//! vocabulary's persisted index is opened from `<index_dir>/<name>/`.

use std::fs;
use std::path::{Path, PathBuf};

use termlens_core::{
    parse_entry_line, MatchError, Normalizer, Vocabulary, VocabularyConfig, VocabularyRegistry,
};
use tracing::{debug, error, info};

use crate::config::AnnotatorConfig;
use crate::error::{Result, ServiceError};

const DICTIONARY_EXT: &str = "tsv";

/// Load every dictionary under `config.dictionaries_dir` into a registry.
///
/// Files are loaded in name order. A vocabulary whose index could not be
/// recovered is still registered; its queries fail with
/// `IndexUnavailable` until it is recompiled.
pub fn load_dictionaries(
    config: &AnnotatorConfig,
    normalizer: &dyn Normalizer,
) -> Result<VocabularyRegistry> {
    let registry = VocabularyRegistry::new();
    for path in dictionary_files(&config.dictionaries_dir)? {
        let vocabulary = load_dictionary(&path, config.index_dir.as_deref(), normalizer)?;
        registry.register(vocabulary)?;
    }
    info!(
        dir = %config.dictionaries_dir.display(),
        vocabularies = registry.len(),
        "Loaded dictionaries"
    );
    Ok(registry)
}

/// `*.tsv` files directly under `dir`, sorted by path.
pub fn dictionary_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == DICTIONARY_EXT) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load one dictionary file as a vocabulary named after its file stem.
pub fn load_dictionary(
    path: &Path,
    index_dir: Option<&Path>,
    normalizer: &dyn Normalizer,
) -> Result<Vocabulary> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| ServiceError::Config(format!("bad dictionary path {}", path.display())))?;

    let config = read_vocabulary_config(&path.with_extension("json"))?;
    let mut vocabulary = Vocabulary::new(name, config)?;
    if let Some(dir) = index_dir {
        vocabulary = vocabulary.with_index_dir(dir);
    }

    let content = fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (i, line) in content.lines().enumerate() {
        match parse_entry_line(line) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => {}
            Err(source) => {
                return Err(ServiceError::Dictionary {
                    path: path.to_path_buf(),
                    line: i + 1,
                    source,
                })
            }
        }
    }
    let imported = vocabulary.add_entries(rows, normalizer)?.len();
    debug!(vocabulary = name, entries = imported, "Imported dictionary");

    match vocabulary.open() {
        Ok(()) => {}
        Err(MatchError::IndexUnavailable(_)) => {
            error!(vocabulary = name, "Index unavailable, recompile required");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(vocabulary)
}

fn read_vocabulary_config(path: &Path) -> Result<VocabularyConfig> {
    match fs::read_to_string(path) {
        Ok(json) => Ok(serde_json::from_str(&json)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(VocabularyConfig::default()),
        Err(e) => Err(e.into()),
    }
}
