//! On-disk index artifact.
//!
//! Layout: the first line is the hex SHA-256 of the body, the rest is the
//! JSON body. The file is written to a temporary sibling and renamed into
//! place, so readers see either the old or the new artifact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::entry::EntryId;
use super::snapshot::{IndexSnapshot, IndexedEntry};
use crate::error::{MatchError, Result};
use crate::scoring::LanguageProfile;
use crate::spans::TermStopwords;

const FORMAT_VERSION: u32 = 2;
const FILE_NAME: &str = "index.json";

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactBody {
    format_version: u32,
    vocabulary: String,
    profile: LanguageProfile,
    ngram_order: usize,
    generation: u64,
    entries_digest: String,
    keys: Vec<(String, Vec<EntryId>)>,
    entries: Vec<IndexedEntry>,
    stopwords: TermStopwords,
}

/// `<index_dir>/<vocabulary>/index.json`
pub fn artifact_path(index_dir: &Path, vocabulary: &str) -> PathBuf {
    index_dir.join(vocabulary).join(FILE_NAME)
}

/// Persist a snapshot.
pub fn save(path: &Path, snapshot: &IndexSnapshot) -> Result<()> {
    let body = ArtifactBody {
        format_version: FORMAT_VERSION,
        vocabulary: snapshot.vocabulary().to_string(),
        profile: snapshot.profile(),
        ngram_order: snapshot.ngram_index().order(),
        generation: snapshot.generation(),
        entries_digest: snapshot.entries_digest().to_string(),
        keys: snapshot
            .ngram_index()
            .iter()
            .map(|(key, ids)| (key.to_string(), ids.to_vec()))
            .collect(),
        entries: snapshot.entries().cloned().collect(),
        stopwords: snapshot.stopwords().clone(),
    };
    let json = serde_json::to_string(&body)?;
    let checksum = hex::encode(Sha256::digest(json.as_bytes()));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, format!("{checksum}\n{json}"))?;
    fs::rename(&tmp, path)?;

    debug!(path = %path.display(), hash = %snapshot.index_hash(), "index artifact written");
    Ok(())
}

/// Load a snapshot. `Ok(None)` when no artifact exists.
///
/// A checksum mismatch, an unparsable body, a profile mismatch or recorded
/// keys that disagree with the rebuilt index are `IndexCorrupt`.
pub fn load(
    path: &Path,
    vocabulary: &str,
    profile: LanguageProfile,
) -> Result<Option<IndexSnapshot>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let corrupt = |reason: String| MatchError::IndexCorrupt {
        vocabulary: vocabulary.to_string(),
        reason,
    };

    let (checksum, json) = content
        .split_once('\n')
        .ok_or_else(|| corrupt("missing checksum line".into()))?;
    let actual = hex::encode(Sha256::digest(json.as_bytes()));
    if checksum.trim() != actual {
        return Err(corrupt("checksum mismatch".into()));
    }

    let body: ArtifactBody =
        serde_json::from_str(json).map_err(|e| corrupt(format!("unreadable body: {e}")))?;
    if body.format_version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {}",
            body.format_version
        )));
    }
    if body.profile != profile || body.ngram_order != profile.ngram_order() {
        return Err(corrupt("language profile changed since compile".into()));
    }

    let snapshot = IndexSnapshot::from_rows(
        vocabulary,
        profile,
        body.generation,
        body.entries,
        body.stopwords,
        body.entries_digest,
    );

    let rebuilt: Vec<(&str, &[EntryId])> = snapshot.ngram_index().iter().collect();
    let recorded: Vec<(&str, &[EntryId])> = body
        .keys
        .iter()
        .map(|(key, ids)| (key.as_str(), ids.as_slice()))
        .collect();
    if rebuilt != recorded {
        return Err(corrupt("index does not match its entries".into()));
    }

    Ok(Some(snapshot))
}

/// Delete a vocabulary's artifact directory if present.
pub fn remove(index_dir: &Path, vocabulary: &str) -> Result<()> {
    match fs::remove_dir_all(index_dir.join(vocabulary)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
