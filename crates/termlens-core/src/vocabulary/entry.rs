//! Vocabulary entries and TSV entry lines.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};

/// Entry id, unique within one vocabulary.
pub type EntryId = u64;

const MIN_LABEL_CHARS: usize = 2;
const MAX_LABEL_CHARS: usize = 127;
const MAX_IDENTIFIER_CHARS: usize = 255;

/// Curation state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryMode {
    /// Provisionally active; bulk-imported
    Gray,
    /// Curator-confirmed
    White,
    /// Curator-rejected; never indexed
    Black,
    /// Synonym expansion output; literal lookup only
    AutoExpanded,
}

impl EntryMode {
    /// Gray and White entries feed the approximate index.
    pub fn is_active(self) -> bool {
        matches!(self, EntryMode::Gray | EntryMode::White)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryMode::Gray => "GRAY",
            EntryMode::White => "WHITE",
            EntryMode::Black => "BLACK",
            EntryMode::AutoExpanded => "AUTO_EXPANDED",
        }
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One vocabulary term with its normalized forms and curation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub label: String,
    pub identifier: String,
    pub norm1: String,
    /// May be empty when normalization drops every token
    pub norm2: String,
    pub mode: EntryMode,
    /// Changed since the last compile
    pub dirty: bool,
    pub tags: BTreeSet<String>,
    /// Provenance confidence in [0, 1), AutoExpanded entries only
    pub score: Option<f64>,
    /// Vocabulary generation of the last mutation
    #[serde(default)]
    pub revision: u64,
}

impl Entry {
    /// A new entry; the id is assigned by the store on insert.
    pub fn new(
        label: impl Into<String>,
        identifier: impl Into<String>,
        norm1: impl Into<String>,
        norm2: impl Into<String>,
        mode: EntryMode,
    ) -> Result<Self> {
        let label = label.into();
        let identifier = identifier.into();
        if label.is_empty() {
            return Err(MatchError::Validation("label must not be empty".into()));
        }
        if identifier.is_empty() {
            return Err(MatchError::Validation("identifier must not be empty".into()));
        }
        Ok(Self {
            id: 0,
            label,
            identifier,
            norm1: norm1.into(),
            norm2: norm2.into(),
            mode,
            dirty: false,
            tags: BTreeSet::new(),
            score: None,
            revision: 0,
        })
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            validate_tag(&tag)?;
            self.tags.insert(tag);
        }
        Ok(self)
    }

    /// Attach a provenance score; must lie in [0, 1).
    pub fn with_score(mut self, score: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&score) {
            return Err(MatchError::Validation(format!(
                "expansion score {score} outside [0, 1)"
            )));
        }
        self.score = Some(score);
        Ok(self)
    }

    /// True if the entry carries at least one of `required`; an empty
    /// filter accepts everything.
    pub fn has_any_tag(&self, required: &BTreeSet<String>) -> bool {
        required.is_empty() || required.iter().any(|t| self.tags.contains(t))
    }
}

/// Tags are non-empty ASCII alphanumeric words.
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(MatchError::Validation(format!("invalid tag '{tag}'")));
    }
    Ok(())
}

/// Un-normalized entry input: what a TSV line or a curator supplies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawEntry {
    pub label: String,
    pub identifier: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RawEntry {
    pub fn new(label: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            identifier: identifier.into(),
            tags: Vec::new(),
        }
    }
}

/// Parse one `label<TAB>identifier[<TAB>tag|tag]` line.
///
/// Blank lines, `#` comments, lines with fewer than two fields and lines
/// whose label or identifier is out of bounds yield `Ok(None)`. A malformed
/// tag field is an error.
pub fn parse_entry_line(line: &str) -> Result<Option<RawEntry>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split('\t');
    let (Some(label), Some(identifier)) = (fields.next(), fields.next()) else {
        return Ok(None);
    };

    let label_chars = label.chars().count();
    if !(MIN_LABEL_CHARS..=MAX_LABEL_CHARS).contains(&label_chars) {
        return Ok(None);
    }
    if identifier.is_empty() || identifier.chars().count() > MAX_IDENTIFIER_CHARS {
        return Ok(None);
    }

    let tags = match fields.next() {
        Some(field) if !field.is_empty() => parse_tags(field)?,
        _ => Vec::new(),
    };

    Ok(Some(RawEntry {
        label: label.to_string(),
        identifier: identifier.to_string(),
        tags,
    }))
}

fn parse_tags(field: &str) -> Result<Vec<String>> {
    field
        .split('|')
        .map(|tag| {
            validate_tag(tag).map_err(|_| MatchError::Validation(format!("invalid tags '{field}'")))?;
            Ok(tag.to_string())
        })
        .collect()
}
