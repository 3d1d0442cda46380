//! Service configuration

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use termlens_core::ngram::validate_threshold;

use crate::error::{Result, ServiceError};

pub const ENV_DICTIONARIES_DIR: &str = "TERMLENS_DICTIONARIES_DIR";
pub const ENV_INDEX_DIR: &str = "TERMLENS_INDEX_DIR";
pub const ENV_THRESHOLD: &str = "TERMLENS_THRESHOLD";
pub const ENV_MIN_TOKENS: &str = "TERMLENS_MIN_TOKENS";
pub const ENV_MAX_TOKENS: &str = "TERMLENS_MAX_TOKENS";
pub const ENV_TIMEOUT_MS: &str = "TERMLENS_TIMEOUT_MS";
pub const ENV_PARTIAL_DEGRADATION: &str = "TERMLENS_PARTIAL_DEGRADATION";

/// Settings for [`AnnotateService`](crate::AnnotateService) and the loader.
///
/// `threshold`, `min_tokens` and `max_tokens` are service-wide defaults
/// applied to requests that leave them out; each vocabulary's own config
/// applies when both are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Directory of `<name>.tsv` dictionaries
    pub dictionaries_dir: PathBuf,
    /// Where compiled index artifacts are kept; none means in-memory only
    pub index_dir: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub min_tokens: Option<usize>,
    pub max_tokens: Option<usize>,
    /// Caller-side timeout around one annotate call
    pub timeout_ms: u64,
    /// Skip spans whose normalization fails instead of failing the request
    pub partial_degradation: bool,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            dictionaries_dir: PathBuf::from("dictionaries"),
            index_dir: None,
            threshold: None,
            min_tokens: None,
            max_tokens: None,
            timeout_ms: 30_000,
            partial_degradation: false,
        }
    }
}

impl AnnotatorConfig {
    /// Defaults overridden by `TERMLENS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_DICTIONARIES_DIR) {
            config.dictionaries_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_INDEX_DIR) {
            config.index_dir = Some(PathBuf::from(dir));
        }
        config.threshold = parse_var(&lookup, ENV_THRESHOLD)?.or(config.threshold);
        config.min_tokens = parse_var(&lookup, ENV_MIN_TOKENS)?.or(config.min_tokens);
        config.max_tokens = parse_var(&lookup, ENV_MAX_TOKENS)?.or(config.max_tokens);
        if let Some(ms) = parse_var(&lookup, ENV_TIMEOUT_MS)? {
            config.timeout_ms = ms;
        }
        if let Some(flag) = parse_var(&lookup, ENV_PARTIAL_DEGRADATION)? {
            config.partial_degradation = flag;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(threshold) = self.threshold {
            validate_threshold(threshold).map_err(|e| ServiceError::Config(e.to_string()))?;
        }
        if self.min_tokens == Some(0) {
            return Err(ServiceError::Config("min_tokens must be at least 1".into()));
        }
        if let (Some(min), Some(max)) = (self.min_tokens, self.max_tokens) {
            if min > max {
                return Err(ServiceError::Config(format!(
                    "min_tokens {min} exceeds max_tokens {max}"
                )));
            }
        }
        if self.timeout_ms == 0 {
            return Err(ServiceError::Config("timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ServiceError::Config(format!("{key}: cannot parse '{raw}'"))),
    }
}
