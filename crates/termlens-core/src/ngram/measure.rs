//! Similarity measures over feature sets and their CPMerge bounds.

#![allow(clippy::cast_precision_loss)] // feature counts are far below 2^52

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};

/// Slack applied to the size and overlap bounds so float rounding in
/// `t * |X|` can only widen the candidate range, never narrow it.
const BOUND_EPSILON: f64 = 1e-9;

/// Set similarity measure used for retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    Jaccard,
    Cosine,
}

impl Measure {
    /// Similarity of two sets of sizes `x` and `y` sharing `overlap` features.
    pub fn similarity(self, x: usize, y: usize, overlap: usize) -> f64 {
        if x == 0 || y == 0 {
            return 0.0;
        }
        match self {
            Measure::Jaccard => overlap as f64 / (x + y - overlap) as f64,
            Measure::Cosine => overlap as f64 / ((x * y) as f64).sqrt(),
        }
    }

    /// Smallest candidate set size that can reach `threshold` against a
    /// query of `x` features.
    pub fn min_size(self, x: usize, threshold: f64) -> usize {
        let bound = match self {
            Measure::Jaccard => threshold * x as f64,
            Measure::Cosine => threshold * threshold * x as f64,
        };
        ceil_loose(bound).max(1)
    }

    /// Largest candidate set size that can reach `threshold`.
    pub fn max_size(self, x: usize, threshold: f64) -> usize {
        let bound = match self {
            Measure::Jaccard => x as f64 / threshold,
            Measure::Cosine => x as f64 / (threshold * threshold),
        };
        (bound + BOUND_EPSILON).floor() as usize
    }

    /// Minimum overlap between a query of `x` features and a candidate of
    /// `y` features for the pair to reach `threshold`.
    pub fn min_overlap(self, x: usize, y: usize, threshold: f64) -> usize {
        let bound = match self {
            Measure::Jaccard => threshold * (x + y) as f64 / (1.0 + threshold),
            Measure::Cosine => threshold * ((x * y) as f64).sqrt(),
        };
        ceil_loose(bound).max(1)
    }
}

fn ceil_loose(value: f64) -> usize {
    (value - BOUND_EPSILON).ceil().max(0.0) as usize
}

/// Validate a retrieval threshold: it must lie in (0, 1].
pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if threshold.is_nan() || threshold <= 0.0 || threshold > 1.0 {
        return Err(MatchError::InvalidThreshold(threshold));
    }
    Ok(threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_similarity() {
        // |X|=4, |Y|=4, 2 shared → 2 / 6
        let sim = Measure::Jaccard.similarity(4, 4, 2);
        assert!((sim - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_similarity() {
        let sim = Measure::Cosine.similarity(4, 9, 6);
        assert!((sim - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_sets_are_zero() {
        assert_eq!(Measure::Jaccard.similarity(0, 3, 0), 0.0);
        assert_eq!(Measure::Cosine.similarity(3, 0, 0), 0.0);
    }

    #[test]
    fn jaccard_bounds() {
        assert_eq!(Measure::Jaccard.min_size(10, 0.6), 6);
        assert_eq!(Measure::Jaccard.max_size(10, 0.6), 16);
        // 0.6 * 20 / 1.6 = 7.5
        assert_eq!(Measure::Jaccard.min_overlap(10, 10, 0.6), 8);
    }

    #[test]
    fn exact_threshold_bounds() {
        assert_eq!(Measure::Jaccard.min_size(7, 1.0), 7);
        assert_eq!(Measure::Jaccard.max_size(7, 1.0), 7);
        assert_eq!(Measure::Jaccard.min_overlap(7, 7, 1.0), 7);
        assert_eq!(Measure::Cosine.min_overlap(7, 7, 1.0), 7);
    }

    #[test]
    fn threshold_validation() {
        assert!(validate_threshold(0.6).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(0.0).is_err());
        assert!(validate_threshold(-0.5).is_err());
        assert!(validate_threshold(1.5).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
    }
}
