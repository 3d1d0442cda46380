//! Approximate string index over character n-gram feature sets.
//!
//! Keys are partitioned by feature-set size. Each partition holds an
//! inverted list per feature (sorted key ids). Retrieval runs CPMerge
//! (Okazaki & Tsujii, 2010):
//!
//! 1. Only partitions whose size is compatible with the measure and
//!    threshold are visited.
//! 2. Within a partition the query's lists are sorted by length; any key
//!    reaching the minimum overlap τ must occur in one of the first
//!    `|X| - τ + 1` lists, so only those are merged into candidates.
//! 3. Remaining lists are binary-searched and candidates that can
//!    no longer reach τ are dropped.
//!
//! Overlap counts are exact, so surfaced keys satisfy the threshold.

#![allow(clippy::cast_possible_truncation)] // key and feature ids fit in u32

use std::collections::{BTreeMap, HashSet};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::features::extract_features;
use super::measure::{validate_threshold, Measure};
use crate::error::Result;

/// How candidates are found at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Size filtering plus CPMerge over inverted lists
    #[default]
    CpMerge,
    /// Score every stored key
    Linear,
}

/// Index statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Distinct stored keys
    pub key_count: usize,
    /// Payloads across all keys
    pub payload_count: usize,
    /// Distinct n-gram features
    pub feature_count: usize,
}

/// Approximate-membership index from normalized strings to payloads.
///
/// Immutable once built; rebuilding produces a new value. Duplicate keys
/// collect their payloads in insertion order.
#[derive(Debug, Clone)]
pub struct NgramIndex<P> {
    order: usize,
    strategy: Strategy,
    /// Distinct keys in ascending order; position is the key id
    keys: Vec<String>,
    payloads: Vec<Vec<P>>,
    sizes: Vec<usize>,
    feature_ids: AHashMap<String, u32>,
    /// `postings[size][feature]` → ascending key ids with that set size
    postings: Vec<AHashMap<u32, Vec<u32>>>,
}

impl<P> NgramIndex<P> {
    /// Build an index of n-gram order `order` from `(key, payload)` pairs.
    ///
    /// Empty keys are skipped; an empty input yields an empty index.
    pub fn build<I>(order: usize, items: I) -> Self
    where
        I: IntoIterator<Item = (String, P)>,
    {
        assert!(order > 0, "n-gram order must be positive");

        let mut grouped: BTreeMap<String, Vec<P>> = BTreeMap::new();
        for (key, payload) in items {
            if key.is_empty() {
                continue;
            }
            grouped.entry(key).or_default().push(payload);
        }

        let (keys, payloads): (Vec<String>, Vec<Vec<P>>) = grouped.into_iter().unzip();
        let key_features = features_for_keys(&keys, order);

        let mut feature_ids: AHashMap<String, u32> = AHashMap::new();
        let mut postings: Vec<AHashMap<u32, Vec<u32>>> = Vec::new();
        let mut sizes = Vec::with_capacity(keys.len());

        for (key_id, features) in key_features.into_iter().enumerate() {
            let size = features.len();
            sizes.push(size);
            if postings.len() <= size {
                postings.resize_with(size + 1, AHashMap::new);
            }
            for feature in features {
                let next_id = feature_ids.len() as u32;
                let feature_id = *feature_ids.entry(feature).or_insert(next_id);
                postings[size]
                    .entry(feature_id)
                    .or_default()
                    .push(key_id as u32);
            }
        }

        Self {
            order,
            strategy: Strategy::default(),
            keys,
            payloads,
            sizes,
            feature_ids,
            postings,
        }
    }

    /// Select the retrieval strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// N-gram order this index was built with.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Stored keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Keys with their payloads, in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[P])> {
        self.keys
            .iter()
            .zip(self.payloads.iter())
            .map(|(k, p)| (k.as_str(), p.as_slice()))
    }

    /// Payloads stored under an exact key.
    pub fn payloads(&self, key: &str) -> &[P] {
        match self.keys.binary_search_by(|k| k.as_str().cmp(key)) {
            Ok(id) => &self.payloads[id],
            Err(_) => &[],
        }
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            key_count: self.keys.len(),
            payload_count: self.payloads.iter().map(Vec::len).sum(),
            feature_count: self.feature_ids.len(),
        }
    }

    /// Return every stored key whose similarity to `query` under `measure`
    /// is at least `threshold`, in ascending key order.
    ///
    /// An empty query yields no keys. A threshold outside (0, 1] is an error.
    pub fn retrieve(&self, query: &str, measure: Measure, threshold: f64) -> Result<Vec<&str>> {
        let threshold = validate_threshold(threshold)?;
        let query_features = extract_features(query, self.order);
        if query_features.is_empty() || self.keys.is_empty() {
            return Ok(Vec::new());
        }

        let ids = match self.strategy {
            Strategy::CpMerge => self.cpmerge(&query_features, measure, threshold),
            Strategy::Linear => self.linear(&query_features, measure, threshold),
        };

        Ok(ids.into_iter().map(|id| self.keys[id].as_str()).collect())
    }

    fn cpmerge(&self, query_features: &[String], measure: Measure, threshold: f64) -> Vec<usize> {
        let q = query_features.len();
        let query_ids: Vec<Option<u32>> = query_features
            .iter()
            .map(|f| self.feature_ids.get(f).copied())
            .collect();

        let min_size = measure.min_size(q, threshold);
        let max_size = measure
            .max_size(q, threshold)
            .min(self.postings.len().saturating_sub(1));

        let mut hits = Vec::new();
        for size in min_size..=max_size {
            let partition = &self.postings[size];
            if partition.is_empty() {
                continue;
            }

            let tau = measure.min_overlap(q, size, threshold);
            if tau > q.min(size) {
                continue;
            }

            let mut lists: Vec<&[u32]> = query_ids
                .iter()
                .map(|id| {
                    id.and_then(|id| partition.get(&id))
                        .map_or(&[][..], Vec::as_slice)
                })
                .collect();
            lists.sort_by_key(|list| list.len());

            // Candidate generation from the shortest |X| - τ + 1 lists
            let split = q - tau + 1;
            let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
            for list in &lists[..split] {
                for &key_id in *list {
                    *counts.entry(key_id).or_insert(0) += 1;
                }
            }

            // Verification against the remaining lists
            for (position, list) in lists.iter().enumerate().skip(split) {
                if counts.is_empty() {
                    break;
                }
                let remaining = q - position - 1;
                counts.retain(|key_id, count| {
                    if list.binary_search(key_id).is_ok() {
                        *count += 1;
                    }
                    *count + remaining >= tau
                });
            }

            for (key_id, overlap) in counts {
                if overlap >= tau && measure.similarity(q, size, overlap) >= threshold {
                    hits.push(key_id as usize);
                }
            }
        }

        hits.sort_unstable();
        hits
    }

    fn linear(&self, query_features: &[String], measure: Measure, threshold: f64) -> Vec<usize> {
        let query_set: HashSet<&str> = query_features.iter().map(String::as_str).collect();

        self.keys
            .iter()
            .enumerate()
            .filter(|(id, key)| {
                let features = extract_features(key, self.order);
                let overlap = features
                    .iter()
                    .filter(|f| query_set.contains(f.as_str()))
                    .count();
                measure.similarity(query_set.len(), self.sizes[*id], overlap) >= threshold
            })
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(feature = "parallel")]
fn features_for_keys(keys: &[String], order: usize) -> Vec<Vec<String>> {
    keys.par_iter()
        .map(|key| extract_features(key, order))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn features_for_keys(keys: &[String], order: usize) -> Vec<Vec<String>> {
    keys.iter().map(|key| extract_features(key, order)).collect()
}
