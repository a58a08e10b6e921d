//! The branch table: a sparse map from site pattern to accumulated
//! branch length.

use crate::base::TipId;
use crate::errors::ModelError;
use std::collections::HashMap;

/// Sparse accumulator keyed by tip-set bitmask.
///
/// Keys are never the empty set, and tabulation never inserts the reserved
/// all-samples pattern. Values are plain `f64` sums.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchTab {
    map: HashMap<TipId, f64>,
}

impl BranchTab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `len` to the entry for `pat`, creating it if absent.
    pub fn add(&mut self, pat: TipId, len: f64) {
        debug_assert_ne!(pat, 0, "empty site pattern");
        *self.map.entry(pat).or_insert(0.0) += len;
    }

    /// Accumulated value for `pat`, or zero if absent.
    pub fn get(&self, pat: TipId) -> f64 {
        self.map.get(&pat).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TipId, f64)> + '_ {
        self.map.iter().map(|(&k, &v)| (k, v))
    }

    /// Sum another table into this one, key by key.
    pub fn merge(&mut self, other: &BranchTab) {
        for (&pat, &len) in &other.map {
            *self.map.entry(pat).or_insert(0.0) += len;
        }
    }

    /// Multiply every value by `c`.
    pub fn scale(&mut self, c: f64) {
        for v in self.map.values_mut() {
            *v *= c;
        }
    }

    /// Divide every value by `c`.
    pub fn divide_by(&mut self, c: f64) {
        for v in self.map.values_mut() {
            *v /= c;
        }
    }

    /// Sum of all values.
    pub fn sum(&self) -> f64 {
        self.map.values().sum()
    }

    /// Divide every value by the total, turning the table into a
    /// probability distribution. Fails on an empty or zero-sum table.
    pub fn normalize(&mut self) -> Result<(), ModelError> {
        let total = self.sum();
        if !(total > 0.0) {
            return Err(ModelError::EmptyBranchTab);
        }
        self.divide_by(total);
        Ok(())
    }

    /// Subtract `other` from this table, aligning on the union of keys.
    pub fn sub(&mut self, other: &BranchTab) {
        for (&pat, &len) in &other.map {
            *self.map.entry(pat).or_insert(0.0) -= len;
        }
    }

    /// Kullback-Leibler divergence `sum o(b) ln(o(b)/e(b))` over patterns
    /// with positive observed mass. Fails if any such pattern is missing
    /// from (or zero in) the estimate.
    pub fn kl_divergence(observed: &BranchTab, estimated: &BranchTab) -> Result<f64, ModelError> {
        let mut kl = 0.0;
        for (&pat, &o) in &observed.map {
            if o <= 0.0 {
                continue;
            }
            let e = estimated.get(pat);
            if e <= 0.0 {
                return Err(ModelError::MissingPattern(pat));
            }
            kl += o * (o / e).ln();
        }
        Ok(kl)
    }

    /// Parallel `(patterns, values)` arrays sorted ascending by bitmask.
    pub fn to_arrays(&self) -> (Vec<TipId>, Vec<f64>) {
        let mut entries: Vec<(TipId, f64)> = self.iter().collect();
        entries.sort_by_key(|&(pat, _)| pat);
        entries.into_iter().unzip()
    }
}
