//! The sample-label index.
//!
//! Maps tip names to bit positions and back. The index is kept separate
//! from the population network so that code which only formats or parses
//! site patterns need not know anything about segments.

use crate::base::tipset::{tip_bit, union_mask, TipId, MAX_SAMPLES};
use crate::errors::ModelError;
use serde::{Deserialize, Serialize};

/// Ordered sequence of sample names; sample `i` has bitmask `1 << i`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelIndex {
    names: Vec<String>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new sample name and return its bitmask.
    pub fn add(&mut self, name: impl Into<String>) -> Result<TipId, ModelError> {
        let name = name.into();
        if self.names.len() == MAX_SAMPLES {
            return Err(ModelError::TooManySamples(self.names.len() + 1));
        }
        if self.names.iter().any(|n| *n == name) {
            return Err(ModelError::DuplicateLabel(name));
        }
        self.names.push(name);
        Ok(tip_bit(self.names.len() - 1))
    }

    /// Number of registered samples.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of sample `i`.
    pub fn name(&self, i: usize) -> Option<&str> {
        self.names.get(i).map(String::as_str)
    }

    /// Bitmask of sample `i`.
    pub fn bit(&self, i: usize) -> Option<TipId> {
        (i < self.names.len()).then(|| tip_bit(i))
    }

    /// Bitmask of the sample with the given name.
    pub fn lookup(&self, name: &str) -> Option<TipId> {
        self.names.iter().position(|n| n == name).map(tip_bit)
    }

    /// The reserved all-samples bitmask.
    pub fn union_mask(&self) -> TipId {
        union_mask(self.names.len())
    }

    /// Format a tip set as `name:name:...`, low bit first.
    pub fn pattern_label(&self, pat: TipId) -> String {
        let mut parts = Vec::with_capacity(pat.count_ones() as usize);
        for (i, name) in self.names.iter().enumerate() {
            if pat & tip_bit(i) != 0 {
                parts.push(name.as_str());
            }
        }
        parts.join(":")
    }

    /// Parse a `name:name:...` pattern into a tip set. Label order within
    /// the pattern is irrelevant.
    pub fn parse_pattern(&self, s: &str) -> Result<TipId, String> {
        let mut pat: TipId = 0;
        for part in s.split(':') {
            let bit = self
                .lookup(part)
                .ok_or_else(|| format!("unknown sample label '{part}'"))?;
            pat |= bit;
        }
        Ok(pat)
    }
}
