//! Sparse per-graph feature counts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Colour, UNSEEN_COLOUR};

/// Sparse WL feature vector: colour id → occurrences over all nodes and
/// iterations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    counts: BTreeMap<Colour, usize>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` occurrences of `colour`. Unseen colours are not features.
    pub fn add(&mut self, colour: Colour, n: usize) {
        if colour == UNSEEN_COLOUR || n == 0 {
            return;
        }
        *self.counts.entry(colour).or_insert(0) += n;
    }

    /// Count one iteration's worth of node colours.
    pub fn add_colours(&mut self, colours: &[Colour]) {
        for &colour in colours {
            self.add(colour, 1);
        }
    }

    pub fn get(&self, colour: Colour) -> usize {
        self.counts.get(&colour).copied().unwrap_or(0)
    }

    pub fn remove(&mut self, colour: Colour) -> usize {
        self.counts.remove(&colour).unwrap_or(0)
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Colour, usize)> + '_ {
        self.counts.iter().map(|(&c, &n)| (c, n))
    }

    /// Rewrite the entries of pruned colours onto their representatives.
    pub(crate) fn remap(&mut self, remap: &BTreeMap<Colour, Colour>) {
        for (&pruned, &representative) in remap {
            let n = self.remove(pruned);
            self.add(representative, n);
        }
    }
}
