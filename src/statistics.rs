//! Colour occurrence statistics gathered during collection.

use std::collections::{BTreeMap, HashMap};

use crate::{Colour, UNSEEN_COLOUR};

/// Per-colour occurrence counts, keyed by the data item that produced them.
#[derive(Debug, Clone, Default)]
pub struct ColourStatistics {
    counts: HashMap<Colour, BTreeMap<usize, usize>>,
}

impl ColourStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, colour: Colour, data_index: usize) {
        *self
            .counts
            .entry(colour)
            .or_default()
            .entry(data_index)
            .or_insert(0) += 1;
    }

    /// Occurrences of `colour` summed over every data item.
    pub fn total(&self, colour: Colour) -> usize {
        self.counts
            .get(&colour)
            .map(|per_item| per_item.values().sum())
            .unwrap_or(0)
    }

    /// Fold the counts of every pruned colour into its representative.
    pub fn merge(&mut self, remap: &BTreeMap<Colour, Colour>) {
        for (&pruned, &representative) in remap {
            let Some(moved) = self.counts.remove(&pruned) else {
                continue;
            };
            if representative == UNSEEN_COLOUR {
                continue;
            }
            let target = self.counts.entry(representative).or_default();
            for (data_index, n) in moved {
                *target.entry(data_index).or_insert(0) += n;
            }
        }
    }
}
