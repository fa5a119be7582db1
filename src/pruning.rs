//! Layer pruning: deciding after each refinement iteration which colours to
//! collapse, and rewriting the in-flight colours to match.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Deref;

use log::info;

use crate::config::PruningStrategy;
use crate::error::Result;
use crate::formulation::{EquivalenceGroups, LayerSnapshot};
use crate::wl::{InFlight, Phase, WlFeatures};
use crate::{Colour, UNSEEN_COLOUR};

/// The engine viewed as if collection had stopped at `layer`. The original
/// iteration bound and phase come back when the scope is dropped, including
/// on early return through `?`.
pub(crate) struct LayerScope<'a> {
    features: &'a mut WlFeatures,
    saved_iterations: usize,
    saved_phase: Phase,
}

impl Deref for LayerScope<'_> {
    type Target = WlFeatures;

    fn deref(&self) -> &WlFeatures {
        self.features
    }
}

impl Drop for LayerScope<'_> {
    fn drop(&mut self) {
        self.features.iterations = self.saved_iterations;
        self.features.phase = self.saved_phase;
    }
}

impl WlFeatures {
    pub(crate) fn narrow_to_layer(&mut self, layer: usize) -> LayerScope<'_> {
        let saved_iterations = self.iterations;
        let saved_phase = self.phase;
        self.iterations = layer;
        self.phase = Phase::Collected;
        LayerScope {
            features: self,
            saved_iterations,
            saved_phase,
        }
    }

    pub(crate) fn prune_this_iteration(&mut self, iteration: usize, corpus: &mut InFlight) -> Result<()> {
        let strategy = self.config.pruning;
        if strategy == PruningStrategy::None {
            return Ok(());
        }

        let (to_prune, groups) = {
            let scope = self.narrow_to_layer(iteration);
            let groups = scope.equivalence_groups(corpus);
            let to_prune = match strategy {
                PruningStrategy::None => BTreeSet::new(),
                PruningStrategy::Greedy => scope.prune_greedy(&groups),
                PruningStrategy::Frequency => scope.prune_frequency(corpus.len()),
                PruningStrategy::Maxsat => scope.prune_maxsat(&groups)?,
                PruningStrategy::MaxsatAndFrequency => {
                    let mut to_prune = scope.prune_maxsat(&groups)?;
                    to_prune.extend(scope.prune_frequency(corpus.len()));
                    to_prune
                }
            };
            (to_prune, groups)
        };

        if to_prune.is_empty() {
            return Ok(());
        }
        info!("Pruning {} features.", to_prune.len());
        let remap = representatives(&to_prune, &groups);
        self.table.apply_remap(&remap);
        self.statistics.merge(&remap);
        corpus.apply_remap(&remap);
        Ok(())
    }
}

impl LayerScope<'_> {
    fn layer(&self) -> usize {
        self.iterations
    }

    /// Group live colours by their per-item occurrence counts over the
    /// layers in view.
    pub(crate) fn equivalence_groups(&self, corpus: &InFlight) -> EquivalenceGroups {
        let mut columns: HashMap<Colour, Vec<(usize, usize)>> = HashMap::new();
        for (item, x) in corpus.layer_features().enumerate() {
            for (colour, n) in x.iter() {
                columns.entry(colour).or_default().push((item, n));
            }
        }
        EquivalenceGroups::from_keys(
            self.table
                .live_colours_up_to(self.layer())
                .map(|c| (c, columns.remove(&c).unwrap_or_default())),
        )
    }

    /// Keep the first member of every group; prune the other members that
    /// this layer introduced.
    pub(crate) fn prune_greedy(&self, groups: &EquivalenceGroups) -> BTreeSet<Colour> {
        let layer = self.layer();
        groups
            .groups()
            .filter(|group| group.len() > 1)
            .flat_map(|group| group[1..].iter().copied())
            .filter(|&c| self.table.layer(c) == Some(layer))
            .collect()
    }

    /// Colours of this layer whose total count is at most 1% of the number
    /// of items. Earlier layers are fixed: later colours were built on them.
    pub(crate) fn prune_frequency(&self, n_items: usize) -> BTreeSet<Colour> {
        let layer = self.layer();
        let one_percent = n_items / 100;
        let to_prune: BTreeSet<Colour> = self
            .table
            .live_colours_up_to(layer)
            .filter(|&c| self.table.layer(c) == Some(layer))
            .filter(|&c| self.statistics.total(c) <= one_percent)
            .collect();
        info!("Pruning {} features with <1% frequency count.", to_prune.len());
        to_prune
    }

    pub(crate) fn prune_maxsat(&self, groups: &EquivalenceGroups) -> Result<BTreeSet<Colour>> {
        let layer = self.layer();
        let snapshot = LayerSnapshot {
            layer,
            colour_layers: self
                .table
                .live_colours_up_to(layer)
                .filter_map(|c| self.table.layer(c).map(|l| (c, l)))
                .collect(),
            groups: groups.clone(),
        };
        let Some(formulation) = self.formulation.formulate(&snapshot)? else {
            return Ok(BTreeSet::new());
        };
        info!("Solving MaxSAT for layer {layer}.");
        let solution = self.solver.solve(&formulation.problem)?;
        Ok(formulation.pruned(&solution))
    }
}

/// Map each pruned colour to the first surviving member of its group, or
/// to [`UNSEEN_COLOUR`] when the whole group goes.
pub(crate) fn representatives(
    to_prune: &BTreeSet<Colour>,
    groups: &EquivalenceGroups,
) -> BTreeMap<Colour, Colour> {
    to_prune
        .iter()
        .map(|&colour| {
            let representative = groups
                .group_of(colour)
                .and_then(|g| {
                    groups
                        .members(g)
                        .iter()
                        .copied()
                        .find(|m| !to_prune.contains(m))
                })
                .unwrap_or(UNSEEN_COLOUR);
            (colour, representative)
        })
        .collect()
}
