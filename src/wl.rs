//! Weisfeiler-Leman colour refinement over a corpus of graphs.
//!
//! Collection runs every iteration over the whole corpus before the next
//! starts, inserting new signatures into the colour table and pruning after
//! each iteration. Embedding afterwards resolves signatures against the
//! frozen table only.

use std::collections::{BTreeMap, BTreeSet};

use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use crate::colour_table::{ColourKey, ColourTable};
use crate::config::WlConfig;
use crate::error::{Result, WlError};
use crate::features::FeatureVector;
use crate::formulation::{EquivalenceFormulation, LayerFormulation};
use crate::graph::{WlGraph, adjacency};
use crate::neighbourhood::{Aggregate, NeighbourhoodFactory};
use crate::planning::{GraphGenerator, ProblemDataset, n_states};
use crate::solver::{ExternalSolver, MaxSatSolver};
use crate::statistics::ColourStatistics;
use crate::{Colour, UNSEEN_COLOUR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fresh,
    Collecting,
    Collected,
}

pub struct WlFeatures {
    pub(crate) config: WlConfig,
    /// Effective iteration bound; narrowed while a layer is pruned.
    pub(crate) iterations: usize,
    pub(crate) phase: Phase,
    pub(crate) table: ColourTable,
    pub(crate) statistics: ColourStatistics,
    factory: NeighbourhoodFactory,
    pub(crate) solver: Box<dyn MaxSatSolver>,
    pub(crate) formulation: Box<dyn LayerFormulation>,
    /// Live colour → dense feature position, fixed once collected.
    vocabulary: BTreeMap<Colour, usize>,
}

impl WlFeatures {
    pub fn new(config: WlConfig) -> Self {
        let solver = ExternalSolver::new(&config.maxsat);
        Self {
            iterations: config.iterations,
            phase: Phase::Fresh,
            table: ColourTable::new(),
            statistics: ColourStatistics::new(),
            factory: NeighbourhoodFactory::new(config.hash),
            solver: Box::new(solver),
            formulation: Box::new(EquivalenceFormulation),
            vocabulary: BTreeMap::new(),
            config,
        }
    }

    /// Replace the MaxSAT backend used by layer pruning.
    pub fn with_solver(mut self, solver: impl MaxSatSolver + 'static) -> Self {
        self.solver = Box::new(solver);
        self
    }

    pub fn with_formulation(mut self, formulation: impl LayerFormulation + 'static) -> Self {
        self.formulation = Box::new(formulation);
        self
    }

    pub fn config(&self) -> &WlConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn is_collected(&self) -> bool {
        self.phase == Phase::Collected
    }

    /// Live colours up to the current iteration bound.
    pub fn n_features(&self) -> usize {
        self.table.live_colours_up_to(self.iterations).count()
    }

    /// Layer that introduced a live colour.
    pub fn colour_layer(&self, colour: Colour) -> Option<usize> {
        if self.table.is_live(colour) {
            self.table.layer(colour)
        } else {
            None
        }
    }

    /// Live colour ids in dense feature order.
    pub fn vocabulary(&self) -> impl Iterator<Item = Colour> + '_ {
        self.vocabulary.keys().copied()
    }

    /// Collect colours over `graphs` and freeze the vocabulary. Returns the
    /// feature vector of every graph as it stands at the end of the pass.
    pub fn collect(&mut self, graphs: &[WlGraph]) -> Result<Vec<FeatureVector>> {
        self.collect_from(&mut Graphs(graphs))
    }

    /// Like [`collect`](Self::collect), but over planning states that are
    /// turned into graphs on demand, once per iteration.
    pub fn collect_dataset<G: GraphGenerator>(
        &mut self,
        generator: &mut G,
        data: &[ProblemDataset<G::Problem, G::State>],
    ) -> Result<Vec<FeatureVector>> {
        self.collect_from(&mut States { generator, data })
    }

    fn collect_from(&mut self, source: &mut dyn GraphSource) -> Result<Vec<FeatureVector>> {
        if self.phase != Phase::Fresh {
            return Err(WlError::AlreadyCollected);
        }
        self.phase = Phase::Collecting;
        let n_items = source.n_items();
        let mut corpus = InFlight::with_capacity(n_items);

        log_iteration(0);
        source.for_each_graph(&mut |data_index, graph| {
            let colours = self.initial_colours(graph, data_index);
            corpus.push(colours);
            Ok(())
        })?;
        corpus.accumulate();

        for itr in 1..=self.iterations {
            log_iteration(itr);
            let pb = self.progress_bar(n_items, itr);
            source.for_each_graph(&mut |data_index, graph| {
                self.refine_collecting(graph, &mut corpus, data_index, itr)?;
                pb.inc(1);
                Ok(())
            })?;
            pb.finish_and_clear();

            self.prune_this_iteration(itr, &mut corpus)?;
            corpus.accumulate();
        }

        self.phase = Phase::Collected;
        self.vocabulary = self
            .table
            .live_colours()
            .enumerate()
            .map(|(i, c)| (c, i))
            .collect();
        info!("Collected {} features.", self.vocabulary.len());
        Ok(corpus.features)
    }

    fn initial_colours(&mut self, graph: &WlGraph, data_index: usize) -> Vec<Colour> {
        let mut colours = Vec::with_capacity(graph.node_count());
        for label in graph.node_weights() {
            let colour = self
                .table
                .resolve(ColourKey::initial(label.as_str()), true)
                .unwrap_or(UNSEEN_COLOUR);
            self.statistics.record(colour, data_index);
            colours.push(colour);
        }
        colours
    }

    fn refine_collecting(
        &mut self,
        graph: &WlGraph,
        corpus: &mut InFlight,
        data_index: usize,
        iteration: usize,
    ) -> Result<()> {
        let (active, colours) = corpus.slot_mut(data_index)?;
        if colours.len() != graph.node_count() {
            return Err(WlError::config(format!(
                "graph {data_index} has {} nodes at iteration {iteration} but {} before",
                graph.node_count(),
                colours.len()
            )));
        }
        let table = &mut self.table;
        let statistics = &mut self.statistics;
        refine(&self.factory, graph, active, colours, iteration, |key| {
            let colour = table.resolve(key, true)?;
            statistics.record(colour, data_index);
            Some(colour)
        });
        Ok(())
    }

    fn ensure_collected(&self) -> Result<()> {
        if self.phase == Phase::Collected {
            Ok(())
        } else {
            Err(WlError::NotCollected)
        }
    }

    fn frozen_initial_colours(&self, graph: &WlGraph) -> Vec<Colour> {
        graph
            .node_weights()
            .map(|label| {
                self.table
                    .get(&ColourKey::initial(label.as_str()))
                    .unwrap_or(UNSEEN_COLOUR)
            })
            .collect()
    }

    /// Embed one graph against the frozen vocabulary. Nodes whose
    /// signature was never collected stop contributing from that iteration on.
    pub fn embed(&self, graph: &WlGraph) -> Result<FeatureVector> {
        self.ensure_collected()?;
        let mut x = FeatureVector::new();
        let mut colours = self.frozen_initial_colours(graph);
        let mut active: BTreeSet<usize> = (0..colours.len())
            .filter(|&u| colours[u] != UNSEEN_COLOUR)
            .collect();
        x.add_colours(&colours);

        for itr in 1..=self.iterations {
            refine(&self.factory, graph, &mut active, &mut colours, itr, |key| {
                self.table.get(&key)
            });
            x.add_colours(&colours);
        }
        Ok(x)
    }

    /// Closed-vocabulary embedding that skips unseen-colour bookkeeping.
    /// Agrees with [`embed`](Self::embed) whenever every signature is known.
    pub fn embed_fast(&self, graph: &WlGraph) -> Result<FeatureVector> {
        self.ensure_collected()?;
        let mut x = FeatureVector::new();
        let mut colours = self.frozen_initial_colours(graph);
        x.add_colours(&colours);

        for itr in 1..=self.iterations {
            colours = refine_fast(&self.factory, &self.table, graph, &colours, itr);
            x.add_colours(&colours);
        }
        Ok(x)
    }

    /// Dense embedding of length [`n_features`](Self::n_features).
    pub fn embed_dense(&self, graph: &WlGraph) -> Result<Vec<usize>> {
        let x = self.embed(graph)?;
        Ok(self.to_dense(&x))
    }

    pub fn to_dense(&self, x: &FeatureVector) -> Vec<usize> {
        let mut dense = vec![0; self.vocabulary.len()];
        for (colour, n) in x.iter() {
            if let Some(&i) = self.vocabulary.get(&colour) {
                dense[i] += n;
            }
        }
        dense
    }

    fn progress_bar(&self, len: usize, iteration: usize) -> ProgressBar {
        if self.config.quiet {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::with_template("[wl {msg}] {wide_bar:.cyan/blue} {pos}/{len} {elapsed_precise}")
        {
            pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        pb.set_message(format!("itr {iteration}"));
        pb
    }
}

fn log_iteration(iteration: usize) {
    info!("Refining iteration {iteration}.");
}

/// One refinement step. Nodes that fail to resolve get [`UNSEEN_COLOUR`]
/// and leave `active` for good.
fn refine<F>(
    factory: &NeighbourhoodFactory,
    graph: &WlGraph,
    active: &mut BTreeSet<usize>,
    colours: &mut Vec<Colour>,
    iteration: usize,
    mut resolve: F,
) where
    F: FnMut(ColourKey) -> Option<Colour>,
{
    let mut new_colours = vec![UNSEEN_COLOUR; colours.len()];
    let mut discarded = Vec::new();

    for &u in active.iter() {
        let neighbours = adjacency(graph, u).map(|(label, v)| (colours[v], label));
        let resolved = match factory.aggregate(colours[u], neighbours) {
            Aggregate::Resolved(neighbourhood) => resolve(ColourKey::refined(iteration, neighbourhood)),
            Aggregate::Unresolved => None,
        };
        match resolved {
            Some(colour) => new_colours[u] = colour,
            None => discarded.push(u),
        }
    }

    for u in discarded {
        active.remove(&u);
    }
    *colours = new_colours;
}

fn refine_fast(
    factory: &NeighbourhoodFactory,
    table: &ColourTable,
    graph: &WlGraph,
    colours: &[Colour],
    iteration: usize,
) -> Vec<Colour> {
    (0..colours.len())
        .map(|u| {
            let neighbours = adjacency(graph, u).map(|(label, v)| (colours[v], label)).collect();
            let neighbourhood = factory.create_neighbourhood(colours[u], neighbours);
            table.get_fast(&ColourKey::refined(iteration, neighbourhood))
        })
        .collect()
}

/// Per-item working state of a collection pass.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    pub(crate) colours: Vec<Vec<Colour>>,
    active: Vec<BTreeSet<usize>>,
    /// Counts of every finished iteration.
    pub(crate) features: Vec<FeatureVector>,
}

impl InFlight {
    fn with_capacity(n: usize) -> Self {
        Self {
            colours: Vec::with_capacity(n),
            active: Vec::with_capacity(n),
            features: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(&mut self, colours: Vec<Colour>) {
        self.active.push(
            (0..colours.len())
                .filter(|&u| colours[u] != UNSEEN_COLOUR)
                .collect(),
        );
        self.colours.push(colours);
        self.features.push(FeatureVector::new());
    }

    pub(crate) fn len(&self) -> usize {
        self.colours.len()
    }

    fn slot_mut(&mut self, index: usize) -> Result<(&mut BTreeSet<usize>, &mut Vec<Colour>)> {
        let n = self.colours.len();
        match (self.active.get_mut(index), self.colours.get_mut(index)) {
            (Some(active), Some(colours)) => Ok((active, colours)),
            _ => Err(WlError::config(format!(
                "corpus produced item {index} during refinement but only {n} initially"
            ))),
        }
    }

    /// Fold the current iteration's colours into the finished counts.
    pub(crate) fn accumulate(&mut self) {
        for (x, colours) in self.features.iter_mut().zip(&self.colours) {
            x.add_colours(colours);
        }
    }

    /// Finished counts plus the iteration still being decided.
    pub(crate) fn layer_features(&self) -> impl Iterator<Item = FeatureVector> + '_ {
        self.features.iter().zip(&self.colours).map(|(x, colours)| {
            let mut x = x.clone();
            x.add_colours(colours);
            x
        })
    }

    pub(crate) fn apply_remap(&mut self, remap: &BTreeMap<Colour, Colour>) {
        for colours in &mut self.colours {
            for colour in colours.iter_mut() {
                if let Some(&representative) = remap.get(colour) {
                    *colour = representative;
                }
            }
        }
        for x in &mut self.features {
            x.remap(remap);
        }
    }
}

trait GraphSource {
    fn n_items(&self) -> usize;

    /// Visit every item's graph in corpus order.
    fn for_each_graph(&mut self, visit: &mut dyn FnMut(usize, &WlGraph) -> Result<()>) -> Result<()>;
}

struct Graphs<'a>(&'a [WlGraph]);

impl GraphSource for Graphs<'_> {
    fn n_items(&self) -> usize {
        self.0.len()
    }

    fn for_each_graph(&mut self, visit: &mut dyn FnMut(usize, &WlGraph) -> Result<()>) -> Result<()> {
        for (i, graph) in self.0.iter().enumerate() {
            visit(i, graph)?;
        }
        Ok(())
    }
}

struct States<'a, G: GraphGenerator> {
    generator: &'a mut G,
    data: &'a [ProblemDataset<G::Problem, G::State>],
}

impl<G: GraphGenerator> GraphSource for States<'_, G> {
    fn n_items(&self) -> usize {
        n_states(self.data)
    }

    fn for_each_graph(&mut self, visit: &mut dyn FnMut(usize, &WlGraph) -> Result<()>) -> Result<()> {
        let mut data_index = 0;
        for dataset in self.data {
            self.generator.set_problem(&dataset.problem);
            for state in &dataset.states {
                let graph = self.generator.to_graph(state);
                visit(data_index, &graph)?;
                data_index += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PruningStrategy;
    use crate::graph::{add_undirected_edge, labelled_graph};
    use crate::neighbourhood::SetOrMultiset;

    fn engine(iterations: usize, hash: SetOrMultiset) -> WlFeatures {
        WlFeatures::new(WlConfig::new(iterations, PruningStrategy::None, hash).quiet(true))
    }

    fn edge_pair() -> WlGraph {
        let mut g = labelled_graph(&["p", "p"], &[]);
        add_undirected_edge(&mut g, 0, 1, 0);
        g
    }

    #[test]
    fn symmetric_pair_has_two_features_of_weight_two() {
        let mut wl = engine(2, SetOrMultiset::Set);
        let collected = wl.collect(&[edge_pair()]).unwrap();
        let x = &collected[0];
        // iteration 0 and 1 each collapse both nodes into one colour; at
        // iteration 2 the refinement is stable but the signature is new
        assert_eq!(wl.n_features(), 3);
        assert!(x.iter().all(|(_, n)| n == 2));

        let mut wl = engine(1, SetOrMultiset::Set);
        let x = wl.collect(&[edge_pair()]).unwrap().remove(0);
        assert_eq!(x.nnz(), 2);
        assert_eq!(x.iter().map(|(_, n)| n).collect::<Vec<_>>(), vec![2, 2]);
    }

    #[test]
    fn zero_iterations_counts_labels_only() {
        let mut wl = engine(0, SetOrMultiset::Set);
        let g = labelled_graph(&["p", "q", "p"], &[(0, 1, 0)]);
        let x = wl.collect(&[g]).unwrap().remove(0);
        assert_eq!(x.iter().collect::<Vec<_>>(), vec![(0, 2), (1, 1)]);
    }

    #[test]
    fn phases_are_enforced() {
        let mut wl = engine(1, SetOrMultiset::Set);
        assert!(matches!(wl.embed(&edge_pair()), Err(WlError::NotCollected)));
        wl.collect(&[edge_pair()]).unwrap();
        assert!(matches!(wl.collect(&[edge_pair()]), Err(WlError::AlreadyCollected)));
        assert_eq!(wl.phase(), Phase::Collected);
    }

    #[test]
    fn dropped_nodes_keep_their_earlier_counts() {
        let mut wl = engine(2, SetOrMultiset::Set);
        wl.collect(&[edge_pair()]).unwrap();

        // "r" is unknown, so node 1 never resolves and node 0 loses it as a
        // neighbour at iteration 1
        let mut g = labelled_graph(&["p", "r"], &[]);
        add_undirected_edge(&mut g, 0, 1, 0);
        let x = wl.embed(&g).unwrap();
        assert_eq!(x.iter().collect::<Vec<_>>(), vec![(0, 1)]);
    }

    #[test]
    fn fast_path_agrees_on_known_graphs() {
        let mut wl = engine(3, SetOrMultiset::Multiset);
        let mut g = labelled_graph(&["a", "b", "b", "c"], &[]);
        add_undirected_edge(&mut g, 0, 1, 0);
        add_undirected_edge(&mut g, 0, 2, 0);
        add_undirected_edge(&mut g, 2, 3, 1);
        wl.collect(std::slice::from_ref(&g)).unwrap();
        assert_eq!(wl.embed(&g).unwrap(), wl.embed_fast(&g).unwrap());

        let unknown = labelled_graph(&["a", "z"], &[(0, 1, 0)]);
        assert_eq!(wl.embed(&unknown).unwrap(), wl.embed_fast(&unknown).unwrap());
    }

    #[test]
    fn missing_corpus_slot_is_an_error() {
        let mut corpus = InFlight::with_capacity(1);
        corpus.push(vec![0, 1]);
        assert!(corpus.slot_mut(0).is_ok());
        assert!(matches!(corpus.slot_mut(1), Err(WlError::Config(_))));
    }

    #[test]
    fn dense_vector_follows_vocabulary_order() {
        let mut wl = engine(1, SetOrMultiset::Set);
        let g = labelled_graph(&["a", "b"], &[(0, 1, 0)]);
        wl.collect(std::slice::from_ref(&g)).unwrap();
        let dense = wl.embed_dense(&g).unwrap();
        assert_eq!(dense.len(), wl.n_features());
        assert_eq!(dense, vec![1, 1, 1, 1]);
        assert_eq!(wl.vocabulary().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(wl.colour_layer(2), Some(1));
    }
}
