//! Seam to the planning-task graph builders.

use crate::graph::WlGraph;

/// Turns planning states into graphs. `set_problem` must be called before
/// converting any state of that problem.
pub trait GraphGenerator {
    type Problem;
    type State;

    fn set_problem(&mut self, problem: &Self::Problem);

    fn to_graph(&self, state: &Self::State) -> WlGraph;
}

/// The training states of one planning problem.
#[derive(Debug, Clone)]
pub struct ProblemDataset<P, S> {
    pub problem: P,
    pub states: Vec<S>,
}

impl<P, S> ProblemDataset<P, S> {
    pub fn new(problem: P, states: Vec<S>) -> Self {
        Self { problem, states }
    }
}

/// Total number of states across a dataset.
pub fn n_states<P, S>(data: &[ProblemDataset<P, S>]) -> usize {
    data.iter().map(|d| d.states.len()).sum()
}
