//! Weisfeiler-Leman feature vectors for graphs of planning states.
//!
//! [`WlFeatures`] collects a vocabulary of colours over a training corpus,
//! optionally pruning redundant or rare colours after every iteration, and
//! then embeds new graphs against that frozen vocabulary.
//!
//! ```
//! use wl_features::{PruningStrategy, SetOrMultiset, WlConfig, WlFeatures};
//! use wl_features::graph::{add_undirected_edge, labelled_graph};
//!
//! let mut g = labelled_graph(&["p", "p"], &[]);
//! add_undirected_edge(&mut g, 0, 1, 0);
//!
//! let config = WlConfig::new(1, PruningStrategy::None, SetOrMultiset::Set).quiet(true);
//! let mut wl = WlFeatures::new(config);
//! wl.collect(std::slice::from_ref(&g))?;
//! assert_eq!(wl.embed_dense(&g)?, vec![2, 2]);
//! # Ok::<(), wl_features::WlError>(())
//! ```

pub mod colour_table;
pub mod config;
pub mod error;
pub mod features;
pub mod formulation;
pub mod graph;
pub mod maxsat;
pub mod neighbourhood;
pub mod planning;
mod pruning;
pub mod solver;
pub mod statistics;
pub mod wl;

/// Colour id handed out by the colour table.
pub type Colour = i32;

pub type EdgeLabel = u32;

/// Marks a node whose signature is not in a frozen vocabulary.
pub const UNSEEN_COLOUR: Colour = -1;

pub use config::{MaxSatConfig, PruningStrategy, WlConfig};
pub use error::{Result, WlError};
pub use features::FeatureVector;
pub use formulation::{EquivalenceFormulation, LayerFormulation};
pub use graph::WlGraph;
pub use maxsat::{MaxSatClause, MaxSatProblem, MaxSatSolution};
pub use neighbourhood::SetOrMultiset;
pub use planning::{GraphGenerator, ProblemDataset};
pub use solver::{BruteForceSolver, ExternalSolver, MaxSatSolver};
pub use wl::{Phase, WlFeatures};
