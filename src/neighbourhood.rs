//! Canonical node neighbourhoods used as refinement signatures.

use serde::{Deserialize, Serialize};

use crate::{Colour, EdgeLabel, UNSEEN_COLOUR};

/// Whether repeated (colour, edge label) pairs count once or once per edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOrMultiset {
    #[default]
    Set,
    Multiset,
}

/// A node's colour together with the sorted colours of its out-neighbours
/// and the labels of the edges leading to them.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Neighbourhood {
    node_colour: Colour,
    neighbour_colours: Vec<(Colour, EdgeLabel)>,
}

impl Neighbourhood {
    pub fn node_colour(&self) -> Colour {
        self.node_colour
    }

    pub fn neighbour_colours(&self) -> &[(Colour, EdgeLabel)] {
        &self.neighbour_colours
    }
}

/// Outcome of aggregating one node's neighbourhood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    Resolved(Neighbourhood),
    /// The node or one of its neighbours carries [`UNSEEN_COLOUR`].
    Unresolved,
}

/// A [`Neighbourhood`] factory holding the set/multiset choice for an engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighbourhoodFactory {
    set_or_multiset: SetOrMultiset,
}

impl NeighbourhoodFactory {
    pub fn new(set_or_multiset: SetOrMultiset) -> Self {
        Self { set_or_multiset }
    }

    /// Create a new [`Neighbourhood`] from a node colour and a list of
    /// neighbour colours, without checking for unseen colours.
    pub fn create_neighbourhood(
        &self,
        node_colour: Colour,
        mut neighbour_colours: Vec<(Colour, EdgeLabel)>,
    ) -> Neighbourhood {
        neighbour_colours.sort_unstable();

        match self.set_or_multiset {
            SetOrMultiset::Set => {
                neighbour_colours.dedup();
            }
            SetOrMultiset::Multiset => {}
        }

        Neighbourhood {
            node_colour,
            neighbour_colours,
        }
    }

    /// Build the neighbourhood of a node, stopping at the first unseen
    /// colour.
    pub fn aggregate<I>(&self, node_colour: Colour, neighbours: I) -> Aggregate
    where
        I: IntoIterator<Item = (Colour, EdgeLabel)>,
    {
        if node_colour == UNSEEN_COLOUR {
            return Aggregate::Unresolved;
        }
        let neighbours = neighbours.into_iter();
        let mut neighbour_colours = Vec::with_capacity(neighbours.size_hint().0);
        for (colour, label) in neighbours {
            if colour == UNSEEN_COLOUR {
                return Aggregate::Unresolved;
            }
            neighbour_colours.push((colour, label));
        }
        Aggregate::Resolved(self.create_neighbourhood(node_colour, neighbour_colours))
    }
}
