//! Encoding a layer-pruning decision as a MaxSAT problem.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

use crate::Colour;
use crate::error::Result;
use crate::maxsat::{MaxSatClause, MaxSatProblem, MaxSatSolution};

/// Live colours grouped by identical corpus columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquivalenceGroups {
    group_of: BTreeMap<Colour, usize>,
    /// Members of each group in ascending id order.
    members: Vec<Vec<Colour>>,
}

impl EquivalenceGroups {
    /// Group colours by key. Colours must arrive in ascending order so that
    /// each group's first member is its lowest id.
    pub fn from_keys<K, I>(colours: I) -> Self
    where
        K: Hash + Eq,
        I: IntoIterator<Item = (Colour, K)>,
    {
        let mut index: HashMap<K, usize> = HashMap::new();
        let mut groups = EquivalenceGroups::default();
        for (colour, key) in colours {
            let next = groups.members.len();
            let group = *index.entry(key).or_insert(next);
            if group == next {
                groups.members.push(Vec::new());
            }
            groups.members[group].push(colour);
            groups.group_of.insert(colour, group);
        }
        groups
    }

    pub fn group_of(&self, colour: Colour) -> Option<usize> {
        self.group_of.get(&colour).copied()
    }

    pub fn members(&self, group: usize) -> &[Colour] {
        &self.members[group]
    }

    pub fn groups(&self) -> impl Iterator<Item = &[Colour]> + '_ {
        self.members.iter().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// What a formulation sees of the engine while a layer is being pruned.
#[derive(Debug, Clone)]
pub struct LayerSnapshot {
    pub layer: usize,
    /// Live colour → the layer that introduced it, for every layer up to
    /// `layer`.
    pub colour_layers: BTreeMap<Colour, usize>,
    pub groups: EquivalenceGroups,
}

impl LayerSnapshot {
    /// Colours introduced at the layer being pruned.
    pub fn current_colours(&self) -> impl Iterator<Item = Colour> + '_ {
        self.colour_layers
            .iter()
            .filter(move |(_, l)| **l == self.layer)
            .map(|(&c, _)| c)
    }
}

/// A MaxSAT problem whose variables stand for retaining colours.
#[derive(Debug, Clone)]
pub struct Formulation {
    pub problem: MaxSatProblem,
    pub variables: BTreeMap<u32, Colour>,
}

impl Formulation {
    /// Colours whose retention variable the solver set to false. Variables
    /// missing from the solution are kept.
    pub fn pruned(&self, solution: &MaxSatSolution) -> BTreeSet<Colour> {
        self.variables
            .iter()
            .filter(|(v, _)| solution.get(v) == Some(&false))
            .map(|(_, &c)| c)
            .collect()
    }
}

pub trait LayerFormulation {
    /// `None` when there is nothing to decide at this layer.
    fn formulate(&self, snapshot: &LayerSnapshot) -> Result<Option<Formulation>>;
}

/// Minimise the retained colours of the current layer while keeping at
/// least one member of every equivalence group that has no older member.
#[derive(Debug, Clone, Copy, Default)]
pub struct EquivalenceFormulation;

impl LayerFormulation for EquivalenceFormulation {
    fn formulate(&self, snapshot: &LayerSnapshot) -> Result<Option<Formulation>> {
        let variable_of: BTreeMap<Colour, u32> = snapshot
            .current_colours()
            .zip(1u32..)
            .collect();
        if variable_of.is_empty() {
            return Ok(None);
        }

        let mut clauses = Vec::new();
        for group in snapshot.groups.groups() {
            let has_older = group
                .iter()
                .any(|c| snapshot.colour_layers.get(c).is_some_and(|&l| l < snapshot.layer));
            if has_older {
                continue;
            }
            let keep: Vec<u32> = group.iter().filter_map(|c| variable_of.get(c).copied()).collect();
            if keep.is_empty() {
                continue;
            }
            let n = keep.len();
            clauses.push(MaxSatClause::hard(keep, vec![false; n])?);
        }
        for &variable in variable_of.values() {
            clauses.push(MaxSatClause::soft(vec![variable], vec![true], 1)?);
        }

        Ok(Some(Formulation {
            problem: MaxSatProblem::new(clauses),
            variables: variable_of.into_iter().map(|(c, v)| (v, c)).collect(),
        }))
    }
}
