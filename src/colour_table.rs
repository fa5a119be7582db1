//! Canonical colour table: signature → stable colour id.
//!
//! Ids are handed out densely in the order signatures are first seen and are
//! never renumbered. Pruning retires ids: the signatures that produced a
//! retired id are rewritten to resolve to its representative, or forgotten
//! when it has none.

use std::collections::{BTreeMap, HashMap};

use crate::neighbourhood::Neighbourhood;
use crate::{Colour, UNSEEN_COLOUR};

/// Hash key of a colour: the initial label at iteration 0, or the
/// iteration-tagged neighbourhood afterwards.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum ColourKey {
    Initial(String),
    Refined {
        iteration: usize,
        neighbourhood: Neighbourhood,
    },
}

impl ColourKey {
    pub fn initial(label: impl Into<String>) -> Self {
        ColourKey::Initial(label.into())
    }

    pub fn refined(iteration: usize, neighbourhood: Neighbourhood) -> Self {
        ColourKey::Refined {
            iteration,
            neighbourhood,
        }
    }

    pub fn iteration(&self) -> usize {
        match self {
            ColourKey::Initial(_) => 0,
            ColourKey::Refined { iteration, .. } => *iteration,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColourTable {
    colours: HashMap<ColourKey, Colour>,
    /// Layer of every id ever allocated, indexed by id.
    layers: Vec<usize>,
    live: Vec<bool>,
}

impl ColourTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, allocating the next id for a new key when
    /// `allow_insert` is set. Returns `None` for an unknown key otherwise.
    pub fn resolve(&mut self, key: ColourKey, allow_insert: bool) -> Option<Colour> {
        if let Some(&colour) = self.colours.get(&key) {
            return Some(colour);
        }
        if !allow_insert {
            return None;
        }
        let colour = self.layers.len() as Colour;
        self.layers.push(key.iteration());
        self.live.push(true);
        self.colours.insert(key, colour);
        Some(colour)
    }

    /// Read-only lookup used once the vocabulary is frozen.
    pub fn get(&self, key: &ColourKey) -> Option<Colour> {
        self.colours.get(key).copied()
    }

    /// Lookup for the closed-vocabulary path: unknown keys map straight to
    /// [`UNSEEN_COLOUR`].
    pub fn get_fast(&self, key: &ColourKey) -> Colour {
        self.colours.get(key).copied().unwrap_or(UNSEEN_COLOUR)
    }

    /// Layer at which `colour` was first produced.
    pub fn layer(&self, colour: Colour) -> Option<usize> {
        usize::try_from(colour)
            .ok()
            .and_then(|i| self.layers.get(i).copied())
    }

    pub fn is_live(&self, colour: Colour) -> bool {
        usize::try_from(colour)
            .ok()
            .and_then(|i| self.live.get(i).copied())
            .unwrap_or(false)
    }

    /// Live ids in ascending order.
    pub fn live_colours(&self) -> impl Iterator<Item = Colour> + '_ {
        self.live
            .iter()
            .enumerate()
            .filter(|(_, live)| **live)
            .map(|(i, _)| i as Colour)
    }

    /// Live ids introduced at or before `layer`, ascending.
    pub fn live_colours_up_to(&self, layer: usize) -> impl Iterator<Item = Colour> + '_ {
        self.live_colours()
            .filter(move |&c| self.layers[c as usize] <= layer)
    }

    /// Retire every key of `remap`, redirecting its signatures to the
    /// mapped representative or dropping them when it maps to
    /// [`UNSEEN_COLOUR`].
    pub fn apply_remap(&mut self, remap: &BTreeMap<Colour, Colour>) {
        for &pruned in remap.keys() {
            if let Some(live) = usize::try_from(pruned).ok().and_then(|i| self.live.get_mut(i)) {
                *live = false;
            }
        }
        self.colours.retain(|_, colour| match remap.get(colour) {
            None => true,
            Some(&UNSEEN_COLOUR) => false,
            Some(&representative) => {
                *colour = representative;
                true
            }
        });
        debug_assert!(
            remap
                .values()
                .all(|&r| r == UNSEEN_COLOUR || self.is_live(r)),
            "pruning remapped a colour onto a retired id"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbourhood::{NeighbourhoodFactory, SetOrMultiset};

    fn refined(iteration: usize, own: Colour, neighbours: Vec<(Colour, u32)>) -> ColourKey {
        let factory = NeighbourhoodFactory::new(SetOrMultiset::Set);
        ColourKey::refined(iteration, factory.create_neighbourhood(own, neighbours))
    }

    #[test]
    fn ids_are_dense_and_stable() {
        let mut table = ColourTable::new();
        assert_eq!(table.resolve(ColourKey::initial("p"), true), Some(0));
        assert_eq!(table.resolve(ColourKey::initial("q"), true), Some(1));
        assert_eq!(table.resolve(ColourKey::initial("p"), true), Some(0));
        assert_eq!(table.resolve(refined(1, 0, vec![(1, 0)]), true), Some(2));
        assert_eq!(table.layer(2), Some(1));
        assert_eq!(table.layer(0), Some(0));
        assert_eq!(table.live_colours().count(), 3);
    }

    #[test]
    fn iteration_is_part_of_the_signature() {
        let mut table = ColourTable::new();
        let a = table.resolve(refined(1, 0, vec![]), true);
        let b = table.resolve(refined(2, 0, vec![]), true);
        assert_ne!(a, b);
    }

    #[test]
    fn frozen_lookup_never_allocates() {
        let mut table = ColourTable::new();
        table.resolve(ColourKey::initial("p"), true);
        assert_eq!(table.resolve(ColourKey::initial("z"), false), None);
        assert_eq!(table.get_fast(&ColourKey::initial("z")), UNSEEN_COLOUR);
        assert_eq!(table.resolve(ColourKey::initial("y"), true), Some(1));
    }

    #[test]
    fn remap_redirects_or_forgets_signatures() {
        let mut table = ColourTable::new();
        table.resolve(ColourKey::initial("a"), true);
        table.resolve(ColourKey::initial("b"), true);
        table.resolve(ColourKey::initial("c"), true);

        let remap = BTreeMap::from([(1, 0), (2, UNSEEN_COLOUR)]);
        table.apply_remap(&remap);

        assert_eq!(table.get(&ColourKey::initial("b")), Some(0));
        assert_eq!(table.get(&ColourKey::initial("c")), None);
        assert_eq!(table.live_colours().collect::<Vec<_>>(), vec![0]);
        // retired ids keep their layer and are never handed out again
        assert_eq!(table.layer(2), Some(0));
        assert_eq!(table.resolve(ColourKey::initial("d"), true), Some(3));
    }
}
