//! Bidirectional many-to-many index.
//!
//! `BiMultiMap<L, R>` keeps `left -> {right...}` and `right -> {left...}` in
//! lockstep: every mutation updates both directions and drops a bucket as soon
//! as it becomes empty, so a key is present iff it has at least one partner.
//!
//! Buckets are `IndexSet`s, which makes uniform sampling O(1) (`get_index`)
//! and removal O(1) (`swap_remove`). Iteration order is an implementation
//! detail and may change after any removal.

use std::hash::Hash;

use indexmap::{Equivalent, IndexMap, IndexSet};
use rand::Rng;

#[derive(Debug, Clone)]
pub struct BiMultiMap<L, R> {
    forward: IndexMap<L, IndexSet<R>>,
    backward: IndexMap<R, IndexSet<L>>,
}

impl<L, R> Default for BiMultiMap<L, R> {
    fn default() -> Self {
        Self {
            forward: IndexMap::new(),
            backward: IndexMap::new(),
        }
    }
}

impl<L, R> BiMultiMap<L, R>
where
    L: Clone + Eq + Hash,
    R: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `l` and `r`. Returns false if the pair already existed.
    pub fn insert(&mut self, l: L, r: R) -> bool {
        let inserted = self.forward.entry(l.clone()).or_default().insert(r.clone());
        if inserted {
            self.backward.entry(r).or_default().insert(l);
        }
        inserted
    }

    /// Unlink one pair. Returns false if it was not linked.
    pub fn remove<QL, QR>(&mut self, l: &QL, r: &QR) -> bool
    where
        QL: ?Sized + Hash + Equivalent<L>,
        QR: ?Sized + Hash + Equivalent<R>,
    {
        let Some(rights) = self.forward.get_mut(l) else {
            return false;
        };
        if !rights.swap_remove(r) {
            return false;
        }
        if rights.is_empty() {
            self.forward.swap_remove(l);
        }
        if let Some(lefts) = self.backward.get_mut(r) {
            lefts.swap_remove(l);
            if lefts.is_empty() {
                self.backward.swap_remove(r);
            }
        }
        true
    }

    /// Drop every link of `l`; returns its former partners.
    pub fn remove_left<Q>(&mut self, l: &Q) -> Vec<R>
    where
        Q: ?Sized + Hash + Equivalent<L>,
    {
        let Some(rights) = self.forward.swap_remove(l) else {
            return Vec::new();
        };
        for r in &rights {
            if let Some(lefts) = self.backward.get_mut(r) {
                lefts.swap_remove(l);
                if lefts.is_empty() {
                    self.backward.swap_remove(r);
                }
            }
        }
        rights.into_iter().collect()
    }

    /// Drop every link of `r`; returns its former partners.
    pub fn remove_right<Q>(&mut self, r: &Q) -> Vec<L>
    where
        Q: ?Sized + Hash + Equivalent<R>,
    {
        let Some(lefts) = self.backward.swap_remove(r) else {
            return Vec::new();
        };
        for l in &lefts {
            if let Some(rights) = self.forward.get_mut(l) {
                rights.swap_remove(r);
                if rights.is_empty() {
                    self.forward.swap_remove(l);
                }
            }
        }
        lefts.into_iter().collect()
    }

    pub fn contains<QL, QR>(&self, l: &QL, r: &QR) -> bool
    where
        QL: ?Sized + Hash + Equivalent<L>,
        QR: ?Sized + Hash + Equivalent<R>,
    {
        self.forward.get(l).is_some_and(|rights| rights.contains(r))
    }

    pub fn contains_left<Q>(&self, l: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<L>,
    {
        self.forward.contains_key(l)
    }

    pub fn contains_right<Q>(&self, r: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<R>,
    {
        self.backward.contains_key(r)
    }

    pub fn rights_of<Q>(&self, l: &Q) -> impl Iterator<Item = &R>
    where
        Q: ?Sized + Hash + Equivalent<L>,
    {
        self.forward.get(l).into_iter().flatten()
    }

    pub fn lefts_of<Q>(&self, r: &Q) -> impl Iterator<Item = &L>
    where
        Q: ?Sized + Hash + Equivalent<R>,
    {
        self.backward.get(r).into_iter().flatten()
    }

    /// Every left key with at least one partner.
    pub fn lefts(&self) -> impl Iterator<Item = &L> {
        self.forward.keys()
    }

    /// Every right key with at least one partner.
    pub fn rights(&self) -> impl Iterator<Item = &R> {
        self.backward.keys()
    }

    pub fn left_len(&self) -> usize {
        self.forward.len()
    }

    pub fn right_len(&self) -> usize {
        self.backward.len()
    }

    /// Number of partners of `l`.
    pub fn right_count<Q>(&self, l: &Q) -> usize
    where
        Q: ?Sized + Hash + Equivalent<L>,
    {
        self.forward.get(l).map_or(0, IndexSet::len)
    }

    /// Number of partners of `r`.
    pub fn left_count<Q>(&self, r: &Q) -> usize
    where
        Q: ?Sized + Hash + Equivalent<R>,
    {
        self.backward.get(r).map_or(0, IndexSet::len)
    }

    /// Uniform pick among the partners of `l`.
    pub fn sample_right<Q, G>(&self, l: &Q, rng: &mut G) -> Option<&R>
    where
        Q: ?Sized + Hash + Equivalent<L>,
        G: Rng + ?Sized,
    {
        let rights = self.forward.get(l)?;
        if rights.is_empty() {
            return None;
        }
        rights.get_index(rng.random_range(0..rights.len()))
    }

    /// Uniform pick among the partners of `r`.
    pub fn sample_left<Q, G>(&self, r: &Q, rng: &mut G) -> Option<&L>
    where
        Q: ?Sized + Hash + Equivalent<R>,
        G: Rng + ?Sized,
    {
        let lefts = self.backward.get(r)?;
        if lefts.is_empty() {
            return None;
        }
        lefts.get_index(rng.random_range(0..lefts.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
