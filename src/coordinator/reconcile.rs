//! Accumulation buffer and coordinate cache.
//!
//! Demands the solver could not place wait in the buffer (one entry per id) and
//! come back in later rounds. The cache remembers the last known location and
//! name of every demand id so a recycled demand keeps its coordinates.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::model::{Demand, DemandId, Location, Route};

/// What a round left behind.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Reconciled {
    /// Back in the buffer, in id order.
    pub unplaced: Vec<Demand>,
    /// Given up on this round.
    pub abandoned: Vec<Demand>,
}

#[derive(Debug)]
pub(crate) struct Reconciler {
    buffer: BTreeMap<DemandId, Demand>,
    cache: HashMap<DemandId, (Location, String)>,
    misses: HashMap<DemandId, u32>,
    abandon_after: Option<u32>,
    abandoned: BTreeSet<DemandId>,
}

impl Reconciler {
    pub(crate) fn new(abandon_after: Option<u32>) -> Self {
        Self {
            buffer: BTreeMap::new(),
            cache: HashMap::new(),
            misses: HashMap::new(),
            abandon_after,
            abandoned: BTreeSet::new(),
        }
    }

    /// Caches the location and name of `demand`.
    pub(crate) fn remember(&mut self, demand: &Demand) {
        self.cache
            .insert(demand.id, (demand.location, demand.name.clone()));
    }

    fn restore(&mut self, mut demand: Demand) -> Demand {
        match self.cache.get(&demand.id) {
            Some((location, name)) => {
                demand.location = *location;
                demand.name.clone_from(name);
            }
            None => self.remember(&demand),
        }
        demand
    }

    pub(crate) fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn buffered_ids(&self) -> Vec<DemandId> {
        self.buffer.keys().copied().collect()
    }

    pub(crate) fn abandoned_ids(&self) -> Vec<DemandId> {
        self.abandoned.iter().copied().collect()
    }

    /// Empties the buffer, in id order.
    pub(crate) fn drain(&mut self) -> Vec<Demand> {
        std::mem::take(&mut self.buffer).into_values().collect()
    }

    /// The demand set of a round: `batch` plus the buffer, the batch copy winning on id.
    pub(crate) fn solve_set(&mut self, batch: &[Demand]) -> Vec<Demand> {
        let mut seen: HashSet<DemandId> = HashSet::with_capacity(batch.len());
        let mut set: Vec<Demand> = batch
            .iter()
            .filter(|d| seen.insert(d.id))
            .cloned()
            .collect();
        let buffered: Vec<Demand> = self
            .buffer
            .values()
            .filter(|d| !seen.contains(&d.id))
            .cloned()
            .collect();
        set.extend(buffered.into_iter().map(|d| self.restore(d)));
        set
    }

    /// Puts demands back without counting a miss (rejected routes, aborted rounds).
    pub(crate) fn requeue(&mut self, demands: impl IntoIterator<Item = Demand>) -> usize {
        let mut n = 0;
        for d in demands {
            let d = self.restore(d);
            self.buffer.insert(d.id, d);
            n += 1;
        }
        n
    }

    /// Drops buffered copies of demands that ended up on an accepted route after all.
    pub(crate) fn forget(&mut self, ids: impl IntoIterator<Item = DemandId>) {
        for id in ids {
            self.buffer.remove(&id);
            self.misses.remove(&id);
        }
    }

    /// Folds the outcome of a solve into the buffer.
    ///
    /// Served demands leave the buffer and reset their miss count. Everything
    /// presented but not routed is unplaced, whether or not the solver said so.
    pub(crate) fn reconcile(
        &mut self,
        presented: &[Demand],
        routes: &[Route],
        unplaced: Vec<Demand>,
    ) -> Reconciled {
        let routed: HashSet<DemandId> = routes.iter().flat_map(Route::demand_ids).collect();
        for id in &routed {
            self.buffer.remove(id);
            self.misses.remove(id);
        }

        let mut left: BTreeMap<DemandId, Demand> = BTreeMap::new();
        for d in unplaced.into_iter().chain(presented.iter().cloned()) {
            if !routed.contains(&d.id) {
                left.entry(d.id).or_insert(d);
            }
        }

        let mut out = Reconciled::default();
        for (id, d) in left {
            let d = self.restore(d);
            let misses = self.misses.entry(id).or_insert(0);
            *misses += 1;
            match self.abandon_after {
                Some(limit) if *misses >= limit => {
                    self.misses.remove(&id);
                    self.buffer.remove(&id);
                    self.abandoned.insert(id);
                    out.abandoned.push(d);
                }
                _ => {
                    self.buffer.insert(id, d.clone());
                    out.unplaced.push(d);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RouteId;

    fn demand(id: u64, qty: u32) -> Demand {
        Demand::new(id, qty, Location::new(id as f64, 1.0))
    }

    fn route(demands: Vec<Demand>) -> Route {
        Route::new(RouteId(1), "w", 1, demands, Location::ORIGIN)
    }

    #[test]
    fn served_leave_and_unplaced_enter_once() {
        let mut r = Reconciler::new(None);
        r.requeue([demand(1, 5), demand(2, 5)]);

        let presented = r.solve_set(&[demand(3, 1)]);
        assert_eq!(presented.len(), 3);

        let out = r.reconcile(&presented, &[route(vec![demand(1, 5)])], vec![demand(2, 5), demand(2, 5)]);
        assert_eq!(out.unplaced.iter().map(|d| d.id.0).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(r.buffered_ids(), vec![DemandId(2), DemandId(3)]);
    }

    #[test]
    fn batch_copy_wins_over_buffer() {
        let mut r = Reconciler::new(None);
        r.requeue([demand(1, 5)]);
        let set = r.solve_set(&[demand(1, 9)]);
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].quantity, 9);
    }

    #[test]
    fn cache_restores_coordinates() {
        let mut r = Reconciler::new(None);
        r.remember(&demand(4, 2).with_name("Bakery"));

        let stripped = Demand::new(4, 2, Location::ORIGIN);
        let out = r.reconcile(&[], &[], vec![stripped]);
        assert_eq!(out.unplaced[0].location, Location::new(4.0, 1.0));
        assert_eq!(out.unplaced[0].name, "Bakery");
    }

    #[test]
    fn abandons_after_consecutive_misses() {
        let mut r = Reconciler::new(Some(2));
        let far = demand(9, 1);

        let first = r.reconcile(&[far.clone()], &[], vec![]);
        assert_eq!(first.unplaced.len(), 1);
        let second = r.reconcile(&[far], &[], vec![]);
        assert!(second.unplaced.is_empty());
        assert_eq!(second.abandoned.len(), 1);
        assert_eq!(r.buffered_len(), 0);
        assert_eq!(r.abandoned_ids(), vec![DemandId(9)]);
    }

    #[test]
    fn serving_resets_the_miss_count() {
        let mut r = Reconciler::new(Some(2));
        let d = demand(5, 1);
        r.reconcile(&[d.clone()], &[], vec![]);
        r.reconcile(&[d.clone()], &[route(vec![d.clone()])], vec![]);
        let out = r.reconcile(&[d], &[], vec![]);
        assert_eq!(out.unplaced.len(), 1);
        assert!(out.abandoned.is_empty());
    }
}
