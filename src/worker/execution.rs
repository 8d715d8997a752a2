//! # Delivery execution state machine.
//!
//! ```text
//!            enqueue (idle)                     last stop reached
//!   Idle ───────────────────► MovingToDemand(0) ──► … ──► ReturningToDepot
//!    ▲                          │ stop i reached                │
//!    │                          ▼                               │ depot reached
//!    │                   MovingToDemand(i+1)                    │
//!    └───────────── queue empty ◄───────────────────────────────┘
//!                   queue non-empty → next route starts on the same tick
//! ```
//!
//! Every tick moves the worker by `speed` toward its target. A target counts as
//! reached once it is within `arrival_threshold`; the position then snaps onto it.
//! At most one target is reached per tick.

use std::collections::VecDeque;

use crate::model::{DemandId, Location, RouteId};
use crate::protocol::RouteProposal;

/// What a worker has to drive for one accepted route.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Itinerary {
    pub route: RouteId,
    pub stops: Vec<(DemandId, Location)>,
}

impl From<&RouteProposal> for Itinerary {
    fn from(p: &RouteProposal) -> Self {
        Self {
            route: p.route_id,
            stops: p.demand_ids.iter().copied().zip(p.coords.iter().copied()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    MovingToDemand(usize),
    ReturningToDepot,
}

/// Observable step of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Progress {
    Started { route: RouteId, stops: usize },
    Visited { route: RouteId, demand: DemandId, at: Location },
    Returning { route: RouteId },
    Returned { route: RouteId, at: Location },
    DriftCorrected { from: Location },
}

#[derive(Debug)]
pub(crate) struct Execution {
    position: Location,
    depot: Location,
    speed: f64,
    threshold: f64,
    phase: Phase,
    active: Option<Itinerary>,
    queue: VecDeque<Itinerary>,
}

impl Execution {
    pub(crate) fn new(depot: Location, speed: f64, threshold: f64) -> Self {
        Self {
            position: depot,
            depot,
            speed,
            threshold,
            phase: Phase::Idle,
            active: None,
            queue: VecDeque::new(),
        }
    }

    pub(crate) fn position(&self) -> Location {
        self.position
    }

    pub(crate) fn depot(&self) -> Location {
        self.depot
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn active_route(&self) -> Option<RouteId> {
        self.active.as_ref().map(|i| i.route)
    }

    /// Routes waiting behind the active one.
    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Moves the home depot. The worker is not moved.
    pub(crate) fn set_depot(&mut self, depot: Location) {
        self.depot = depot;
    }

    /// Appends a route; starts it right away when idle.
    pub(crate) fn enqueue(&mut self, itinerary: Itinerary) -> Vec<Progress> {
        self.queue.push_back(itinerary);
        let mut out = Vec::new();
        if self.phase == Phase::Idle {
            self.start_next(&mut out);
        }
        out
    }

    fn start_next(&mut self, out: &mut Vec<Progress>) {
        let Some(next) = self.queue.pop_front() else {
            self.phase = Phase::Idle;
            return;
        };
        out.push(Progress::Started {
            route: next.route,
            stops: next.stops.len(),
        });
        if next.stops.is_empty() {
            out.push(Progress::Returning { route: next.route });
            self.phase = Phase::ReturningToDepot;
        } else {
            self.phase = Phase::MovingToDemand(0);
        }
        self.active = Some(next);
    }

    fn target(&self) -> Option<Location> {
        match self.phase {
            Phase::Idle => None,
            Phase::MovingToDemand(i) => self
                .active
                .as_ref()
                .and_then(|r| r.stops.get(i))
                .map(|(_, at)| *at),
            Phase::ReturningToDepot => Some(self.depot),
        }
    }

    /// Advances one movement tick.
    pub(crate) fn tick(&mut self) -> Vec<Progress> {
        let mut out = Vec::new();
        let Some(target) = self.target() else {
            if self.phase != Phase::Idle {
                // Stop index past the itinerary: head home.
                self.phase = Phase::ReturningToDepot;
            }
            return out;
        };

        if self.position.distance_to(&target) > self.threshold {
            self.position = self.position.step_toward(&target, self.speed);
            if self.position.distance_to(&target) > self.threshold {
                return out;
            }
        }
        self.position = target;
        self.arrive(&mut out);
        out
    }

    fn arrive(&mut self, out: &mut Vec<Progress>) {
        let Some(active) = self.active.as_ref() else {
            self.phase = Phase::Idle;
            return;
        };
        let route = active.route;

        match self.phase {
            Phase::MovingToDemand(i) => {
                if let Some((demand, at)) = active.stops.get(i) {
                    out.push(Progress::Visited {
                        route,
                        demand: *demand,
                        at: *at,
                    });
                }
                if i + 1 < active.stops.len() {
                    self.phase = Phase::MovingToDemand(i + 1);
                } else {
                    self.phase = Phase::ReturningToDepot;
                    out.push(Progress::Returning { route });
                }
            }
            Phase::ReturningToDepot => {
                out.push(Progress::Returned {
                    route,
                    at: self.position,
                });
                self.active = None;
                self.start_next(out);
            }
            Phase::Idle => {}
        }
    }

    /// Snaps an idle worker that wandered off back onto its depot and starts any
    /// queued route.
    pub(crate) fn correct_drift(&mut self) -> Vec<Progress> {
        let mut out = Vec::new();
        if self.phase != Phase::Idle {
            return out;
        }
        if self.position.distance_to(&self.depot) > self.threshold {
            out.push(Progress::DriftCorrected {
                from: self.position,
            });
            self.position = self.depot;
        }
        self.start_next(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn itinerary(route: u64, stops: &[(u64, f64, f64)]) -> Itinerary {
        Itinerary {
            route: RouteId(route),
            stops: stops
                .iter()
                .map(|(id, x, y)| (DemandId(*id), Location::new(*x, *y)))
                .collect(),
        }
    }

    fn run_until_idle(exec: &mut Execution, max_ticks: usize) -> Vec<Progress> {
        let mut all = Vec::new();
        for _ in 0..max_ticks {
            all.extend(exec.tick());
            if exec.phase() == Phase::Idle {
                break;
            }
        }
        all
    }

    #[test]
    fn drives_stops_in_order_and_returns() {
        let mut exec = Execution::new(Location::ORIGIN, 1.0, 1.0);
        let started = exec.enqueue(itinerary(1, &[(10, 3.0, 0.0), (11, 3.0, 4.0)]));
        assert_eq!(
            started,
            vec![Progress::Started {
                route: RouteId(1),
                stops: 2
            }]
        );

        let progress = run_until_idle(&mut exec, 50);
        let visited: Vec<_> = progress
            .iter()
            .filter_map(|p| match p {
                Progress::Visited { demand, .. } => Some(demand.0),
                _ => None,
            })
            .collect();
        assert_eq!(visited, vec![10, 11]);
        assert!(matches!(progress.last(), Some(Progress::Returned { route, .. }) if route.0 == 1));
        assert_eq!(exec.position(), Location::ORIGIN);
        assert_eq!(exec.active_route(), None);
    }

    #[test]
    fn movement_is_capped_per_tick() {
        let mut exec = Execution::new(Location::ORIGIN, 1.0, 0.5);
        exec.enqueue(itinerary(1, &[(1, 10.0, 0.0)]));
        assert!(exec.tick().is_empty());
        assert_eq!(exec.position(), Location::new(1.0, 0.0));
    }

    #[test]
    fn second_route_waits_then_starts_on_return() {
        let mut exec = Execution::new(Location::ORIGIN, 2.0, 1.0);
        exec.enqueue(itinerary(1, &[(1, 2.0, 0.0)]));
        assert!(exec.enqueue(itinerary(2, &[(2, 0.0, 2.0)])).is_empty());
        assert_eq!(exec.queued(), 1);

        let mut seen = Vec::new();
        for _ in 0..10 {
            seen.extend(exec.tick());
            if exec.active_route() == Some(RouteId(2)) {
                break;
            }
        }
        let returned = seen
            .iter()
            .position(|p| matches!(p, Progress::Returned { route, .. } if route.0 == 1));
        let started = seen
            .iter()
            .position(|p| matches!(p, Progress::Started { route, .. } if route.0 == 2));
        assert!(returned.is_some() && started > returned);
        assert_eq!(exec.queued(), 0);
    }

    #[test]
    fn drift_snaps_idle_worker_home() {
        let mut exec = Execution::new(Location::ORIGIN, 1.0, 1.0);
        exec.set_depot(Location::new(5.0, 0.0));
        assert_eq!(exec.position(), Location::ORIGIN);

        let out = exec.correct_drift();
        assert_eq!(
            out,
            vec![Progress::DriftCorrected {
                from: Location::ORIGIN
            }]
        );
        assert_eq!(exec.position(), Location::new(5.0, 0.0));
        assert!(exec.correct_drift().is_empty());
    }

    #[test]
    fn empty_route_goes_straight_home() {
        let mut exec = Execution::new(Location::ORIGIN, 1.0, 1.0);
        let out = exec.enqueue(itinerary(4, &[]));
        assert_eq!(out.len(), 2);
        assert_eq!(exec.phase(), Phase::ReturningToDepot);
        let done = exec.tick();
        assert!(matches!(done.as_slice(), [Progress::Returned { .. }]));
        assert_eq!(exec.phase(), Phase::Idle);
    }
}
