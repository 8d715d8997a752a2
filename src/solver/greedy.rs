use crate::error::SolveError;
use crate::model::{Demand, Location, WorkerCapability};

use super::{PlannedRoute, RouteSolver, Solution};

/// Nearest-feasible-neighbor construction.
///
/// Workers are filled one after another, largest capacity first. Each route
/// starts at the depot and repeatedly takes the closest remaining demand that
/// still fits the capacity and keeps the closed tour within the worker's
/// maximum distance; ties go to the larger quantity. Whatever is left is unplaced.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedySolver;

impl GreedySolver {
    pub fn new() -> Self {
        Self
    }
}

impl RouteSolver for GreedySolver {
    fn solve(
        &self,
        depot: Location,
        demands: &[Demand],
        workers: &[WorkerCapability],
    ) -> Result<Solution, SolveError> {
        if !depot.is_finite() {
            return Err(SolveError::Failed {
                reason: "depot is not a finite location".into(),
            });
        }

        let mut open: Vec<&Demand> = demands.iter().collect();
        let mut order: Vec<usize> = (0..workers.len()).collect();
        order.sort_by(|a, b| workers[*b].capacity.cmp(&workers[*a].capacity).then(a.cmp(b)));

        let mut routes = Vec::new();
        for index in order {
            if open.is_empty() {
                break;
            }
            let w = &workers[index];
            let stops = build_route(depot, w, &mut open);
            if !stops.is_empty() {
                routes.push(PlannedRoute {
                    worker: index,
                    demands: stops,
                });
            }
        }

        Ok(Solution {
            routes,
            unplaced: open.into_iter().cloned().collect(),
        })
    }

    fn name(&self) -> &'static str {
        "greedy"
    }
}

fn build_route(depot: Location, worker: &WorkerCapability, open: &mut Vec<&Demand>) -> Vec<Demand> {
    let mut stops = Vec::new();
    let mut at = depot;
    let mut load = 0u32;
    let mut travelled = 0.0f64;

    loop {
        let pick = open
            .iter()
            .enumerate()
            .filter(|(_, d)| load.saturating_add(d.quantity) <= worker.capacity)
            .filter(|(_, d)| {
                let leg = at.distance_to(&d.location);
                travelled + leg + d.location.distance_to(&depot) <= worker.max_distance
            })
            .min_by(|(_, a), (_, b)| {
                at.distance_to(&a.location)
                    .total_cmp(&at.distance_to(&b.location))
                    .then(b.quantity.cmp(&a.quantity))
            })
            .map(|(i, _)| i);

        let Some(i) = pick else { break };
        let d = open.swap_remove(i);
        travelled += at.distance_to(&d.location);
        load += d.quantity;
        at = d.location;
        stops.push(d.clone());
    }
    stops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DemandId, tour_length};

    fn worker(name: &str, capacity: u32, max_distance: f64) -> WorkerCapability {
        WorkerCapability {
            name: name.into(),
            capacity,
            max_distance,
            position: Location::ORIGIN,
        }
    }

    fn served(solution: &Solution) -> u32 {
        solution
            .routes
            .iter()
            .flat_map(|r| r.demands.iter())
            .map(|d| d.quantity)
            .sum()
    }

    #[test]
    fn fits_everything_when_capacity_allows() {
        let demands = vec![
            Demand::new(1, 20, Location::new(10.0, 0.0)),
            Demand::new(2, 15, Location::new(0.0, 10.0)),
            Demand::new(3, 10, Location::new(-10.0, 5.0)),
            Demand::new(4, 20, Location::new(5.0, -5.0)),
            Demand::new(5, 10, Location::new(3.0, 3.0)),
        ];
        let workers: Vec<_> = (1..=4).map(|i| worker(&format!("w{i}"), 50, 1000.0)).collect();

        let sol = GreedySolver.solve(Location::ORIGIN, &demands, &workers).unwrap();
        assert!(sol.unplaced.is_empty());
        assert_eq!(served(&sol), 75);
    }

    #[test]
    fn respects_capacity_and_distance() {
        let demands = vec![
            Demand::new(1, 30, Location::new(1.0, 0.0)),
            Demand::new(2, 30, Location::new(2.0, 0.0)),
            Demand::new(3, 5, Location::new(100.0, 100.0)),
        ];
        let workers = vec![worker("w1", 40, 50.0)];

        let sol = GreedySolver.solve(Location::ORIGIN, &demands, &workers).unwrap();
        assert_eq!(sol.routes.len(), 1);
        let route = &sol.routes[0];
        assert!(route.demands.iter().map(|d| d.quantity).sum::<u32>() <= 40);
        let length = tour_length(Location::ORIGIN, route.demands.iter().map(|d| d.location));
        assert!(length <= 50.0);

        let mut left: Vec<DemandId> = sol.unplaced.iter().map(|d| d.id).collect();
        left.sort();
        assert_eq!(left, vec![DemandId(2), DemandId(3)]);
    }

    #[test]
    fn no_workers_places_nothing() {
        let demands = vec![Demand::new(1, 1, Location::new(1.0, 1.0))];
        let sol = GreedySolver.solve(Location::ORIGIN, &demands, &[]).unwrap();
        assert!(sol.routes.is_empty());
        assert_eq!(sol.unplaced, demands);
    }

    #[test]
    fn every_demand_is_routed_or_unplaced_once() {
        let demands: Vec<_> = (1..=12)
            .map(|i| Demand::new(i, (i as u32 % 7) + 3, Location::new(i as f64 * 3.0, -(i as f64))))
            .collect();
        let workers = vec![worker("a", 25, 120.0), worker("b", 30, 80.0)];
        let sol = GreedySolver.solve(Location::ORIGIN, &demands, &workers).unwrap();

        let mut seen: Vec<u64> = sol
            .routes
            .iter()
            .flat_map(|r| r.demands.iter())
            .chain(sol.unplaced.iter())
            .map(|d| d.id.0)
            .collect();
        seen.sort();
        assert_eq!(seen, (1..=12).collect::<Vec<_>>());
    }
}
