use serde::{Deserialize, Serialize};

use super::{BatchId, Demand, DemandId, Route};

/// One demand as it appears in a submitted result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    pub id: DemandId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub qty: u32,
}

impl From<&Demand> for DemandRecord {
    fn from(d: &Demand) -> Self {
        Self {
            id: d.id,
            name: d.name.clone(),
            x: d.location.x,
            y: d.location.y,
            qty: d.quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteReport {
    pub route_id: u64,
    pub worker: String,
    pub demands: Vec<DemandRecord>,
    pub total_qty: u32,
    pub total_distance: f64,
}

impl From<&Route> for RouteReport {
    fn from(r: &Route) -> Self {
        Self {
            route_id: r.id.0,
            worker: r.worker.clone(),
            demands: r.demands.iter().map(DemandRecord::from).collect(),
            total_qty: r.total_quantity,
            total_distance: r.total_distance,
        }
    }
}

/// Result of one planning round, submitted to the batch source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionReport {
    pub batch_id: BatchId,
    pub routes: Vec<RouteReport>,
    pub unplaced: Vec<DemandRecord>,
    /// Demands given up on after too many unplaced rounds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub infeasible: Vec<DemandRecord>,
    pub served_qty: u64,
    pub total_qty: u64,
    pub total_distance: f64,
    pub solve_time_ms: u64,
}

impl SolutionReport {
    pub fn new(
        batch_id: BatchId,
        presented: &[Demand],
        routes: &[Route],
        unplaced: &[Demand],
        infeasible: &[Demand],
        solve_time_ms: u64,
    ) -> Self {
        Self {
            batch_id,
            routes: routes.iter().map(RouteReport::from).collect(),
            unplaced: unplaced.iter().map(DemandRecord::from).collect(),
            infeasible: infeasible.iter().map(DemandRecord::from).collect(),
            served_qty: routes.iter().map(|r| u64::from(r.total_quantity)).sum(),
            total_qty: presented.iter().map(|d| u64::from(d.quantity)).sum(),
            total_distance: routes.iter().map(|r| r.total_distance).sum(),
            solve_time_ms,
        }
    }

    /// Served share of the presented quantity (`0.0` for an empty round).
    pub fn delivery_rate(&self) -> f64 {
        if self.total_qty == 0 {
            0.0
        } else {
            self.served_qty as f64 / self.total_qty as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Location, RouteId};

    #[test]
    fn infeasible_is_omitted_when_empty() {
        let d = Demand::new(1, 4, Location::new(1.0, 2.0));
        let route = Route::new(RouteId(1), "w", 1, vec![d.clone()], Location::ORIGIN);
        let report = SolutionReport::new("b-1".into(), &[d], &[route], &[], &[], 3);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("infeasible").is_none());
        assert_eq!(json["served_qty"], 4);
        assert_eq!(json["routes"][0]["demands"][0]["name"], "C1");
        assert_eq!(report.delivery_rate(), 1.0);
    }
}
