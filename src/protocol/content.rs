use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::model::{DemandId, Location, Route, RouteId};

use super::envelope::{Performative, ROUTE_ASSIGNMENT_ONTOLOGY};
use super::fields::{
    check_name, check_text, exact_float, fixed_float, invalid, Fields, LIST_SEP, PAIR_SEP,
};

const QUERY_CAPABILITY: &str = "QUERY_CAPABILITY";
const ARRIVED_AT_DEPOT: &str = "ARRIVED_AT_DEPOT";
const ROUTE_ASSIGNMENT_PREFIX: &str = "ROUTE_ASSIGNMENT:";

const CAPABILITY_KEYS: [&str; 5] = ["CAPACITY", "MAX_DISTANCE", "NAME", "X", "Y"];
const PROPOSAL_KEYS: [&str; 10] = [
    "ROUTE",
    "WORKER_ID",
    "WORKER_NAME",
    "DEMANDS",
    "DEMAND_IDS",
    "COORDS",
    "QTY",
    "DISTANCE",
    "DEPOT_X",
    "DEPOT_Y",
];
const ACCEPTED_KEYS: [&str; 6] = ["ROUTE_ACCEPTED", "WORKER", "STATUS", "QTY", "DISTANCE", "DEMANDS"];
const REJECTED_KEYS: [&str; 5] = ["ROUTE_REJECTED", "WORKER", "STATUS", "REASON", "DETAILS"];

/// Typed message content.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Coordinator asks a worker for its capability.
    QueryCapability,
    /// Worker answers a capability query.
    Capability(CapabilityReport),
    /// Coordinator proposes a route.
    Proposal(RouteProposal),
    /// Worker accepted and queued a route.
    Accepted(RouteAccepted),
    /// Worker refused a route.
    Rejected(RouteRejected),
    /// Worker finished a route and is back at its depot.
    ArrivedAtDepot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityReport {
    pub capacity: u32,
    pub max_distance: f64,
    pub name: String,
    pub position: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteProposal {
    pub route_id: RouteId,
    /// 1-based index of the worker in the round's capability list.
    pub worker_index: u32,
    pub worker_name: String,
    pub demand_ids: Vec<DemandId>,
    pub demand_names: Vec<String>,
    pub coords: Vec<Location>,
    pub quantity: u32,
    pub distance: f64,
    pub depot: Location,
}

impl RouteProposal {
    /// Proposal for `route`, addressed to `worker_name` (the resolved directory name).
    pub fn for_route(route: &Route, worker_name: &str, depot: Location) -> Self {
        Self {
            route_id: route.id,
            worker_index: route.worker_index,
            worker_name: worker_name.to_string(),
            demand_ids: route.demands.iter().map(|d| d.id).collect(),
            demand_names: route.demands.iter().map(|d| d.name.clone()).collect(),
            coords: route.demands.iter().map(|d| d.location).collect(),
            quantity: route.total_quantity,
            distance: route.total_distance,
            depot,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteAccepted {
    pub route_id: RouteId,
    pub worker: String,
    pub quantity: u32,
    pub distance: f64,
    pub demand_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRejected {
    pub route_id: RouteId,
    pub worker: String,
    pub reason: RejectReason,
    pub details: String,
}

/// Why a worker refused a route. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    WrongWorker,
    CapacityExceeded,
    DistanceExceeded,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::WrongWorker => "WRONG_WORKER",
            RejectReason::CapacityExceeded => "CAPACITY_EXCEEDED",
            RejectReason::DistanceExceeded => "DISTANCE_EXCEEDED",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RejectReason {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WRONG_WORKER" => Ok(RejectReason::WrongWorker),
            "CAPACITY_EXCEEDED" => Ok(RejectReason::CapacityExceeded),
            "DISTANCE_EXCEEDED" => Ok(RejectReason::DistanceExceeded),
            other => Err(invalid("REASON", other)),
        }
    }
}

impl Content {
    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Content::QueryCapability => "query_capability",
            Content::Capability(_) => "capability",
            Content::Proposal(_) => "proposal",
            Content::Accepted(_) => "accepted",
            Content::Rejected(_) => "rejected",
            Content::ArrivedAtDepot => "arrived_at_depot",
        }
    }

    pub fn performative(&self) -> Performative {
        match self {
            Content::QueryCapability | Content::Proposal(_) => Performative::Request,
            Content::Rejected(_) => Performative::Refuse,
            Content::Capability(_) | Content::Accepted(_) | Content::ArrivedAtDepot => {
                Performative::Inform
            }
        }
    }

    pub fn ontology(&self) -> Option<&'static str> {
        match self {
            Content::Proposal(_) => Some(ROUTE_ASSIGNMENT_ONTOLOGY),
            _ => None,
        }
    }

    /// Renders the wire form. Fails if a name carries a reserved delimiter.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        match self {
            Content::QueryCapability => Ok(QUERY_CAPABILITY.to_string()),
            Content::ArrivedAtDepot => Ok(ARRIVED_AT_DEPOT.to_string()),
            Content::Capability(c) => Ok(format!(
                "CAPACITY:{}|MAX_DISTANCE:{}|NAME:{}|X:{}|Y:{}",
                c.capacity,
                exact_float(c.max_distance),
                check_name("NAME", &c.name)?,
                exact_float(c.position.x),
                exact_float(c.position.y),
            )),
            Content::Proposal(p) => encode_proposal(p),
            Content::Accepted(a) => Ok(format!(
                "ROUTE_ACCEPTED:{}|WORKER:{}|STATUS:ACCEPTED|QTY:{}|DISTANCE:{}|DEMANDS:{}",
                a.route_id,
                check_name("WORKER", &a.worker)?,
                a.quantity,
                fixed_float(a.distance),
                a.demand_count,
            )),
            Content::Rejected(r) => Ok(format!(
                "ROUTE_REJECTED:{}|WORKER:{}|STATUS:REJECTED|REASON:{}|DETAILS:{}",
                r.route_id,
                check_name("WORKER", &r.worker)?,
                r.reason,
                check_text("DETAILS", &r.details)?,
            )),
        }
    }

    /// Parses the wire form. Anything but an exact known shape is an error.
    pub fn parse(raw: &str) -> Result<Content, ProtocolError> {
        match raw {
            QUERY_CAPABILITY => return Ok(Content::QueryCapability),
            ARRIVED_AT_DEPOT => return Ok(Content::ArrivedAtDepot),
            _ => {}
        }

        if let Some(rest) = raw.strip_prefix(ROUTE_ASSIGNMENT_PREFIX) {
            return parse_proposal(rest).map(Content::Proposal);
        }
        if raw.starts_with("ROUTE_ACCEPTED:") {
            return parse_accepted(raw).map(Content::Accepted);
        }
        if raw.starts_with("ROUTE_REJECTED:") {
            return parse_rejected(raw).map(Content::Rejected);
        }
        if raw.starts_with("CAPACITY:") {
            return parse_capability(raw).map(Content::Capability);
        }
        Err(ProtocolError::UnknownMessage {
            content: raw.to_string(),
        })
    }
}

fn encode_proposal(p: &RouteProposal) -> Result<String, ProtocolError> {
    if p.demand_ids.len() != p.demand_names.len() || p.demand_ids.len() != p.coords.len() {
        return Err(ProtocolError::LengthMismatch {
            detail: format!(
                "{} ids, {} names, {} coords",
                p.demand_ids.len(),
                p.demand_names.len(),
                p.coords.len()
            ),
        });
    }

    let mut out = String::with_capacity(128);
    let _ = write!(
        out,
        "{ROUTE_ASSIGNMENT_PREFIX}ROUTE:{}|WORKER_ID:{}|WORKER_NAME:{}|DEMANDS:",
        p.route_id,
        p.worker_index,
        check_name("WORKER_NAME", &p.worker_name)?
    );
    for (i, id) in p.demand_ids.iter().enumerate() {
        if i > 0 {
            out.push(LIST_SEP);
        }
        let _ = write!(out, "{id}");
    }
    out.push_str("|DEMAND_IDS:");
    for (i, name) in p.demand_names.iter().enumerate() {
        if i > 0 {
            out.push(LIST_SEP);
        }
        out.push_str(check_name("DEMAND_IDS", name)?);
    }
    out.push_str("|COORDS:");
    for (i, at) in p.coords.iter().enumerate() {
        if i > 0 {
            out.push(PAIR_SEP);
        }
        let _ = write!(out, "{},{}", fixed_float(at.x), fixed_float(at.y));
    }
    let _ = write!(
        out,
        "|QTY:{}|DISTANCE:{}|DEPOT_X:{}|DEPOT_Y:{}",
        p.quantity,
        fixed_float(p.distance),
        fixed_float(p.depot.x),
        fixed_float(p.depot.y)
    );
    Ok(out)
}

fn parse_capability(raw: &str) -> Result<CapabilityReport, ProtocolError> {
    let f = Fields::parse(raw, &CAPABILITY_KEYS)?;
    Ok(CapabilityReport {
        capacity: f.number("CAPACITY")?,
        max_distance: f.float("MAX_DISTANCE")?,
        name: f.name("NAME")?,
        position: Location::new(f.float("X")?, f.float("Y")?),
    })
}

fn parse_proposal(raw: &str) -> Result<RouteProposal, ProtocolError> {
    let f = Fields::parse(raw, &PROPOSAL_KEYS)?;
    let demand_ids = f.list("DEMANDS", |s| {
        s.parse::<DemandId>().map_err(|_| invalid("DEMANDS", s))
    })?;
    let demand_names = f.list("DEMAND_IDS", |s| {
        if s.is_empty() {
            Err(invalid("DEMAND_IDS", s))
        } else {
            Ok(s.to_string())
        }
    })?;
    let coords = f.coords("COORDS")?;

    if demand_ids.len() != demand_names.len() || demand_ids.len() != coords.len() {
        return Err(ProtocolError::LengthMismatch {
            detail: format!(
                "{} ids, {} names, {} coords",
                demand_ids.len(),
                demand_names.len(),
                coords.len()
            ),
        });
    }

    Ok(RouteProposal {
        route_id: RouteId(f.number("ROUTE")?),
        worker_index: f.number("WORKER_ID")?,
        worker_name: f.name("WORKER_NAME")?,
        demand_ids,
        demand_names,
        coords,
        quantity: f.number("QTY")?,
        distance: f.float("DISTANCE")?,
        depot: Location::new(f.float("DEPOT_X")?, f.float("DEPOT_Y")?),
    })
}

fn parse_accepted(raw: &str) -> Result<RouteAccepted, ProtocolError> {
    let f = Fields::parse(raw, &ACCEPTED_KEYS)?;
    expect_status(&f, "ACCEPTED")?;
    Ok(RouteAccepted {
        route_id: RouteId(f.number("ROUTE_ACCEPTED")?),
        worker: f.name("WORKER")?,
        quantity: f.number("QTY")?,
        distance: f.float("DISTANCE")?,
        demand_count: f.number("DEMANDS")?,
    })
}

fn parse_rejected(raw: &str) -> Result<RouteRejected, ProtocolError> {
    let f = Fields::parse(raw, &REJECTED_KEYS)?;
    expect_status(&f, "REJECTED")?;
    Ok(RouteRejected {
        route_id: RouteId(f.number("ROUTE_REJECTED")?),
        worker: f.name("WORKER")?,
        reason: f.text("REASON")?.parse()?,
        details: f.text("DETAILS")?.to_string(),
    })
}

fn expect_status(f: &Fields<'_>, expected: &str) -> Result<(), ProtocolError> {
    let status = f.text("STATUS")?;
    if status == expected {
        Ok(())
    } else {
        Err(invalid("STATUS", status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> RouteProposal {
        RouteProposal {
            route_id: RouteId(12),
            worker_index: 2,
            worker_name: "truck-2".into(),
            demand_ids: vec![DemandId(3), DemandId(9)],
            demand_names: vec!["C3".into(), "C9".into()],
            coords: vec![Location::new(10.0, 5.5), Location::new(-2.25, 4.0)],
            quantity: 17,
            distance: 42.123,
            depot: Location::new(0.0, 0.0),
        }
    }

    #[test]
    fn capability_uses_round_trip_floats() {
        let content = Content::Capability(CapabilityReport {
            capacity: 50,
            max_distance: 1000.0,
            name: "truck-1".into(),
            position: Location::new(0.0, 12.5),
        });
        assert_eq!(
            content.encode().unwrap(),
            "CAPACITY:50|MAX_DISTANCE:1000.0|NAME:truck-1|X:0.0|Y:12.5"
        );
    }

    #[test]
    fn proposal_wire_shape() {
        let wire = Content::Proposal(proposal()).encode().unwrap();
        assert_eq!(
            wire,
            "ROUTE_ASSIGNMENT:ROUTE:12|WORKER_ID:2|WORKER_NAME:truck-2|DEMANDS:3,9|DEMAND_IDS:C3,C9|\
             COORDS:10.00,5.50;-2.25,4.00|QTY:17|DISTANCE:42.12|DEPOT_X:0.00|DEPOT_Y:0.00"
        );

        let Content::Proposal(parsed) = Content::parse(&wire).unwrap() else {
            panic!("expected a proposal");
        };
        assert_eq!(parsed.demand_ids, vec![DemandId(3), DemandId(9)]);
        assert_eq!(parsed.coords[1], Location::new(-2.25, 4.0));
        assert_eq!(parsed.distance, 42.12);
    }

    #[test]
    fn rejection_keeps_colons_in_details() {
        let content = Content::Rejected(RouteRejected {
            route_id: RouteId(4),
            worker: "truck-1".into(),
            reason: RejectReason::CapacityExceeded,
            details: "demand 60 exceeds capacity 50 (ratio: 1.2)".into(),
        });
        let wire = content.encode().unwrap();
        assert!(wire.starts_with("ROUTE_REJECTED:4|WORKER:truck-1|STATUS:REJECTED|REASON:CAPACITY_EXCEEDED|"));
        assert_eq!(Content::parse(&wire).unwrap(), content);
    }

    #[test]
    fn accepted_wire_shape() {
        let content = Content::Accepted(RouteAccepted {
            route_id: RouteId(5),
            worker: "truck-3".into(),
            quantity: 20,
            distance: 30.0,
            demand_count: 2,
        });
        assert_eq!(
            content.encode().unwrap(),
            "ROUTE_ACCEPTED:5|WORKER:truck-3|STATUS:ACCEPTED|QTY:20|DISTANCE:30.00|DEMANDS:2"
        );
    }

    #[test]
    fn bare_messages() {
        assert_eq!(Content::parse("QUERY_CAPABILITY").unwrap(), Content::QueryCapability);
        assert_eq!(Content::parse("ARRIVED_AT_DEPOT").unwrap(), Content::ArrivedAtDepot);
        assert!(Content::parse("ARRIVED_AT_DEPOT ").is_err());
        assert!(Content::parse("").is_err());
    }

    #[test]
    fn parse_is_fail_closed() {
        let cases = [
            // missing Y
            ("CAPACITY:50|MAX_DISTANCE:10.0|NAME:a|X:0.0", "protocol_missing_field"),
            // duplicate
            ("CAPACITY:50|CAPACITY:40|MAX_DISTANCE:10.0|NAME:a|X:0.0|Y:0.0", "protocol_duplicate_field"),
            // unknown key
            ("CAPACITY:50|MAX_DISTANCE:10.0|NAME:a|X:0.0|Y:0.0|Z:1", "protocol_unexpected_field"),
            // negative capacity
            ("CAPACITY:-5|MAX_DISTANCE:10.0|NAME:a|X:0.0|Y:0.0", "protocol_invalid_value"),
            // not a number
            ("CAPACITY:50|MAX_DISTANCE:NaN|NAME:a|X:0.0|Y:0.0", "protocol_invalid_value"),
            // segment without key
            ("CAPACITY:50|oops|NAME:a|X:0.0|Y:0.0", "protocol_malformed_segment"),
            ("ROUTE_ACCEPTED:5|WORKER:w|STATUS:REJECTED|QTY:1|DISTANCE:1.00|DEMANDS:1", "protocol_invalid_value"),
            ("ROUTE_REJECTED:5|WORKER:w|STATUS:REJECTED|REASON:TOO_FAR|DETAILS:x", "protocol_invalid_value"),
            ("HELLO", "protocol_unknown_message"),
        ];
        for (wire, label) in cases {
            let err = Content::parse(wire).unwrap_err();
            assert_eq!(err.as_label(), label, "{wire}");
        }
    }

    #[test]
    fn proposal_lists_must_line_up() {
        let wire = "ROUTE_ASSIGNMENT:ROUTE:1|WORKER_ID:1|WORKER_NAME:w|DEMANDS:1,2|DEMAND_IDS:C1|\
                    COORDS:1.00,1.00;2.00,2.00|QTY:3|DISTANCE:9.00|DEPOT_X:0.00|DEPOT_Y:0.00";
        assert_eq!(Content::parse(wire).unwrap_err().as_label(), "protocol_length_mismatch");
    }

    #[test]
    fn reserved_characters_cannot_be_encoded() {
        let mut p = proposal();
        p.demand_names[0] = "shop;annex".into();
        let err = Content::Proposal(p).encode().unwrap_err();
        assert!(matches!(err, ProtocolError::ReservedCharacter { field: "DEMAND_IDS", .. }));

        let report = Content::Capability(CapabilityReport {
            capacity: 1,
            max_distance: 1.0,
            name: "a|b".into(),
            position: Location::ORIGIN,
        });
        assert!(report.encode().is_err());
    }
}
