//! # WorkerActor: one delivery vehicle.
//!
//! ```text
//! loop select! {
//!   cancelled            → deregister, stop
//!   mailbox  ─► QUERY_CAPABILITY → INFORM capability (current position)
//!            ─► PROPOSE          → check name / capacity / distance
//!                                   ├─ ok  → queue route, INFORM accepted
//!                                   └─ bad → REFUSE rejected(reason)
//!   tick     ─► Execution::tick()   → progress events, ARRIVED_AT_DEPOT on return
//!   drift    ─► Execution::correct_drift()
//! }
//! ```
//!
//! Replies go to the envelope sender; arrival notices go to the first coordinator
//! found in the directory. Nothing a worker sends is retried.

use tokio::sync::mpsc;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::execution::{Execution, Itinerary, Progress};
use crate::config::WorkerConfig;
use crate::directory::{AgentKind, Directory};
use crate::events::{Bus, Event, EventKind};
use crate::model::{Location, RouteId};
use crate::protocol::{
    CapabilityReport, Content, ConversationId, Envelope, RejectReason, RouteAccepted,
    RouteProposal, RouteRejected,
};

/// Declared distances travel with two decimals.
const DISTANCE_SLACK: f64 = 0.005;

/// Static description of a worker.
#[derive(Debug, Clone)]
pub struct WorkerParams {
    pub name: String,
    pub capacity: u32,
    pub max_distance: f64,
    /// Starting position and home depot until a proposal says otherwise.
    pub depot: Location,
    pub tick: Duration,
    pub speed: f64,
    pub arrival_threshold: f64,
    pub drift_check: Duration,
}

impl WorkerParams {
    pub fn new(name: impl Into<String>, capacity: u32, max_distance: f64, depot: Location) -> Self {
        Self::with_config(name, capacity, max_distance, depot, &WorkerConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        capacity: u32,
        max_distance: f64,
        depot: Location,
        cfg: &WorkerConfig,
    ) -> Self {
        Self {
            name: name.into(),
            capacity,
            max_distance,
            depot,
            tick: cfg.tick,
            speed: cfg.speed,
            arrival_threshold: cfg.arrival_threshold,
            drift_check: cfg.drift_check,
        }
    }
}

/// Refusal reason and details for a proposal, if it must be refused.
pub(crate) fn check_proposal(
    name: &str,
    capacity: u32,
    max_distance: f64,
    p: &RouteProposal,
) -> Option<(RejectReason, String)> {
    if p.worker_name != name {
        Some((
            RejectReason::WrongWorker,
            format!("route addressed to {}, this is {name}", p.worker_name),
        ))
    } else if p.quantity > capacity {
        Some((
            RejectReason::CapacityExceeded,
            format!("quantity {} over capacity {capacity}", p.quantity),
        ))
    } else if p.distance > max_distance + DISTANCE_SLACK {
        Some((
            RejectReason::DistanceExceeded,
            format!("distance {:.2} over limit {max_distance:.2}", p.distance),
        ))
    } else {
        None
    }
}

/// A delivery vehicle actor.
pub struct WorkerActor {
    params: WorkerParams,
    exec: Execution,
    directory: Directory,
    bus: Bus,
    tx: mpsc::Sender<Envelope>,
    rx: mpsc::Receiver<Envelope>,
}

impl WorkerActor {
    pub fn new(params: WorkerParams, directory: Directory, bus: Bus, mailbox_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
        let exec = Execution::new(params.depot, params.speed, params.arrival_threshold);
        Self {
            params,
            exec,
            directory,
            bus,
            tx,
            rx,
        }
    }

    pub fn name(&self) -> &str {
        &self.params.name
    }

    /// Registers in the directory and serves until `token` is cancelled.
    ///
    /// Returns immediately (with `RegistrationFailed`) if the name is taken.
    pub async fn run(mut self, token: CancellationToken) {
        let name = self.params.name.clone();
        if let Err(e) = self
            .directory
            .register(name.clone(), AgentKind::Worker, self.tx.clone())
            .await
        {
            self.bus.publish(
                Event::new(EventKind::RegistrationFailed)
                    .with_actor(name.as_str())
                    .with_reason(e.to_string()),
            );
            return;
        }
        self.bus.publish(
            Event::new(EventKind::ActorStarted)
                .with_actor(name.as_str())
                .with_location(self.exec.position()),
        );

        let mut tick = time::interval_at(time::Instant::now() + self.params.tick, self.params.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut drift = time::interval_at(
            time::Instant::now() + self.params.drift_check,
            self.params.drift_check,
        );
        drift.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                Some(envelope) = self.rx.recv() => self.on_message(envelope).await,
                _ = tick.tick() => {
                    let progress = self.exec.tick();
                    self.report(progress).await;
                }
                _ = drift.tick() => {
                    let progress = self.exec.correct_drift();
                    self.report(progress).await;
                }
            }
        }

        self.directory.deregister(&name).await;
        self.bus
            .publish(Event::new(EventKind::ActorStopped).with_actor(name.as_str()));
    }

    async fn on_message(&mut self, envelope: Envelope) {
        let content = match envelope.decode() {
            Ok(c) => c,
            Err(e) => return self.dropped(&envelope, e.to_string()),
        };

        match content {
            Content::QueryCapability => {
                let report = Content::Capability(CapabilityReport {
                    capacity: self.params.capacity,
                    max_distance: self.params.max_distance,
                    name: self.params.name.clone(),
                    position: self.exec.position(),
                });
                self.reply(&envelope, &report).await;
            }
            Content::Proposal(p) => self.on_proposal(&envelope, p).await,
            other => self.dropped(&envelope, format!("unexpected {}", other.kind())),
        }
    }

    async fn on_proposal(&mut self, envelope: &Envelope, p: RouteProposal) {
        let name = self.params.name.as_str();
        if let Some((reason, details)) =
            check_proposal(name, self.params.capacity, self.params.max_distance, &p)
        {
            self.bus.publish(
                Event::new(EventKind::ProposalRefused)
                    .with_actor(name)
                    .with_route(p.route_id.0)
                    .with_conversation(envelope.conversation_id.0)
                    .with_reason(format!("{reason}: {details}")),
            );
            let refusal = Content::Rejected(RouteRejected {
                route_id: p.route_id,
                worker: name.to_string(),
                reason,
                details,
            });
            return self.reply(envelope, &refusal).await;
        }

        self.exec.set_depot(p.depot);
        let accepted = Content::Accepted(RouteAccepted {
            route_id: p.route_id,
            worker: name.to_string(),
            quantity: p.quantity,
            distance: p.distance,
            demand_count: p.demand_ids.len(),
        });
        self.reply(envelope, &accepted).await;

        let progress = self.exec.enqueue(Itinerary::from(&p));
        let waiting = self.exec.queued() + usize::from(self.exec.active_route().is_some());
        self.bus.publish(
            Event::new(EventKind::RouteQueued)
                .with_actor(self.params.name.as_str())
                .with_route(p.route_id.0)
                .with_count(waiting),
        );
        self.report(progress).await;
    }

    async fn report(&self, progress: Vec<Progress>) {
        let name = self.params.name.as_str();
        for step in progress {
            let event = match step {
                Progress::Started { route, stops } => Event::new(EventKind::RouteStarted)
                    .with_route(route.0)
                    .with_count(stops),
                Progress::Visited { route, demand, at } => Event::new(EventKind::DemandVisited)
                    .with_route(route.0)
                    .with_demand(demand.0)
                    .with_location(at),
                Progress::Returning { route } => {
                    Event::new(EventKind::ReturningToDepot).with_route(route.0)
                }
                Progress::Returned { route, at } => {
                    self.bus.publish(
                        Event::new(EventKind::ReturnedToDepot)
                            .with_actor(name)
                            .with_route(route.0)
                            .with_location(at),
                    );
                    self.notify_arrival(route).await;
                    continue;
                }
                Progress::DriftCorrected { from } => Event::new(EventKind::DriftCorrected)
                    .with_location(from)
                    .with_reason(format!(
                        "snapped to depot ({:.2}, {:.2})",
                        self.exec.depot().x,
                        self.exec.depot().y
                    )),
            };
            self.bus.publish(event.with_actor(name));
        }
    }

    async fn notify_arrival(&self, route: RouteId) {
        let name = self.params.name.as_str();
        let Some(coordinator) = self
            .directory
            .discover(AgentKind::Coordinator)
            .await
            .into_iter()
            .next()
        else {
            self.bus.publish(
                Event::new(EventKind::MessageDropped)
                    .with_actor(name)
                    .with_route(route.0)
                    .with_reason("no coordinator to notify"),
            );
            return;
        };

        let sent = match Envelope::new(name, ConversationId::next(), &Content::ArrivedAtDepot) {
            Ok(envelope) => self
                .directory
                .send(&coordinator, envelope)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(reason) = sent {
            self.bus.publish(
                Event::new(EventKind::MessageDropped)
                    .with_actor(name)
                    .with_worker(coordinator)
                    .with_route(route.0)
                    .with_reason(reason),
            );
        }
    }

    async fn reply(&self, request: &Envelope, content: &Content) {
        let sent = match request.reply(self.params.name.as_str(), content) {
            Ok(envelope) => self
                .directory
                .send(&request.sender, envelope)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(reason) = sent {
            self.dropped(request, reason);
        }
    }

    fn dropped(&self, envelope: &Envelope, reason: String) {
        self.bus.publish(
            Event::new(EventKind::MessageDropped)
                .with_actor(self.params.name.as_str())
                .with_worker(envelope.sender.as_str())
                .with_conversation(envelope.conversation_id.0)
                .with_reason(reason),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Demand, DemandId, Route};

    fn proposal(worker: &str, qty: u32, distance: f64) -> RouteProposal {
        RouteProposal {
            route_id: RouteId(5),
            worker_index: 1,
            worker_name: worker.into(),
            demand_ids: vec![DemandId(1)],
            demand_names: vec!["C1".into()],
            coords: vec![Location::new(3.0, 4.0)],
            quantity: qty,
            distance,
            depot: Location::ORIGIN,
        }
    }

    #[test]
    fn refusals_are_checked_in_order() {
        let wrong = check_proposal("truck-1", 10, 10.0, &proposal("truck-2", 99, 99.0));
        assert_eq!(wrong.map(|(r, _)| r), Some(RejectReason::WrongWorker));

        let heavy = check_proposal("truck-1", 10, 10.0, &proposal("truck-1", 11, 99.0));
        assert_eq!(heavy.map(|(r, _)| r), Some(RejectReason::CapacityExceeded));

        let far = check_proposal("truck-1", 10, 10.0, &proposal("truck-1", 10, 10.01));
        assert_eq!(far.map(|(r, _)| r), Some(RejectReason::DistanceExceeded));

        assert!(check_proposal("truck-1", 10, 10.0, &proposal("truck-1", 10, 10.0)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn accepts_drives_and_reports_arrival() {
        let directory = Directory::new();
        let bus = Bus::new(256);
        let (coord_tx, mut coord_rx) = mpsc::channel(8);
        directory
            .register("coordinator", AgentKind::Coordinator, coord_tx)
            .await
            .unwrap();

        let params = WorkerParams::new("truck-1", 10, 100.0, Location::ORIGIN);
        let token = CancellationToken::new();
        let worker = tokio::spawn(WorkerActor::new(params, directory.clone(), bus.clone(), 8).run(token.clone()));
        while !directory.contains("truck-1").await {
            tokio::task::yield_now().await;
        }

        let route = Route::new(
            RouteId(5),
            "truck-1",
            1,
            vec![Demand::new(1, 4, Location::new(3.0, 4.0))],
            Location::ORIGIN,
        );
        let content = Content::Proposal(RouteProposal::for_route(&route, "truck-1", Location::ORIGIN));
        let conv = ConversationId::next();
        directory
            .send("truck-1", Envelope::new("coordinator", conv, &content).unwrap())
            .await
            .unwrap();

        let reply = coord_rx.recv().await.unwrap();
        assert_eq!(reply.conversation_id, conv);
        assert!(matches!(reply.decode().unwrap(), Content::Accepted(a) if a.route_id == RouteId(5)));

        let arrival = coord_rx.recv().await.unwrap();
        assert_eq!(arrival.sender, "truck-1");
        assert_eq!(arrival.decode().unwrap(), Content::ArrivedAtDepot);

        token.cancel();
        worker.await.unwrap();
        assert!(!directory.contains("truck-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn refuses_overweight_route() {
        let directory = Directory::new();
        let bus = Bus::new(64);
        let (coord_tx, mut coord_rx) = mpsc::channel(8);
        directory
            .register("coordinator", AgentKind::Coordinator, coord_tx)
            .await
            .unwrap();

        let token = CancellationToken::new();
        let params = WorkerParams::new("truck-1", 3, 100.0, Location::ORIGIN);
        tokio::spawn(WorkerActor::new(params, directory.clone(), bus, 8).run(token.clone()));
        while !directory.contains("truck-1").await {
            tokio::task::yield_now().await;
        }

        let content = Content::Proposal(proposal("truck-1", 4, 10.0));
        directory
            .send("truck-1", Envelope::new("coordinator", ConversationId::next(), &content).unwrap())
            .await
            .unwrap();

        match coord_rx.recv().await.unwrap().decode().unwrap() {
            Content::Rejected(r) => assert_eq!(r.reason, RejectReason::CapacityExceeded),
            other => panic!("unexpected {other:?}"),
        }
        token.cancel();
    }
}
