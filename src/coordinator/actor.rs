//! # CoordinatorActor: planning rounds over a fleet of workers.
//!
//! One actor owns the batch queue, the accumulation buffer, the capability
//! table and the active routes of every worker. Rounds run strictly one at a
//! time; messages, commands and timers are all handled from a single loop.
//!
//! ## Round flow
//! ```text
//! Idle ──decide()──► RoundStarted ──► CapabilityQuerySent
//!                                         │
//!        (all answered + min wait)        ▼ (timeout)
//!   CapabilitiesReady ◄────────── Collecting ──────────► CapabilitiesPartial
//!          │                                                  │
//!          └──────────────► solve() ◄─────────────────────────┘
//!                              │ Err → SolveFailed, batch discarded
//!                              ▼
//!                Solved → submit report → dispatch() → RouteProposed × N
//!                              │
//!                              ▼
//!   Settling ── ACCEPT → RouteAccepted (active)
//!            ── REJECT → RouteRejected + RejectionPolicy
//!            ── timeout → ProposalLost + RejectionPolicy
//!                              ▼
//!                       RoundCompleted ──► Idle
//! ```
//!
//! ## Rules
//! - A demand id is on at most one active route or pending proposal.
//! - Demands already on an active route are left out of the next solve.
//! - An accept for a proposal lost in the previous round is honored only while
//!   none of its demands has been routed again.
//! - Workers drive routes in acceptance order; an arrival retires the oldest.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::collector::{CapabilityCollector, Readiness, Recorded};
use super::dispatcher::Dispatch;
use super::handle::{Command, CoordinatorHandle, CoordinatorSnapshot};
use super::reconcile::Reconciler;
use super::scheduler::{Decision, decide};
use crate::config::CoordinatorConfig;
use crate::directory::{AgentKind, Directory, Mailbox};
use crate::error::SolveError;
use crate::events::{Bus, Event, EventKind};
use crate::model::{Batch, BatchId, Demand, DemandId, Route, RouteId, SolutionReport, WorkerCapability};
use crate::policies::RejectionPolicy;
use crate::protocol::{
    CapabilityReport, Content, ConversationId, Envelope, RouteAccepted, RouteProposal,
    RouteRejected,
};
use crate::solver::RouteSolver;
use crate::source::BatchSource;

enum Phase {
    Idle,
    Collecting {
        batch: Batch,
        collector: CapabilityCollector,
    },
    Settling {
        batch: Batch,
        dispatch: Dispatch,
    },
}

/// The planning actor. Owns every piece of coordinator state; nothing is shared.
pub struct CoordinatorActor {
    cfg: CoordinatorConfig,
    solver: Arc<dyn RouteSolver>,
    source: Option<Arc<dyn BatchSource>>,
    directory: Directory,
    bus: Bus,
    mailbox: Mailbox,
    rx: mpsc::Receiver<Envelope>,
    commands: mpsc::Receiver<Command>,

    phase: Phase,
    /// Set by a failed discovery; cleared by the next scheduler tick.
    hold: bool,
    queue: VecDeque<Batch>,
    reconciler: Reconciler,
    capabilities: BTreeMap<String, WorkerCapability>,
    /// Accepted routes per worker, in acceptance order. `None` is a route the
    /// worker drives but the coordinator no longer owns (a refused late accept).
    active: BTreeMap<String, VecDeque<Option<Route>>>,
    /// Proposals lost in the previous round that may still be accepted.
    late: HashMap<ConversationId, Route>,
    last_fresh: Option<BatchId>,
    synthetic_seq: u64,
    rounds_completed: u64,
    submissions: JoinSet<()>,
}

impl CoordinatorActor {
    pub fn new(
        cfg: CoordinatorConfig,
        solver: Arc<dyn RouteSolver>,
        source: Option<Arc<dyn BatchSource>>,
        directory: Directory,
        bus: Bus,
        mailbox_capacity: usize,
    ) -> (Self, CoordinatorHandle) {
        let capacity = mailbox_capacity.max(1);
        let (mailbox, rx) = mpsc::channel(capacity);
        let (cmd_tx, commands) = mpsc::channel(capacity);
        let reconciler = Reconciler::new(cfg.abandon_after());

        let actor = Self {
            cfg,
            solver,
            source,
            directory,
            bus,
            mailbox,
            rx,
            commands,
            phase: Phase::Idle,
            hold: false,
            queue: VecDeque::new(),
            reconciler,
            capabilities: BTreeMap::new(),
            active: BTreeMap::new(),
            late: HashMap::new(),
            last_fresh: None,
            synthetic_seq: 0,
            rounds_completed: 0,
            submissions: JoinSet::new(),
        };
        (actor, CoordinatorHandle::new(cmd_tx))
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_actor(self.cfg.name.as_str())
    }

    /// Registers in the directory and runs rounds until `token` is cancelled.
    ///
    /// Pending report submissions are awaited before returning.
    pub async fn run(mut self, token: CancellationToken) {
        if let Err(e) = self
            .directory
            .register(self.cfg.name.clone(), AgentKind::Coordinator, self.mailbox.clone())
            .await
        {
            self.bus
                .publish(self.event(EventKind::RegistrationFailed).with_reason(e.to_string()));
            return;
        }
        self.bus.publish(self.event(EventKind::ActorStarted));

        let period = self.cfg.schedule_interval;
        let mut tick = time::interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.deadline();
            let wake = async move {
                match deadline {
                    Some(at) => time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = token.cancelled() => break,
                Some(envelope) = self.rx.recv() => self.on_message(envelope).await,
                Some(command) = self.commands.recv() => self.on_command(command),
                _ = tick.tick() => self.hold = false,
                _ = wake => {}
                Some(_) = self.submissions.join_next(), if !self.submissions.is_empty() => {}
            }
            self.advance().await;
        }

        self.directory.deregister(&self.cfg.name).await;
        while self.submissions.join_next().await.is_some() {}
        self.bus.publish(self.event(EventKind::ActorStopped));
    }

    fn deadline(&self) -> Option<Instant> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Collecting { collector, .. } => Some(collector.deadline()),
            Phase::Settling { dispatch, .. } => Some(dispatch.deadline()),
        }
    }

    /// Runs phase transitions until the actor has to wait for something.
    ///
    /// Called after every wake-up of the main loop. Each pass takes the current
    /// phase out and either puts it back (still waiting on answers or a
    /// deadline) or moves on:
    /// - `Collecting` solves once the collector is complete or timed out, and
    ///   fails discovery if nobody answered at all;
    /// - `Settling` completes the round once every proposal is answered and
    ///   the settle time passed, or the proposal timeout hit;
    /// - `Idle` asks the scheduler for the next batch unless discovery is on hold.
    async fn advance(&mut self) {
        loop {
            let now = Instant::now();
            match std::mem::replace(&mut self.phase, Phase::Idle) {
                Phase::Collecting { batch, collector } => match collector.readiness(now) {
                    Readiness::Pending => {
                        self.phase = Phase::Collecting { batch, collector };
                        return;
                    }
                    Readiness::Complete => {
                        self.bus.publish(
                            self.event(EventKind::CapabilitiesReady)
                                .with_batch(&batch.id)
                                .with_count(collector.responded_count()),
                        );
                        self.solve(batch, &collector).await;
                    }
                    Readiness::Partial { .. } if collector.responded_count() == 0 => {
                        self.discovery_failed(batch, "no worker answered the capability query");
                    }
                    Readiness::Partial { missing } => {
                        self.bus.publish(
                            self.event(EventKind::CapabilitiesPartial)
                                .with_batch(&batch.id)
                                .with_count(collector.responded_count())
                                .with_reason(missing.join(",")),
                        );
                        self.solve(batch, &collector).await;
                    }
                },
                Phase::Settling { batch, mut dispatch } => {
                    if !dispatch.is_settled(now) {
                        self.phase = Phase::Settling { batch, dispatch };
                        return;
                    }
                    self.complete_round(&batch, &mut dispatch);
                }
                Phase::Idle => {
                    if self.hold {
                        return;
                    }
                    let decision = decide(
                        false,
                        self.queue.len(),
                        self.reconciler.buffered_len(),
                        self.cfg.flush_threshold,
                    );
                    let batch = match decision {
                        Decision::FlushBuffer => self.flush_buffer(),
                        Decision::NextBatch => match self.queue.pop_front() {
                            Some(batch) => {
                                self.last_fresh = Some(batch.id.clone());
                                batch
                            }
                            None => return,
                        },
                        Decision::Busy | Decision::Idle => return,
                    };
                    self.begin_round(batch).await;
                }
            }
        }
    }

    fn flush_buffer(&mut self) -> Batch {
        self.synthetic_seq += 1;
        let demands = self.reconciler.drain();
        let batch = Batch::synthetic(self.synthetic_seq, demands, self.last_fresh.clone());
        self.bus.publish(
            self.event(EventKind::BufferFlushed)
                .with_batch(&batch.id)
                .with_count(batch.demands.len()),
        );
        batch
    }

    async fn begin_round(&mut self, batch: Batch) {
        self.bus.publish(
            self.event(EventKind::RoundStarted)
                .with_batch(&batch.id)
                .with_count(batch.demands.len())
                .with_reason(if batch.synthetic { "synthetic" } else { "fresh" }),
        );

        let workers = self.directory.discover(AgentKind::Worker).await;
        self.capabilities.retain(|name, _| workers.contains(name));
        if workers.is_empty() {
            return self.discovery_failed(batch, "no workers registered");
        }

        let mut queried = Vec::with_capacity(workers.len());
        for worker in workers {
            let sent = match Envelope::new(
                self.cfg.name.as_str(),
                ConversationId::next(),
                &Content::QueryCapability,
            ) {
                Ok(envelope) => self
                    .directory
                    .send(&worker, envelope)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match sent {
                Ok(()) => queried.push(worker),
                Err(reason) => self.bus.publish(
                    self.event(EventKind::MessageDropped)
                        .with_worker(worker)
                        .with_reason(reason),
                ),
            }
        }
        if queried.is_empty() {
            return self.discovery_failed(batch, "no worker reachable");
        }

        self.bus.publish(
            self.event(EventKind::CapabilityQuerySent)
                .with_batch(&batch.id)
                .with_count(queried.len()),
        );
        let collector = CapabilityCollector::new(
            queried,
            Instant::now(),
            self.cfg.capability_min_wait,
            self.cfg.capability_timeout,
        );
        self.phase = Phase::Collecting { batch, collector };
    }

    fn discovery_failed(&mut self, batch: Batch, reason: &str) {
        self.bus.publish(
            self.event(EventKind::DiscoveryFailed)
                .with_batch(&batch.id)
                .with_reason(reason),
        );
        if batch.synthetic {
            self.reconciler.requeue(batch.demands);
        } else {
            self.queue.push_front(batch);
        }
        self.hold = true;
    }

    fn active_demand_ids(&self) -> HashSet<DemandId> {
        self.active
            .values()
            .flatten()
            .flatten()
            .flat_map(Route::demand_ids)
            .collect()
    }

    /// First demand of `route` already on an active route or a pending proposal.
    fn claimed(&self, route: &Route) -> Option<DemandId> {
        let mut taken = self.active_demand_ids();
        if let Phase::Settling { dispatch, .. } = &self.phase {
            taken.extend(dispatch.pending().flat_map(Route::demand_ids));
        }
        route.demand_ids().find(|id| taken.contains(id))
    }

    /// Plans the round and moves to `Settling`.
    ///
    /// The solve set is the batch plus the buffer, minus demands on active
    /// routes. A synthetic batch with nothing left to plan settles at once
    /// without a report. A solver error publishes `SolveFailed` and discards
    /// the batch: nothing is requeued and the actor goes back to idle.
    ///
    /// Otherwise the plan is reconciled (leftovers buffered or abandoned), the
    /// report is submitted in the background and every route is proposed.
    async fn solve(&mut self, batch: Batch, collector: &CapabilityCollector) {
        let active = self.active_demand_ids();
        let mut presented = self.reconciler.solve_set(&batch.demands);
        let before = presented.len();
        presented.retain(|d| !active.contains(&d.id));
        if presented.len() < before {
            self.bus.publish(
                self.event(EventKind::ActiveDemandsSkipped)
                    .with_batch(&batch.id)
                    .with_count(before - presented.len()),
            );
        }
        if presented.is_empty() && batch.synthetic {
            let dispatch = Dispatch::new(Instant::now(), self.cfg.settle, self.cfg.proposal_timeout);
            self.phase = Phase::Settling { batch, dispatch };
            return;
        }

        let workers: Vec<WorkerCapability> = collector
            .responded()
            .filter_map(|name| self.capabilities.get(name).cloned())
            .collect();
        let depot = self.cfg.depot;

        let started = Instant::now();
        let planned = self
            .solver
            .solve(depot, &presented, &workers)
            .and_then(|solution| build_routes(solution, &workers, &presented, depot));
        let solve_ms = started.elapsed().as_millis() as u64;

        let (routes, unplaced) = match planned {
            Ok(plan) => plan,
            Err(e) => {
                self.bus.publish(
                    self.event(EventKind::SolveFailed)
                        .with_batch(&batch.id)
                        .with_reason(e.to_string()),
                );
                return;
            }
        };

        let outcome = self.reconciler.reconcile(&presented, &routes, unplaced);
        for demand in &outcome.abandoned {
            self.bus.publish(
                self.event(EventKind::DemandAbandoned)
                    .with_batch(&batch.id)
                    .with_demand(demand.id.0)
                    .with_attempt(self.cfg.max_unplaced_rounds),
            );
        }

        let report = SolutionReport::new(
            batch.submission_id().cloned().unwrap_or_else(|| batch.id.clone()),
            &presented,
            &routes,
            &outcome.unplaced,
            &outcome.abandoned,
            solve_ms,
        );
        self.bus.publish(
            self.event(EventKind::Solved)
                .with_batch(&batch.id)
                .with_count(routes.len())
                .with_quantity(report.served_qty)
                .with_distance(report.total_distance)
                .with_delay(started.elapsed()),
        );
        if batch.submission_id().is_some() {
            self.submit(report);
        } else {
            self.bus
                .publish(self.event(EventKind::SubmissionSkipped).with_batch(&batch.id));
        }

        let dispatch = self.dispatch(routes).await;
        self.phase = Phase::Settling { batch, dispatch };
    }

    fn submit(&mut self, report: SolutionReport) {
        let Some(source) = self.source.clone() else {
            return;
        };
        let bus = self.bus.clone();
        let actor: Arc<str> = self.cfg.name.as_str().into();
        self.submissions.spawn(async move {
            let event = match source.submit_solution(&report).await {
                Ok(()) => Event::new(EventKind::SolutionSubmitted)
                    .with_count(report.routes.len())
                    .with_quantity(report.served_qty),
                Err(e) => Event::new(EventKind::SubmissionFailed).with_reason(e.to_string()),
            };
            bus.publish(event.with_actor(actor).with_batch(&report.batch_id));
        });
    }

    /// Proposes each route to its worker, each in a fresh conversation.
    ///
    /// The planned worker name is resolved through the directory (exact, then
    /// `name-` prefix). Routes whose worker is gone or whose mailbox refuses
    /// the message never reach the dispatch and go straight to
    /// [`undelivered`](Self::undelivered).
    async fn dispatch(&mut self, routes: Vec<Route>) -> Dispatch {
        let mut dispatch = Dispatch::new(Instant::now(), self.cfg.settle, self.cfg.proposal_timeout);

        for route in routes {
            let Some(worker) = self.directory.resolve(&route.worker).await else {
                self.bus.publish(
                    self.event(EventKind::WorkerNotFound)
                        .with_worker(route.worker.as_str())
                        .with_route(route.id.0),
                );
                self.undelivered(route);
                continue;
            };

            let conversation = ConversationId::next();
            let content = Content::Proposal(RouteProposal::for_route(&route, &worker, self.cfg.depot));
            let sent = match Envelope::new(self.cfg.name.as_str(), conversation, &content) {
                Ok(envelope) => self
                    .directory
                    .send(&worker, envelope)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(reason) = sent {
                self.bus.publish(
                    self.event(EventKind::MessageDropped)
                        .with_worker(worker)
                        .with_route(route.id.0)
                        .with_conversation(conversation.0)
                        .with_reason(reason),
                );
                self.undelivered(route);
                continue;
            }

            self.bus.publish(
                self.event(EventKind::RouteProposed)
                    .with_worker(worker)
                    .with_route(route.id.0)
                    .with_conversation(conversation.0)
                    .with_quantity(u64::from(route.total_quantity))
                    .with_distance(route.total_distance),
            );
            dispatch.propose(conversation, route);
        }
        dispatch
    }

    /// Applies the rejection policy to a route that will not run.
    ///
    /// `Requeue` puts its demands back in the buffer without counting a miss;
    /// `Drop` forgets them. Used for rejected, lost and undeliverable routes.
    fn undelivered(&mut self, route: Route) {
        let n = route.demands.len();
        let event = match self.cfg.rejection_policy {
            RejectionPolicy::Requeue => {
                self.reconciler.requeue(route.demands);
                self.event(EventKind::DemandsRequeued)
            }
            RejectionPolicy::Drop => self.event(EventKind::DemandsDropped),
        };
        self.bus.publish(event.with_route(route.id.0).with_count(n));
    }

    /// Turns unanswered proposals into `ProposalLost` and closes the round.
    ///
    /// Lost routes stay acceptable until the next round completes.
    fn complete_round(&mut self, batch: &Batch, dispatch: &mut Dispatch) {
        let lost = dispatch.drain_lost();
        self.late.clear();
        for (conversation, route) in lost {
            self.bus.publish(
                self.event(EventKind::ProposalLost)
                    .with_worker(route.worker.as_str())
                    .with_route(route.id.0)
                    .with_conversation(conversation.0),
            );
            self.undelivered(route.clone());
            self.late.insert(conversation, route);
        }

        self.rounds_completed += 1;
        self.bus.publish(
            self.event(EventKind::RoundCompleted)
                .with_batch(&batch.id)
                .with_count(dispatch.accepted())
                .with_reason(format!("buffered={}", self.reconciler.buffered_len())),
        );
    }

    async fn on_message(&mut self, envelope: Envelope) {
        let content = match envelope.decode() {
            Ok(c) => c,
            Err(e) => return self.dropped(&envelope, e.to_string()),
        };
        match content {
            Content::Capability(report) => self.on_capability(&envelope, report),
            Content::Accepted(accepted) => self.on_accepted(&envelope, accepted),
            Content::Rejected(rejected) => self.on_rejected(&envelope, rejected),
            Content::ArrivedAtDepot => self.on_arrival(&envelope),
            other => self.dropped(&envelope, format!("unexpected {}", other.kind())),
        }
    }

    fn check_sender(&self, envelope: &Envelope, claimed: &str) {
        if claimed != envelope.sender {
            self.bus.publish(
                self.event(EventKind::SenderMismatch)
                    .with_worker(envelope.sender.as_str())
                    .with_reason(claimed),
            );
        }
    }

    fn on_capability(&mut self, envelope: &Envelope, report: CapabilityReport) {
        self.check_sender(envelope, &report.name);
        let name = envelope.sender.clone();

        let recorded = match &mut self.phase {
            Phase::Collecting { collector, .. } => collector.record(&name),
            _ => Recorded::Unexpected,
        };
        let kind = match recorded {
            Recorded::First => EventKind::CapabilityReceived,
            Recorded::Duplicate | Recorded::Unexpected => EventKind::CapabilityUpdated,
        };
        self.bus.publish(
            self.event(kind)
                .with_worker(name.as_str())
                .with_quantity(u64::from(report.capacity))
                .with_distance(report.max_distance)
                .with_location(report.position),
        );
        self.capabilities.insert(
            name.clone(),
            WorkerCapability {
                name,
                capacity: report.capacity,
                max_distance: report.max_distance,
                position: report.position,
            },
        );
    }

    /// Records an accepted route as active.
    ///
    /// An accept for a proposal lost in the previous round ("late") is honored
    /// only if none of its demands has since been put on an active route or a
    /// pending proposal; its requeued copies then leave the buffer. Otherwise
    /// the accept is dropped, and an untracked slot is queued for the worker so
    /// the arrival of that route retires nothing the coordinator owns.
    fn on_accepted(&mut self, envelope: &Envelope, accepted: RouteAccepted) {
        self.check_sender(envelope, &accepted.worker);
        let conversation = envelope.conversation_id;

        let answered = match &mut self.phase {
            Phase::Settling { dispatch, .. } => dispatch.answer(conversation, true),
            _ => None,
        };
        let (route, late) = match answered {
            Some(route) => (route, false),
            None => match self.late.remove(&conversation) {
                Some(route) => {
                    if let Some(id) = self.claimed(&route) {
                        self.dropped(
                            envelope,
                            format!("late accept of route {}: demand {id} is routed again", route.id),
                        );
                        self.active
                            .entry(envelope.sender.clone())
                            .or_default()
                            .push_back(None);
                        return;
                    }
                    if self.cfg.rejection_policy == RejectionPolicy::Requeue {
                        self.reconciler.forget(route.demand_ids());
                    }
                    (route, true)
                }
                None => return self.dropped(envelope, "accept for unknown conversation".into()),
            },
        };

        let mut event = self
            .event(EventKind::RouteAccepted)
            .with_worker(envelope.sender.as_str())
            .with_route(route.id.0)
            .with_conversation(conversation.0);
        if late {
            event = event.with_reason("late");
        }
        self.bus.publish(event);
        self.active
            .entry(envelope.sender.clone())
            .or_default()
            .push_back(Some(route));
    }

    fn on_rejected(&mut self, envelope: &Envelope, rejected: RouteRejected) {
        self.check_sender(envelope, &rejected.worker);
        let conversation = envelope.conversation_id;
        let reason = format!("{}: {}", rejected.reason, rejected.details);

        let answered = match &mut self.phase {
            Phase::Settling { dispatch, .. } => dispatch.answer(conversation, false),
            _ => None,
        };
        let route_id = match answered {
            Some(route) => {
                let id = route.id;
                self.undelivered(route);
                id
            }
            None => match self.late.remove(&conversation) {
                Some(route) => route.id,
                None => return self.dropped(envelope, "reject for unknown conversation".into()),
            },
        };

        self.bus.publish(
            self.event(EventKind::RouteRejected)
                .with_worker(envelope.sender.as_str())
                .with_route(route_id.0)
                .with_conversation(conversation.0)
                .with_reason(reason),
        );
    }

    /// Retires the oldest route the sender accepted.
    ///
    /// Matching is by order only. An accept dropped for an unknown conversation
    /// leaves no slot, so if the worker really runs that route its arrival
    /// retires the next tracked one early.
    fn on_arrival(&mut self, envelope: &Envelope) {
        let finished = self
            .active
            .get_mut(&envelope.sender)
            .and_then(VecDeque::pop_front);
        if self.active.get(&envelope.sender).is_some_and(VecDeque::is_empty) {
            self.active.remove(&envelope.sender);
        }

        let mut event = self
            .event(EventKind::WorkerArrived)
            .with_worker(envelope.sender.as_str());
        match finished {
            Some(Some(route)) => event = event.with_route(route.id.0),
            Some(None) => event = event.with_reason("untracked route"),
            None => {}
        }
        self.bus.publish(event);
    }

    fn dropped(&self, envelope: &Envelope, reason: String) {
        self.bus.publish(
            self.event(EventKind::MessageDropped)
                .with_worker(envelope.sender.as_str())
                .with_conversation(envelope.conversation_id.0)
                .with_reason(reason),
        );
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Submit(batch) => self.accept_batch(batch),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Validates an incoming batch, caches its demands and queues it.
    fn accept_batch(&mut self, batch: Batch) {
        let Batch { id, demands, .. } = batch;
        let mut seen = HashSet::with_capacity(demands.len());
        let mut kept: Vec<Demand> = Vec::with_capacity(demands.len());

        for d in demands {
            let refusal = if !d.is_plannable() {
                Some(if d.quantity == 0 {
                    "quantity must be positive"
                } else {
                    "location is not finite"
                })
            } else if !seen.insert(d.id) {
                Some("repeated id in batch")
            } else {
                None
            };
            match refusal {
                Some(reason) => self.bus.publish(
                    self.event(EventKind::DemandRefused)
                        .with_batch(&id)
                        .with_demand(d.id.0)
                        .with_reason(reason),
                ),
                None => {
                    self.reconciler.remember(&d);
                    kept.push(d);
                }
            }
        }

        let batch = Batch::fresh(id, kept);
        self.bus.publish(
            self.event(EventKind::BatchQueued)
                .with_batch(&batch.id)
                .with_count(batch.demands.len())
                .with_quantity(batch.total_quantity()),
        );
        self.queue.push_back(batch);
    }

    fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            queued: self.queue.len(),
            buffered: self.reconciler.buffered_ids(),
            busy: !matches!(self.phase, Phase::Idle),
            rounds_completed: self.rounds_completed,
            active_routes: self
                .active
                .iter()
                .filter_map(|(worker, routes)| {
                    let ids: Vec<RouteId> = routes.iter().flatten().map(|r| r.id).collect();
                    (!ids.is_empty()).then(|| (worker.clone(), ids))
                })
                .collect(),
            capabilities: self.capabilities.values().cloned().collect(),
            abandoned: self.reconciler.abandoned_ids(),
        }
    }
}

/// Checks a solution against the round's inputs and assigns route ids.
fn build_routes(
    solution: crate::solver::Solution,
    workers: &[WorkerCapability],
    presented: &[Demand],
    depot: crate::model::Location,
) -> Result<(Vec<Route>, Vec<Demand>), SolveError> {
    let known: HashSet<DemandId> = presented.iter().map(|d| d.id).collect();
    let mut placed: HashSet<DemandId> = HashSet::new();
    let mut routes = Vec::with_capacity(solution.routes.len());

    for planned in solution.routes {
        let Some(worker) = workers.get(planned.worker) else {
            return Err(SolveError::InvalidPlan {
                reason: format!("worker index {} out of range", planned.worker),
            });
        };
        if planned.demands.is_empty() {
            continue;
        }
        for d in &planned.demands {
            if !known.contains(&d.id) {
                return Err(SolveError::InvalidPlan {
                    reason: format!("demand {} was not presented", d.id),
                });
            }
            if !placed.insert(d.id) {
                return Err(SolveError::InvalidPlan {
                    reason: format!("demand {} routed twice", d.id),
                });
            }
        }
        let index = u32::try_from(planned.worker + 1).unwrap_or(u32::MAX);
        routes.push(Route::new(
            RouteId::next(),
            worker.name.as_str(),
            index,
            planned.demands,
            depot,
        ));
    }
    Ok((routes, solution.unplaced))
}
