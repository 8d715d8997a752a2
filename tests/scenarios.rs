//! End-to-end fleet scenarios on paused tokio time.

use std::sync::Arc;
use std::time::Duration;

use routevisor::{
    Batch, Config, Demand, DemandId, Event, EventKind, Fleet, FleetBuilder, FleetHandle,
    InMemorySource, JournalWriter, Location, PlannedRoute, RejectionPolicy, RouteSolver,
    RuntimeError, Solution, SolveError, WorkerCapability, WorkerSpec,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

type Running = JoinHandle<Result<(), RuntimeError>>;

fn config() -> Config {
    let mut cfg = Config::default();
    cfg.worker.speed = 5.0;
    cfg.grace = Duration::from_secs(5);
    cfg
}

fn start(fleet: Fleet) -> (FleetHandle, broadcast::Receiver<Event>, Running) {
    let handle = fleet.handle();
    let rx = handle.events();
    let running = tokio::spawn(fleet.run());
    (handle, rx, running)
}

/// Reads events into `seen` until one matches `pred`.
async fn wait_for(
    rx: &mut broadcast::Receiver<Event>,
    seen: &mut Vec<Event>,
    pred: impl Fn(&Event) -> bool,
) -> Event {
    let found = tokio::time::timeout(Duration::from_secs(3600), async {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    seen.push(ev.clone());
                    if pred(&ev) {
                        return ev;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("bus closed"),
            }
        }
    })
    .await;
    found.expect("expected event never arrived")
}

async fn stop(handle: FleetHandle, running: Running) {
    handle.shutdown();
    running.await.unwrap().unwrap();
}

fn is(kind: EventKind) -> impl Fn(&Event) -> bool {
    move |ev| ev.kind == kind
}

fn at(x: f64, y: f64) -> Location {
    Location::new(x, y)
}

#[tokio::test(start_paused = true)]
async fn batch_within_capacity_is_fully_served() {
    let source = Arc::new(InMemorySource::with_batches([Batch::fresh(
        "a",
        vec![
            Demand::new(1, 20, at(3.0, 4.0)),
            Demand::new(2, 15, at(-2.0, 6.0)),
            Demand::new(3, 10, at(5.0, -5.0)),
            Demand::new(4, 20, at(-4.0, -3.0)),
            Demand::new(5, 10, at(8.0, 1.0)),
        ],
    )]));
    let fleet = FleetBuilder::new(config())
        .with_source(source.clone())
        .with_workers((1..=4).map(|i| WorkerSpec::new(format!("truck-{i}"), 50, 1000.0)))
        .build()
        .unwrap();
    let (handle, mut rx, running) = start(fleet);
    let mut seen = Vec::new();

    wait_for(&mut rx, &mut seen, is(EventKind::SolutionSubmitted)).await;
    let reports = source.submitted().await;
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.batch_id.as_str(), "a");
    assert!(report.unplaced.is_empty());
    assert_eq!(report.served_qty, 75);
    assert_eq!(report.total_qty, 75);

    let completed = wait_for(&mut rx, &mut seen, is(EventKind::RoundCompleted)).await;
    assert_eq!(completed.count, Some(report.routes.len() as u32));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.capabilities.len(), 4);
    assert!(snapshot.buffered.is_empty());

    stop(handle, running).await;
}

#[tokio::test(start_paused = true)]
async fn leftovers_come_back_in_a_synthetic_round() {
    let quantities = [30, 30, 25, 25, 20, 10];
    let demands = quantities
        .iter()
        .enumerate()
        .map(|(i, &q)| Demand::new(i as u64 + 1, q, at(i as f64 + 1.0, 2.0)))
        .collect();
    let source = Arc::new(InMemorySource::with_batches([Batch::fresh("b", demands)]));
    let fleet = FleetBuilder::new(config())
        .with_source(source.clone())
        .with_workers((1..=4).map(|i| WorkerSpec::new(format!("van-{i}"), 30, 1000.0)))
        .build()
        .unwrap();
    let (handle, mut rx, running) = start(fleet);
    let mut seen = Vec::new();

    wait_for(&mut rx, &mut seen, is(EventKind::SolutionSubmitted)).await;
    let flushed = wait_for(&mut rx, &mut seen, is(EventKind::BufferFlushed)).await;
    wait_for(&mut rx, &mut seen, is(EventKind::SolutionSubmitted)).await;

    let reports = source.submitted().await;
    assert_eq!(reports.len(), 2);
    let (first, second) = (&reports[0], &reports[1]);
    assert!(!first.unplaced.is_empty());
    assert!(first.served_qty <= 120);
    assert_eq!(flushed.count, Some(first.unplaced.len() as u32));

    assert_eq!(second.batch_id.as_str(), "b");
    assert!(second.unplaced.len() < first.unplaced.len());
    assert_eq!(first.served_qty + second.served_qty, 140);

    stop(handle, running).await;
}

#[tokio::test(start_paused = true)]
async fn unreachable_demand_waits_in_the_buffer() {
    let source = Arc::new(InMemorySource::with_batches([Batch::fresh(
        "c",
        vec![Demand::new(1, 5, at(100.0, 100.0))],
    )]));
    let fleet = FleetBuilder::new(config())
        .with_source(source.clone())
        .with_worker(WorkerSpec::new("bike", 10, 50.0))
        .build()
        .unwrap();
    let (handle, mut rx, running) = start(fleet);
    let mut seen = Vec::new();

    for _ in 0..3 {
        wait_for(&mut rx, &mut seen, is(EventKind::SolutionSubmitted)).await;
    }
    assert!(!seen.iter().any(|ev| ev.kind == EventKind::DemandAbandoned));
    for report in source.submitted().await {
        assert_eq!(report.batch_id.as_str(), "c");
        assert_eq!(report.unplaced.len(), 1);
        assert!(report.routes.is_empty());
        assert!(report.infeasible.is_empty());
    }

    stop(handle, running).await;
}

#[tokio::test(start_paused = true)]
async fn unreachable_demand_is_abandoned_after_the_limit() {
    let source = Arc::new(InMemorySource::with_batches([Batch::fresh(
        "c",
        vec![Demand::new(1, 5, at(100.0, 100.0))],
    )]));
    let mut cfg = config();
    cfg.coordinator.max_unplaced_rounds = 3;
    let fleet = FleetBuilder::new(cfg)
        .with_source(source.clone())
        .with_worker(WorkerSpec::new("bike", 10, 50.0))
        .build()
        .unwrap();
    let (handle, mut rx, running) = start(fleet);
    let mut seen = Vec::new();

    let abandoned = wait_for(&mut rx, &mut seen, is(EventKind::DemandAbandoned)).await;
    assert_eq!(abandoned.demand, Some(1));
    assert_eq!(abandoned.attempt, Some(3));
    let solved = seen.iter().filter(|ev| ev.kind == EventKind::Solved).count();
    assert_eq!(solved, 2);

    // The third report carries the demand as infeasible.
    while source.submitted().await.len() < 3 {
        wait_for(&mut rx, &mut seen, is(EventKind::SolutionSubmitted)).await;
    }
    let reports = source.submitted().await;
    let last = &reports[2];
    assert_eq!(last.batch_id.as_str(), "c");
    assert!(last.unplaced.is_empty());
    assert_eq!(last.infeasible.len(), 1);
    assert_eq!(last.infeasible[0].id, DemandId(1));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.abandoned, vec![DemandId(1)]);
    assert!(snapshot.buffered.is_empty());

    stop(handle, running).await;
}

#[tokio::test(start_paused = true)]
async fn second_route_waits_for_the_first_to_return() {
    let mut cfg = config();
    cfg.worker.speed = 1.0;
    let fleet = FleetBuilder::new(cfg)
        .with_worker(WorkerSpec::new("truck", 50, 1000.0))
        .build()
        .unwrap();
    let (handle, mut rx, running) = start(fleet);
    let mut seen = Vec::new();

    handle
        .submit(Batch::fresh("d1", vec![Demand::new(1, 10, at(100.0, 0.0))]))
        .await
        .unwrap();
    handle
        .submit(Batch::fresh("d2", vec![Demand::new(2, 10, at(0.0, 20.0))]))
        .await
        .unwrap();

    let first = wait_for(&mut rx, &mut seen, is(EventKind::RouteAccepted)).await;
    let second = wait_for(&mut rx, &mut seen, is(EventKind::RouteAccepted)).await;
    let (r1, r2) = (first.route.unwrap(), second.route.unwrap());
    assert_ne!(r1, r2);

    wait_for(&mut rx, &mut seen, |ev| {
        ev.kind == EventKind::RouteStarted && ev.route == Some(r2)
    })
    .await;

    let position = |kind: EventKind, route: u64| {
        seen.iter()
            .position(|ev| ev.kind == kind && ev.route == Some(route))
            .unwrap()
    };
    let accepted_r2 = position(EventKind::RouteAccepted, r2);
    let returned_r1 = position(EventKind::ReturnedToDepot, r1);
    let started_r2 = position(EventKind::RouteStarted, r2);
    assert!(accepted_r2 < returned_r1);
    assert!(returned_r1 < started_r2);

    let earlier = seen
        .iter()
        .find(|ev| ev.kind == EventKind::WorkerArrived)
        .cloned();
    let arrived = match earlier {
        Some(ev) => ev,
        None => wait_for(&mut rx, &mut seen, is(EventKind::WorkerArrived)).await,
    };
    assert_eq!(arrived.route, Some(r1));

    stop(handle, running).await;
}

/// Puts every demand on the first worker regardless of capacity.
struct Overloader;

impl RouteSolver for Overloader {
    fn solve(
        &self,
        _depot: Location,
        demands: &[Demand],
        _workers: &[WorkerCapability],
    ) -> Result<Solution, SolveError> {
        Ok(Solution {
            routes: vec![PlannedRoute {
                worker: 0,
                demands: demands.to_vec(),
            }],
            unplaced: vec![],
        })
    }

    fn name(&self) -> &'static str {
        "overloader"
    }
}

fn overloaded_fleet(policy: RejectionPolicy) -> Fleet {
    let mut cfg = config();
    cfg.coordinator.rejection_policy = policy;
    FleetBuilder::new(cfg)
        .with_solver(Overloader)
        .with_worker(WorkerSpec::new("cart", 10, 1000.0))
        .build()
        .unwrap()
}

fn overload() -> Batch {
    Batch::fresh(
        "e",
        vec![
            Demand::new(1, 6, at(1.0, 0.0)),
            Demand::new(2, 6, at(0.0, 1.0)),
        ],
    )
}

#[tokio::test(start_paused = true)]
async fn rejected_route_is_requeued() {
    let (handle, mut rx, running) = start(overloaded_fleet(RejectionPolicy::Requeue));
    let mut seen = Vec::new();
    handle.submit(overload()).await.unwrap();

    let refused = wait_for(&mut rx, &mut seen, is(EventKind::ProposalRefused)).await;
    assert_eq!(refused.actor.as_deref(), Some("cart"));

    let rejected = wait_for(&mut rx, &mut seen, is(EventKind::RouteRejected)).await;
    assert!(
        rejected
            .reason
            .as_deref()
            .unwrap()
            .starts_with("CAPACITY_EXCEEDED")
    );
    let requeued = seen
        .iter()
        .find(|ev| ev.kind == EventKind::DemandsRequeued)
        .unwrap();
    assert_eq!(requeued.count, Some(2));

    let flushed = wait_for(&mut rx, &mut seen, is(EventKind::BufferFlushed)).await;
    assert_eq!(flushed.count, Some(2));

    stop(handle, running).await;
}

#[tokio::test(start_paused = true)]
async fn rejected_route_is_dropped() {
    let (handle, mut rx, running) = start(overloaded_fleet(RejectionPolicy::Drop));
    let mut seen = Vec::new();
    handle.submit(overload()).await.unwrap();

    wait_for(&mut rx, &mut seen, is(EventKind::RoundCompleted)).await;
    let dropped = seen
        .iter()
        .find(|ev| ev.kind == EventKind::DemandsDropped)
        .unwrap();
    assert_eq!(dropped.count, Some(2));

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.buffered.is_empty());
    assert!(snapshot.active_routes.is_empty());

    stop(handle, running).await;
}

#[tokio::test(start_paused = true)]
async fn discovery_retries_until_a_worker_joins() {
    let fleet = FleetBuilder::new(config()).build().unwrap();
    let (handle, mut rx, running) = start(fleet);
    let mut seen = Vec::new();

    handle
        .submit(Batch::fresh("f", vec![Demand::new(1, 3, at(2.0, 2.0))]))
        .await
        .unwrap();
    wait_for(&mut rx, &mut seen, is(EventKind::DiscoveryFailed)).await;
    assert_eq!(handle.snapshot().await.unwrap().queued, 1);

    assert!(handle.spawn_worker(WorkerSpec::new("late|comer", 5, 10.0)).is_err());
    handle
        .spawn_worker(WorkerSpec::new("late-comer", 5, 100.0))
        .unwrap();

    let solved = wait_for(&mut rx, &mut seen, is(EventKind::Solved)).await;
    assert_eq!(solved.batch.as_deref(), Some("f"));
    assert_eq!(solved.count, Some(1));
    assert!(handle.directory().contains("late-comer").await);

    stop(handle.clone(), running).await;
    assert!(matches!(
        handle.spawn_worker(WorkerSpec::new("too-late", 5, 10.0)),
        Err(RuntimeError::FleetStopped)
    ));
}

#[tokio::test]
async fn journal_records_the_whole_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.log");
    let journal = JournalWriter::open(&path).await.unwrap();

    let mut cfg = config();
    cfg.coordinator.schedule_interval = Duration::from_millis(20);
    cfg.coordinator.capability_min_wait = Duration::from_millis(20);
    cfg.coordinator.capability_timeout = Duration::from_millis(500);
    cfg.coordinator.settle = Duration::from_millis(20);
    let fleet = FleetBuilder::new(cfg)
        .with_worker(WorkerSpec::new("truck", 10, 100.0))
        .with_subscribers(vec![Arc::new(journal)])
        .build()
        .unwrap();
    let (handle, mut rx, running) = start(fleet);
    let mut seen = Vec::new();

    handle
        .submit(Batch::fresh("g", vec![Demand::new(1, 3, at(1.0, 1.0))]))
        .await
        .unwrap();
    wait_for(&mut rx, &mut seen, is(EventKind::RoundCompleted)).await;
    stop(handle, running).await;

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("round_started"));
    assert!(text.contains("route_accepted actor=coordinator worker=truck"));
    assert!(text.lines().last().unwrap().contains("all_stopped_within_grace"));
}
