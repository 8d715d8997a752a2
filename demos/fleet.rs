//! # Demo: fleet
//!
//! Four trucks serve two batches from an in-memory source. The first batch fits
//! the fleet; the second asks for more than the trucks can carry at once, so its
//! leftovers are buffered and planned again in a synthetic round.
//!
//! ## Flow
//! ```text
//! InMemorySource ──► poller ──► CoordinatorActor ──► WorkerActor × 4
//!        ▲                            │
//!        └──── SolutionReport ◄───────┘
//! Bus ──► LogWriter (tracing)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=routevisor=debug cargo run --example fleet
//! cargo run --example fleet -- fleet.toml
//! ```

use std::sync::Arc;
use std::time::Duration;

use routevisor::{
    Batch, Config, Demand, EventKind, FleetBuilder, InMemorySource, Location, LogWriter,
    Subscribe, WorkerSpec,
};

fn city_batch() -> Batch {
    let stops = [
        (20, 3.0, 4.0),
        (15, -2.0, 6.0),
        (10, 5.0, -5.0),
        (20, -4.0, -3.0),
        (10, 8.0, 1.0),
    ];
    Batch::fresh("city", demands(1, &stops))
}

fn rush_batch() -> Batch {
    let stops = [
        (30, 12.0, 0.0),
        (30, 0.0, 12.0),
        (25, -12.0, 0.0),
        (25, 0.0, -12.0),
        (20, 9.0, 9.0),
        (10, -9.0, -9.0),
    ];
    Batch::fresh("rush", demands(100, &stops))
}

fn demands(first_id: u64, stops: &[(u32, f64, f64)]) -> Vec<Demand> {
    stops
        .iter()
        .zip(first_id..)
        .map(|(&(qty, x, y), id)| Demand::new(id, qty, Location::new(x, y)))
        .collect()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    routevisor::init_tracing("info");

    let mut cfg = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => {
            let mut cfg = Config::default();
            cfg.coordinator.capability_min_wait = Duration::from_millis(500);
            cfg.coordinator.capability_timeout = Duration::from_secs(2);
            cfg.worker.tick = Duration::from_millis(100);
            cfg.worker.speed = 2.0;
            cfg
        }
    };
    cfg = cfg.with_env_overrides();

    let source = Arc::new(InMemorySource::with_batches([city_batch(), rush_batch()]));
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let fleet = FleetBuilder::new(cfg)
        .with_source(source.clone())
        .with_workers([
            WorkerSpec::new("truck-1", 30, 500.0),
            WorkerSpec::new("truck-2", 30, 500.0),
            WorkerSpec::new("truck-3", 30, 500.0),
            WorkerSpec::new("truck-4", 30, 500.0),
        ])
        .with_subscribers(subs)
        .build()?;

    // Stop once every batch, leftovers included, has been reported.
    let handle = fleet.handle();
    let mut events = handle.events();
    let pending = source.clone();
    let watcher = tokio::spawn(async move {
        while let Ok(ev) = events.recv().await {
            if ev.kind != EventKind::RoundCompleted {
                continue;
            }
            match handle.snapshot().await {
                Ok(s) if s.queued == 0 && s.buffered.is_empty() && !s.busy => {
                    if pending.pending_len().await == 0 {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => return,
            }
        }
        handle.shutdown();
    });

    fleet.run().await?;
    watcher.abort();

    for report in source.submitted().await {
        println!(
            "{}: {} routes, served {}/{} ({:.0}%), {} unplaced, distance {:.2}",
            report.batch_id,
            report.routes.len(),
            report.served_qty,
            report.total_qty,
            report.delivery_rate() * 100.0,
            report.unplaced.len(),
            report.total_distance,
        );
    }
    Ok(())
}
