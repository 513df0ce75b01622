// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::{Engine, EngineSnapshot};
use crate::ingest::types::SensorEvent;
use crate::metrics::ensure_metrics_described;

/// One scheduling tick: drain the queue, roll over and evict, publish.
/// Returns how many events were drained.
pub fn run_tick(
    engine: &mut Engine,
    rx: &mut mpsc::Receiver<SensorEvent>,
    snapshots: &watch::Sender<Arc<EngineSnapshot>>,
    now: i64,
) -> usize {
    let mut drained = 0usize;
    while let Ok(ev) = rx.try_recv() {
        drained += 1;
        if let Err(e) = engine.ingest(&ev) {
            counter!("gateway_events_invalid_total").increment(1);
            tracing::debug!(target: "engine", kind = %ev.kind, raw = %ev.raw, "skipping reading: {e:#}");
        }
    }
    engine.tick(now);
    snapshots.send_replace(Arc::new(engine.snapshot(now)));
    gauge!("gateway_last_tick_ts").set(now as f64);
    drained
}

/// Spawn the single consumer that owns the engine. The task hands the
/// engine back once `shutdown` flips to true (or its sender is dropped),
/// after one last drain.
pub fn spawn_engine_loop(
    mut engine: Engine,
    mut rx: mpsc::Receiver<SensorEvent>,
    snapshots: watch::Sender<Arc<EngineSnapshot>>,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<Engine> {
    tokio::spawn(async move {
        ensure_metrics_described();
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            let now = chrono::Utc::now().timestamp();
            let n = run_tick(&mut engine, &mut rx, &snapshots, now);
            if n > 0 {
                tracing::trace!(target: "engine", drained = n, "tick");
            }
        }
        let n = run_tick(&mut engine, &mut rx, &snapshots, chrono::Utc::now().timestamp());
        tracing::info!(target: "engine", drained = n, "aggregation loop stopped");
        engine
    })
}
