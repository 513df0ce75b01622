//! Outbound reporting on its own cadence.
//!
//! The report task only reads the latest published snapshot, so a slow or
//! failing receiver delays reports but never the aggregation loop.

pub mod ecowitt;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::EngineSnapshot;

/// Flat form body: field name → value as text.
pub type ReportPayload = BTreeMap<String, String>;

#[async_trait::async_trait]
pub trait ReportSink: Send + Sync {
    async fn submit(&self, payload: &ReportPayload) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Published values plus `dateutc`.
pub fn build_payload(snapshot: &EngineSnapshot, now: DateTime<Utc>) -> ReportPayload {
    let mut out: ReportPayload = snapshot
        .values
        .iter()
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect();
    out.insert(
        "dateutc".to_string(),
        now.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    out
}

/// Submit one report. Failures are logged and dropped; returns whether the
/// sink accepted it.
pub async fn report_once<S: ReportSink + ?Sized>(
    sink: &S,
    snapshot: &EngineSnapshot,
    now: DateTime<Utc>,
) -> bool {
    if snapshot.values.is_empty() {
        tracing::debug!(target: "report", sink = sink.name(), "nothing to report yet");
        return false;
    }
    let payload = build_payload(snapshot, now);
    match sink.submit(&payload).await {
        Ok(()) => {
            counter!("gateway_reports_total").increment(1);
            tracing::debug!(target: "report", sink = sink.name(), fields = payload.len(), "report sent");
            true
        }
        Err(e) => {
            counter!("gateway_report_errors_total").increment(1);
            tracing::warn!(target: "report", sink = sink.name(), "cannot send report: {e:#}");
            false
        }
    }
}

/// Report the latest snapshot every `interval` until `shutdown` flips.
pub fn spawn_report_task<S: ReportSink + 'static>(
    sink: S,
    snapshots: watch::Receiver<Arc<EngineSnapshot>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // A stalled receiver should not cause a burst of catch-up reports.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick fires immediately; wait one full interval instead.
        ticker.tick().await;
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
            let snap = snapshots.borrow().clone();
            report_once(&sink, &snap, Utc::now()).await;
        }
        tracing::info!(target: "report", sink = sink.name(), "report task stopped");
    })
}

// --- Test helper ---
pub struct MockSink {
    pub calls: std::sync::Mutex<Vec<ReportPayload>>,
    pub fail: bool,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(vec![]),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReportSink for MockSink {
    async fn submit(&self, payload: &ReportPayload) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(payload.clone());
        }
        if self.fail {
            anyhow::bail!("mock sink failure");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
