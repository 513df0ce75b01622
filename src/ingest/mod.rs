// src/ingest/mod.rs
pub mod lines;
pub mod scheduler;
pub mod types;

use std::collections::BTreeMap;

use metrics::{counter, gauge};
use tokio::sync::mpsc;

use crate::config::SensorConfig;
use crate::ingest::types::{MessageSource, RawMessage, SensorEvent};
use crate::metrics::ensure_metrics_described;
use crate::sensors::SensorKind;

/// Maps inbound topics to configured sensor kinds.
#[derive(Debug, Clone, Default)]
pub struct TopicRouter {
    routes: Vec<(SensorKind, String)>,
}

impl TopicRouter {
    pub fn from_sensors(sensors: &BTreeMap<SensorKind, SensorConfig>) -> Self {
        let routes = sensors
            .iter()
            .filter(|(_, c)| !c.topic.trim().is_empty())
            .map(|(k, c)| (*k, c.topic.trim().to_string()))
            .collect();
        Self { routes }
    }

    /// One event per sensor whose topic occurs in the message topic.
    pub fn route(&self, msg: &RawMessage, at: i64) -> Vec<SensorEvent> {
        self.routes
            .iter()
            .filter(|(_, t)| msg.topic.contains(t.as_str()))
            .map(|(kind, _)| SensorEvent {
                at,
                kind: *kind,
                raw: msg.payload.clone(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Producer side of the bounded inbound queue.
///
/// Never waits: when the consumer falls behind and the queue is full, the
/// new event is dropped and counted.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<SensorEvent>,
}

pub fn event_queue(capacity: usize) -> (EventSender, mpsc::Receiver<SensorEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, rx)
}

/// Why an event was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    Full,
    Closed,
}

impl EventSender {
    pub fn offer(&self, ev: SensorEvent) -> Result<(), Rejected> {
        match self.tx.try_send(ev) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(ev)) => {
                counter!("gateway_events_dropped_total").increment(1);
                tracing::warn!(target: "ingest", kind = %ev.kind, "inbound queue full; dropping event");
                Err(Rejected::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Rejected::Closed),
        }
    }

    /// Events currently waiting for the consumer.
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Forward every message of `source` into the queue until the source ends
/// or the consumer goes away. Returns the number of events queued.
pub async fn pump<S: MessageSource + ?Sized>(
    source: &mut S,
    router: &TopicRouter,
    sender: &EventSender,
) -> usize {
    ensure_metrics_described();
    let mut queued = 0usize;
    loop {
        let msg = match source.next_message().await {
            Ok(Some(m)) => m,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, source = source.name(), "source error");
                counter!("gateway_source_errors_total").increment(1);
                continue;
            }
        };
        let now = chrono::Utc::now().timestamp();
        let events = router.route(&msg, now);
        if events.is_empty() {
            tracing::trace!(target: "ingest", topic = %msg.topic, "no sensor for topic");
            continue;
        }
        for ev in events {
            match sender.offer(ev) {
                Ok(()) => queued += 1,
                Err(Rejected::Full) => {}
                Err(Rejected::Closed) => {
                    tracing::info!(target: "ingest", source = source.name(), "consumer gone; stopping");
                    return queued;
                }
            }
        }
        gauge!("gateway_queue_depth").set(sender.depth() as f64);
    }
    tracing::info!(target: "ingest", source = source.name(), queued, "source exhausted");
    queued
}
