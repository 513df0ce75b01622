// src/ingest/types.rs
use anyhow::Result;

use crate::sensors::SensorKind;

/// One reading routed to a sensor kind.
#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct SensorEvent {
    pub at: i64,          // unix seconds of arrival
    pub kind: SensorKind, // selects converter / averager / accumulator
    pub raw: String,      // payload as received
}

/// A message as delivered by a transport, before routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: String,
}

#[async_trait::async_trait]
pub trait MessageSource: Send {
    /// Next message; `Ok(None)` once the source is exhausted.
    async fn next_message(&mut self) -> Result<Option<RawMessage>>;
    fn name(&self) -> &'static str;
}
