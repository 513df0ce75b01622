// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod engine;
pub mod ingest;
pub mod metrics;
pub mod report;
pub mod store;

// Numeric building blocks
pub mod accumulator;
pub mod convert;
pub mod rollover;
pub mod sensors;
pub mod wind;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::GatewayConfig;
pub use crate::engine::{Engine, EngineSnapshot};
pub use crate::sensors::{FieldValue, SensorKind};
pub use crate::store::{HistoryRecord, StateStore};
