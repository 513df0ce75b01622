// src/config/gateway.rs
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::rollover::ClockZone;
use crate::sensors::SensorKind;
use crate::store::DEFAULT_STATE_PATH;

fn default_tick_ms() -> u64 {
    100
}
fn default_queue_capacity() -> usize {
    10_000
}
fn default_state_path() -> String {
    DEFAULT_STATE_PATH.to_string()
}
fn default_server() -> String {
    "http://127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_report_interval() -> u64 {
    60
}
fn default_report_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Keyed by sensor kind (`temp`, `windspeed`, `rainrate`, ...).
    #[serde(default)]
    pub sensors: BTreeMap<SensorKind, SensorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Scheduling tick of the aggregation loop.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Inbound queue bound; events beyond it are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_state_path")]
    pub state_path: String,
    /// "local" | "utc"
    #[serde(default)]
    pub timezone: ClockZone,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            queue_capacity: default_queue_capacity(),
            state_path: default_state_path(),
            timezone: ClockZone::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Scheme and host of the Ecowitt-compatible receiver.
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_report_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_report_timeout")]
    pub timeout_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: default_server(),
            port: default_port(),
            interval_secs: default_report_interval(),
            timeout_secs: default_report_timeout(),
        }
    }
}

impl ReportConfig {
    pub fn url(&self) -> String {
        format!("{}:{}/data/report/", self.server.trim_end_matches('/'), self.port)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Bind address for `/health`, `/metrics` and `/debug/*`; disabled if unset.
    #[serde(default)]
    pub listen: Option<String>,
}

/// Per-sensor settings. Only the keys relevant to a kind are read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorConfig {
    /// Substring of the inbound topic that selects this sensor.
    #[serde(default)]
    pub topic: String,
    /// Output slot ("1".."9") → published field name.
    #[serde(default)]
    pub names: BTreeMap<String, String>,
    /// Station height in metres (pressure).
    #[serde(default)]
    pub height: Option<f64>,
    /// Full-scale reading (twilight, solar radiation).
    #[serde(default)]
    pub max: Option<f64>,
    /// Zero offset (solar radiation).
    #[serde(default)]
    pub offset: Option<f64>,
    /// Derive solar radiation from illuminance when > 0.
    #[serde(default)]
    pub calc_sr: f64,
    /// Derive a minimum rain rate from the rain state when > 0.
    #[serde(default)]
    pub calc_rr: f64,
    /// Wind vane voltage ("2.5") → angle in degrees.
    #[serde(default)]
    pub converttable: BTreeMap<String, f64>,
}

impl SensorConfig {
    pub fn name_for(&self, slot: u8) -> Option<&str> {
        self.names
            .get(&slot.to_string())
            .map(String::as_str)
            .filter(|n| !n.trim().is_empty())
    }
}
