//! # Aggregation Engine
//! Owns every stateful piece of the gateway and routes sensor events to it.
//!
//! Operations:
//! - [`Engine::ingest`]: convert one event and update the published values,
//! - [`Engine::tick`]: calendar rollover and bucket eviction,
//! - [`Engine::snapshot`]: consolidated view for reporting and debugging.
//!
//! No I/O happens here; the scheduler drives it and the store persists it.

use std::collections::BTreeMap;

use anyhow::Result;
use metrics::counter;
use serde::Serialize;

use crate::accumulator::{
    AccumulatorSnapshot, LightningCounter, Precision, TimeBucketedAccumulator, RAIN_EVENT_RATE,
};
use crate::config::{GatewayConfig, SensorConfig};
use crate::convert::{mm_to_in, ms_to_mph, parse_f64, parse_non_negative, round_to};
use crate::ingest::types::SensorEvent;
use crate::rollover::{ClockZone, RolloverOutcome};
use crate::sensors::{convert_stateless, numbered, FieldValue, Fields, SensorKind};
use crate::store::{HistoryRecord, LightningState};
use crate::wind::WindVectorAverager;

/// Floor applied while the rain sensor reports rain but the gauge is slow,
/// in mm/h and in mm per 10-minute gauge interval.
const RAIN_STATE_RATE_MM: f64 = 0.5;
const RAIN_STATE_AMOUNT_MM: f64 = 0.083;

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub rain: RolloverOutcome,
    pub lightning: RolloverOutcome,
}

/// Consolidated view of the engine at one instant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineSnapshot {
    pub at: i64,
    /// Published field name → value.
    pub values: BTreeMap<String, FieldValue>,
    pub rain: AccumulatorSnapshot,
    pub lightning: AccumulatorSnapshot,
}

#[derive(Debug)]
pub struct Engine {
    sensors: BTreeMap<SensorKind, SensorConfig>,
    fallback: SensorConfig,
    wind: WindVectorAverager,
    rain: TimeBucketedAccumulator,
    lightning: TimeBucketedAccumulator,
    strikes: LightningCounter,
    raining: bool,
    rain_rate: Option<f64>,
    strike_total: Option<f64>,
    values: BTreeMap<String, FieldValue>,
}

impl Engine {
    pub fn new(
        sensors: BTreeMap<SensorKind, SensorConfig>,
        zone: ClockZone,
        record: HistoryRecord,
    ) -> Self {
        let HistoryRecord { rain, lightning } = record;
        Self {
            sensors,
            fallback: SensorConfig::default(),
            wind: WindVectorAverager::new(),
            rain: TimeBucketedAccumulator::from_state(Precision::Milli, zone, rain),
            lightning: TimeBucketedAccumulator::from_state(
                Precision::Count,
                zone,
                lightning.totals,
            ),
            strikes: LightningCounter::with_offset(lightning.offset),
            raining: false,
            rain_rate: None,
            strike_total: None,
            values: BTreeMap::new(),
        }
    }

    pub fn from_config(cfg: &GatewayConfig, record: HistoryRecord) -> Self {
        Self::new(cfg.sensors.clone(), cfg.engine.timezone, record)
    }

    /// Convert one event and publish the slots that have a configured name.
    ///
    /// Unparseable payloads return an error and leave all state untouched.
    pub fn ingest(&mut self, ev: &SensorEvent) -> Result<Fields> {
        let cfg = self.sensors.get(&ev.kind).unwrap_or(&self.fallback);

        let fields = match ev.kind {
            SensorKind::WindSpeed => {
                let mph = ms_to_mph(parse_f64(&ev.raw)?, 2);
                let s = self.wind.ingest_speed(mph);
                numbered(&[s.current, s.max_short, s.avg_short, s.avg_long])
            }
            SensorKind::WindDir => {
                let volt = round_to(parse_f64(&ev.raw)?, 1);
                let angle = cfg.converttable.get(&format!("{volt:.1}")).copied();
                if angle.is_none() {
                    tracing::debug!(target: "engine", volt, "no calibration entry for wind vane voltage");
                }
                let s = self.wind.observe_direction(angle);
                numbered(&[s.current, s.avg_short, s.avg_long])
            }
            SensorKind::RainState => {
                self.raining = ev.raw.trim() == "ON";
                numbered(&[if self.raining { 1.0 } else { 0.0 }])
            }
            SensorKind::RainRate => {
                // Gauge reports mm per 10 minutes.
                let mm = parse_non_negative(&ev.raw)?;
                let mut rate = mm_to_in(mm * 6.0, 3);
                let mut amount = mm_to_in(mm, 3);
                let floor = mm_to_in(RAIN_STATE_RATE_MM, 3);
                let calc_rr = self
                    .sensors
                    .get(&SensorKind::RainState)
                    .map_or(0.0, |c| c.calc_rr);
                if calc_rr > 0.0 && self.raining && rate < floor {
                    rate = floor;
                    amount = mm_to_in(RAIN_STATE_AMOUNT_MM, 3);
                }
                self.rain_rate = Some(rate);
                let snap = self
                    .rain
                    .ingest(ev.at, rate, amount, rate >= RAIN_EVENT_RATE);
                numbered(&snap.slots())
            }
            SensorKind::LightningNumber => {
                let raw = parse_non_negative(&ev.raw)?;
                let inc = self.strikes.advance(raw);
                self.strike_total = Some(raw);
                let snap = self.lightning.ingest(ev.at, inc, inc, inc > 0.0);
                let mut slots = snap.slots();
                slots[0] = raw.trunc();
                numbered(&slots)
            }
            kind => convert_stateless(kind, &ev.raw, cfg)?,
        };

        for (slot, v) in &fields {
            if let Some(name) = cfg.name_for(*slot) {
                self.values.insert(name.to_string(), v.clone());
            }
        }
        counter!("gateway_events_total", "kind" => ev.kind.key()).increment(1);
        tracing::debug!(target: "engine", kind = %ev.kind, raw = %ev.raw, fields = ?fields, "event ingested");
        Ok(fields)
    }

    /// Rollover and eviction for both accumulators, then refresh their
    /// published totals so reports never carry expired windows.
    pub fn tick(&mut self, now: i64) -> TickOutcome {
        let out = TickOutcome {
            rain: self.rain.tick(now),
            lightning: self.lightning.tick(now),
        };
        if out.rain.any() || out.lightning.any() {
            tracing::info!(target: "engine", rain = ?out.rain, lightning = ?out.lightning, "tiers rolled over");
        }

        if let Some(rate) = self.rain_rate {
            let snap = self.rain.snapshot_at(now, rate);
            self.republish(SensorKind::RainRate, &snap.slots());
        }
        if let Some(total) = self.strike_total {
            let mut slots = self.lightning.snapshot_at(now, total).slots();
            slots[0] = total.trunc();
            self.republish(SensorKind::LightningNumber, &slots);
        }
        out
    }

    fn republish(&mut self, kind: SensorKind, slots: &[f64]) {
        let Some(cfg) = self.sensors.get(&kind) else {
            return;
        };
        for (slot, v) in numbered(slots) {
            if let Some(name) = cfg.name_for(slot) {
                self.values.insert(name.to_string(), v);
            }
        }
    }

    pub fn snapshot(&self, now: i64) -> EngineSnapshot {
        EngineSnapshot {
            at: now,
            values: self.values.clone(),
            rain: self.rain.snapshot_at(now, self.rain_rate.unwrap_or(0.0)),
            lightning: self
                .lightning
                .snapshot_at(now, self.strike_total.unwrap_or(0.0)),
        }
    }

    /// Durable state, as written by the store.
    pub fn record(&self) -> HistoryRecord {
        HistoryRecord {
            rain: self.rain.state().clone(),
            lightning: LightningState {
                totals: self.lightning.state().clone(),
                offset: self.strikes.offset(),
            },
        }
    }

    pub fn wind(&self) -> &WindVectorAverager {
        &self.wind
    }

    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }
}
