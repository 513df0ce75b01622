//! # Time-Bucketed Accumulator
//! Tiered totals for one metric family (rain or lightning).
//!
//! Each ingest adds an amount to the event, hourly, daily, weekly and monthly
//! tiers, to the yearly map, and to two sliding windows:
//! - a minute-keyed map of incremental amounts (trailing 1 h),
//! - an hour-keyed map of hourly-tier snapshots (trailing 24 h).
//!
//! Tier resets are driven by [`CalendarRolloverScheduler`]; bucket eviction
//! runs in [`TimeBucketedAccumulator::tick`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::convert::round_to;
use crate::rollover::{CalendarRolloverScheduler, ClockZone, RolloverOutcome, Tiers};
use crate::store::lenient;

/// Horizon of the minute buckets.
pub const MINUTE_WINDOW_SECS: i64 = 3_600;
/// Horizon of the hour buckets.
pub const HOUR_WINDOW_SECS: i64 = 86_400;

/// Rain rate (in/h) at or above which a reading counts toward the rain event.
pub const RAIN_EVENT_RATE: f64 = 0.03937;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierState {
    #[serde(deserialize_with = "lenient::number")]
    pub amount: f64,
    /// Unix seconds of the last ingest that touched this tier.
    #[serde(deserialize_with = "lenient::timestamp")]
    pub last: i64,
}

/// Durable state of one accumulator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatorState {
    pub event: TierState,
    pub hourly: TierState,
    pub daily: TierState,
    pub weekly: TierState,
    pub monthly: TierState,
    #[serde(deserialize_with = "lenient::year_map")]
    pub yearly: BTreeMap<i32, f64>,
    /// Hour-aligned epoch → hourly-tier snapshot.
    #[serde(rename = "24h", deserialize_with = "lenient::epoch_map")]
    pub hours: BTreeMap<i64, f64>,
    /// Minute-aligned epoch → amount recorded in that minute.
    #[serde(rename = "1h", deserialize_with = "lenient::epoch_map")]
    pub minutes: BTreeMap<i64, f64>,
}

/// Arithmetic applied at every accumulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Rain: three decimals at every step.
    Milli,
    /// Lightning: whole counts; rolling sums round to one decimal and
    /// truncate at each step.
    Count,
}

impl Precision {
    fn add(self, total: f64, x: f64) -> f64 {
        match self {
            Precision::Milli => round_to(total + x, 3),
            Precision::Count => total.trunc() + x,
        }
    }

    fn add_rolling(self, total: f64, x: f64) -> f64 {
        match self {
            Precision::Milli => round_to(total + x, 3),
            Precision::Count => round_to(total + x, 1).trunc(),
        }
    }

    fn publish(self, v: f64) -> f64 {
        match self {
            Precision::Milli => round_to(v, 3),
            Precision::Count => v.trunc(),
        }
    }
}

/// Nine published fields of one accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AccumulatorSnapshot {
    pub current: f64,
    pub event: f64,
    pub last_hour: f64,
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
    pub this_year: f64,
    pub all_years: f64,
    pub last_24h: f64,
}

impl AccumulatorSnapshot {
    /// Values in slot order 1..=9.
    pub fn slots(&self) -> [f64; 9] {
        [
            self.current,
            self.event,
            self.last_hour,
            self.daily,
            self.weekly,
            self.monthly,
            self.this_year,
            self.all_years,
            self.last_24h,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct TimeBucketedAccumulator {
    precision: Precision,
    scheduler: CalendarRolloverScheduler,
    state: AccumulatorState,
}

impl TimeBucketedAccumulator {
    pub fn new(precision: Precision, zone: ClockZone) -> Self {
        Self::from_state(precision, zone, AccumulatorState::default())
    }

    pub fn from_state(precision: Precision, zone: ClockZone, state: AccumulatorState) -> Self {
        Self {
            precision,
            scheduler: CalendarRolloverScheduler::new(zone),
            state,
        }
    }

    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    /// Record `amount` at `at` and return the published fields.
    ///
    /// `current` is passed through as the instantaneous field (rain rate,
    /// strike increment).
    pub fn ingest(
        &mut self,
        at: i64,
        current: f64,
        amount: f64,
        event_trigger: bool,
    ) -> AccumulatorSnapshot {
        // A reading that beats the first tick past a boundary must not land
        // on the previous period's total.
        self.tick(at);

        let p = self.precision;
        let zone = self.scheduler.zone();
        let s = &mut self.state;

        if event_trigger {
            s.event.amount = p.add(s.event.amount, amount);
            s.event.last = at;
        }
        for t in [&mut s.hourly, &mut s.daily, &mut s.weekly, &mut s.monthly] {
            t.amount = p.add(t.amount, amount);
            t.last = at;
        }

        let year = zone.fields(at).year;
        let y = s.yearly.entry(year).or_insert(0.0);
        *y = p.add(*y, amount);

        s.hours.insert(zone.hour_floor(at), s.hourly.amount);
        s.minutes.insert(zone.minute_floor(at), amount);

        self.snapshot_at(at, current)
    }

    /// Rollover plus bucket eviction relative to `now`.
    pub fn tick(&mut self, now: i64) -> RolloverOutcome {
        let s = &mut self.state;
        let out = self.scheduler.apply(
            now,
            Tiers {
                event: &mut s.event,
                hourly: &mut s.hourly,
                daily: &mut s.daily,
                weekly: &mut s.weekly,
                monthly: &mut s.monthly,
            },
        );
        self.evict(now);
        out
    }

    /// Drop buckets that fell out of their window. Returns how many went.
    pub fn evict(&mut self, now: i64) -> usize {
        let s = &mut self.state;
        let before = s.minutes.len() + s.hours.len();
        s.minutes.retain(|&k, _| now <= k + MINUTE_WINDOW_SECS);
        s.hours.retain(|&k, _| now <= k + HOUR_WINDOW_SECS);
        before - (s.minutes.len() + s.hours.len())
    }

    /// Sum of live minute buckets.
    pub fn rolling_hour(&self) -> f64 {
        let p = self.precision;
        self.state
            .minutes
            .values()
            .fold(0.0, |acc, v| p.add_rolling(acc, *v))
    }

    /// Sum of live hour buckets.
    pub fn rolling_day(&self) -> f64 {
        let p = self.precision;
        self.state
            .hours
            .values()
            .fold(0.0, |acc, v| p.add_rolling(acc, *v))
    }

    pub fn year_total(&self, year: i32) -> f64 {
        self.state.yearly.get(&year).copied().unwrap_or(0.0)
    }

    pub fn all_years(&self) -> f64 {
        let p = self.precision;
        self.state
            .yearly
            .values()
            .fold(0.0, |acc, v| p.add(acc, *v))
    }

    /// Published fields as of `now`, without mutating state.
    pub fn snapshot_at(&self, now: i64, current: f64) -> AccumulatorSnapshot {
        let p = self.precision;
        let s = &self.state;
        let year = self.scheduler.zone().fields(now).year;
        AccumulatorSnapshot {
            current,
            event: p.publish(s.event.amount),
            last_hour: self.rolling_hour(),
            daily: p.publish(s.daily.amount),
            weekly: p.publish(s.weekly.amount),
            monthly: p.publish(s.monthly.amount),
            this_year: p.publish(self.year_total(year)),
            all_years: p.publish(self.all_years()),
            last_24h: self.rolling_day(),
        }
    }
}

/// Derives strike increments from the sensor's absolute counter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LightningCounter {
    offset: f64,
}

impl LightningCounter {
    pub fn with_offset(offset: f64) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Increment since the previous reading. A counter that went backwards
    /// means the sensor restarted, so the new value counts from zero.
    pub fn advance(&mut self, raw: f64) -> f64 {
        if raw < self.offset {
            tracing::info!(
                target: "lightning",
                raw,
                offset = self.offset,
                "strike counter went backwards; assuming sensor restart"
            );
            self.offset = 0.0;
        }
        let inc = raw - self.offset;
        self.offset = raw;
        inc
    }
}
