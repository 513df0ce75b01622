//! # Calendar Rollover
//! Decides when a tier's running total belongs to a past period.
//!
//! Tiers are compared by calendar field (hour of day, day of year, ISO week,
//! month) between "now" and the tier's last update. The event tier instead
//! expires after 24 h without a trigger.

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::accumulator::TierState;

/// Idle time after which the event tier is cleared.
pub const EVENT_IDLE_SECS: i64 = 86_400;

/// Zone in which calendar boundaries are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockZone {
    #[default]
    Local,
    Utc,
}

/// Calendar fields of one instant in a [`ClockZone`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFields {
    pub year: i32,
    pub month: u32,
    pub iso_week: u32,
    pub ordinal: u32,
    pub hour: u32,
}

impl ClockZone {
    pub fn fields(self, ts: i64) -> CalendarFields {
        match self {
            ClockZone::Local => fields_in(&Local, ts),
            ClockZone::Utc => fields_in(&Utc, ts),
        }
    }

    /// Start of the calendar minute containing `ts`.
    pub fn minute_floor(self, ts: i64) -> i64 {
        match self {
            ClockZone::Local => floor_in(&Local, ts, false),
            ClockZone::Utc => floor_in(&Utc, ts, false),
        }
    }

    /// Start of the calendar hour containing `ts`.
    pub fn hour_floor(self, ts: i64) -> i64 {
        match self {
            ClockZone::Local => floor_in(&Local, ts, true),
            ClockZone::Utc => floor_in(&Utc, ts, true),
        }
    }
}

fn datetime_in<Tz: TimeZone>(tz: &Tz, ts: i64) -> DateTime<Tz> {
    let utc = DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    utc.with_timezone(tz)
}

fn fields_in<Tz: TimeZone>(tz: &Tz, ts: i64) -> CalendarFields {
    let dt = datetime_in(tz, ts);
    CalendarFields {
        year: dt.year(),
        month: dt.month(),
        iso_week: dt.iso_week().week(),
        ordinal: dt.ordinal(),
        hour: dt.hour(),
    }
}

fn floor_in<Tz: TimeZone>(tz: &Tz, ts: i64, to_hour: bool) -> i64 {
    let dt = datetime_in(tz, ts);
    let drop_secs = if to_hour {
        i64::from(dt.minute()) * 60 + i64::from(dt.second())
    } else {
        i64::from(dt.second())
    };
    ts - drop_secs
}

/// Which tiers a rollover pass cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RolloverOutcome {
    pub event: bool,
    pub hourly: bool,
    pub daily: bool,
    pub weekly: bool,
    pub monthly: bool,
}

impl RolloverOutcome {
    pub fn any(&self) -> bool {
        self.event || self.hourly || self.daily || self.weekly || self.monthly
    }
}

/// Tiers checked by the scheduler, borrowed from one accumulator.
pub struct Tiers<'a> {
    pub event: &'a mut TierState,
    pub hourly: &'a mut TierState,
    pub daily: &'a mut TierState,
    pub weekly: &'a mut TierState,
    pub monthly: &'a mut TierState,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarRolloverScheduler {
    zone: ClockZone,
}

impl CalendarRolloverScheduler {
    pub fn new(zone: ClockZone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> ClockZone {
        self.zone
    }

    /// Zero every tier whose period no longer contains `now`.
    /// Timestamps are left untouched.
    pub fn apply(&self, now: i64, tiers: Tiers<'_>) -> RolloverOutcome {
        let mut out = RolloverOutcome::default();
        let cur = self.zone.fields(now);

        if now > tiers.event.last + EVENT_IDLE_SECS {
            out.event = clear(tiers.event);
        }
        if self.zone.fields(tiers.hourly.last).hour != cur.hour {
            out.hourly = clear(tiers.hourly);
        }
        if self.zone.fields(tiers.daily.last).ordinal != cur.ordinal {
            out.daily = clear(tiers.daily);
        }
        if self.zone.fields(tiers.weekly.last).iso_week != cur.iso_week {
            out.weekly = clear(tiers.weekly);
        }
        if self.zone.fields(tiers.monthly.last).month != cur.month {
            out.monthly = clear(tiers.monthly);
        }
        out
    }
}

/// Returns true if a non-zero amount was actually cleared.
fn clear(t: &mut TierState) -> bool {
    let had = t.amount != 0.0;
    t.amount = 0.0;
    had
}
