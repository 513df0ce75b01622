//! # Wind Averaging
//! Short (≈2 min) and long (≈10 min) windows for wind direction and speed.
//!
//! Direction uses the vector (circular) mean so that 350° and 10° average
//! to 0° instead of 180°. Speed uses max and arithmetic means.

use crate::convert::{round_to, SENTINEL};
use crate::window::{SampleWindow, LONG_CAPACITY, SHORT_CAPACITY};

/// Vector mean of angles in degrees, `[0, 360)`, 1 decimal. Empty → `-9999`.
pub fn circular_mean(window: &SampleWindow) -> f64 {
    if window.is_empty() {
        return SENTINEL;
    }
    let (sin_sum, cos_sum) = window.iter().fold((0.0f64, 0.0f64), |(s, c), deg| {
        let r = deg.to_radians();
        (s + r.sin(), c + r.cos())
    });
    let mean = round_to((sin_sum.atan2(cos_sum).to_degrees() + 360.0) % 360.0, 1);
    // 359.96 rounds up to 360.0, which is the same heading as 0.
    if mean >= 360.0 {
        0.0
    } else {
        mean
    }
}

/// Direction output for one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionStats {
    /// Calibrated angle of this reading, or `-9999` when unmappable.
    pub current: f64,
    pub avg_short: f64,
    pub avg_long: f64,
}

/// Speed output for one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedStats {
    pub current: f64,
    pub max_short: f64,
    pub avg_short: f64,
    pub avg_long: f64,
}

#[derive(Debug, Clone)]
pub struct WindVectorAverager {
    dir_short: SampleWindow,
    dir_long: SampleWindow,
    speed_short: SampleWindow,
    speed_long: SampleWindow,
}

impl Default for WindVectorAverager {
    fn default() -> Self {
        Self::new()
    }
}

impl WindVectorAverager {
    pub fn new() -> Self {
        Self::with_capacities(SHORT_CAPACITY, LONG_CAPACITY)
    }

    pub fn with_capacities(short: usize, long: usize) -> Self {
        Self {
            dir_short: SampleWindow::with_capacity(short),
            dir_long: SampleWindow::with_capacity(long),
            speed_short: SampleWindow::with_capacity(short),
            speed_long: SampleWindow::with_capacity(long),
        }
    }

    /// Record a calibrated direction in degrees.
    pub fn ingest_direction(&mut self, angle: f64) {
        self.dir_short.push(angle);
        self.dir_long.push(angle);
    }

    /// Record a reading that could not be mapped to an angle.
    ///
    /// Each window repeats its own tail so its sampling cadence stays intact;
    /// an empty window is left alone.
    pub fn repeat_direction(&mut self) {
        for w in [&mut self.dir_short, &mut self.dir_long] {
            if let Some(last) = w.last() {
                w.push(last);
            }
        }
    }

    /// Feed an optional calibrated angle and return the published stats.
    pub fn observe_direction(&mut self, angle: Option<f64>) -> DirectionStats {
        let current = match angle {
            Some(a) => {
                self.ingest_direction(a);
                a
            }
            None => {
                self.repeat_direction();
                SENTINEL
            }
        };
        DirectionStats {
            current,
            avg_short: circular_mean(&self.dir_short),
            avg_long: circular_mean(&self.dir_long),
        }
    }

    pub fn ingest_speed(&mut self, value: f64) -> SpeedStats {
        self.speed_short.push(value);
        self.speed_long.push(value);
        SpeedStats {
            current: value,
            max_short: self.speed_short.max().unwrap_or(SENTINEL),
            avg_short: self
                .speed_short
                .mean()
                .map(|m| round_to(m, 2))
                .unwrap_or(SENTINEL),
            avg_long: self
                .speed_long
                .mean()
                .map(|m| round_to(m, 2))
                .unwrap_or(SENTINEL),
        }
    }

    pub fn direction_short(&self) -> &SampleWindow {
        &self.dir_short
    }

    pub fn direction_long(&self) -> &SampleWindow {
        &self.dir_long
    }
}
