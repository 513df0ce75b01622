//! # Sample Window
//! Fixed-capacity FIFO over numeric samples.
//!
//! One sample is expected per sampling interval (3 s for the wind sensors),
//! so capacity doubles as the window horizon: 40 samples ≈ 2 min,
//! 200 samples ≈ 10 min.

use std::collections::VecDeque;

/// Short horizon capacity (≈2 min at 3 s per sample).
pub const SHORT_CAPACITY: usize = 40;
/// Long horizon capacity (≈10 min at 3 s per sample).
pub const LONG_CAPACITY: usize = 200;

#[derive(Debug, Clone)]
pub struct SampleWindow {
    buf: VecDeque<f64>,
    cap: usize,
}

impl SampleWindow {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            buf: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append a sample, dropping the oldest entries beyond capacity.
    pub fn push(&mut self, value: f64) {
        self.buf.push_back(value);
        while self.buf.len() > self.cap {
            self.buf.pop_front();
        }
    }

    /// Most recent sample, if any.
    pub fn last(&self) -> Option<f64> {
        self.buf.back().copied()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.buf.iter().copied()
    }

    /// Largest sample, `None` when empty.
    pub fn max(&self) -> Option<f64> {
        self.buf.iter().copied().reduce(f64::max)
    }

    /// Arithmetic mean, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.buf.is_empty() {
            return None;
        }
        Some(self.buf.iter().sum::<f64>() / self.buf.len() as f64)
    }
}
