//! Sliding-window throughput tracker fed by read completions.
//!
//! Each `start_read` / `finish_read` pair becomes one (duration, bytes) sample
//! in a fixed ring. Reads that returned nothing still count as time spent, so
//! a stalled link drags the estimate down.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Samples kept in the ring.
pub const DEFAULT_SAMPLES: usize = 100;

/// Weight of the newest sample in the smoothed rate.
const SMOOTHING: f64 = 0.125;

/// Rates in bytes per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bandwidth {
    /// Last sample only. Fast and noisy.
    pub instant: f64,
    /// Exponentially weighted over the samples seen so far.
    pub smoothed: f64,
    /// Total bytes over total time across the whole ring.
    pub average: f64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    took: Duration,
    bytes: u64,
}

impl Sample {
    fn rate(&self) -> Option<f64> {
        let secs = self.took.as_secs_f64();
        if secs <= 0.0 {
            None
        } else {
            Some(self.bytes as f64 / secs)
        }
    }
}

#[derive(Debug)]
pub struct BandwidthEstimator {
    samples: VecDeque<Sample>,
    capacity: usize,
    started: Option<Instant>,
    smoothed: Option<f64>,
}

impl Default for BandwidthEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLES)
    }
}

impl BandwidthEstimator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            started: None,
            smoothed: None,
        }
    }

    pub fn start_read(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Close the sample opened by `start_read`. Without a matching start the
    /// call is ignored.
    pub fn finish_read(&mut self, bytes: usize) {
        if let Some(start) = self.started.take() {
            self.record(start.elapsed(), bytes as u64);
        }
    }

    /// Push a sample directly.
    pub fn record(&mut self, took: Duration, bytes: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        let sample = Sample { took, bytes };
        if let Some(rate) = sample.rate() {
            self.smoothed = Some(match self.smoothed {
                Some(prev) => prev + SMOOTHING * (rate - prev),
                None => rate,
            });
        }
        self.samples.push_back(sample);
    }

    pub fn estimate(&self) -> Bandwidth {
        let instant = self
            .samples
            .back()
            .and_then(Sample::rate)
            .unwrap_or(0.0);
        let (took, bytes) = self
            .samples
            .iter()
            .fold((Duration::ZERO, 0u64), |(t, b), s| (t + s.took, b + s.bytes));
        let secs = took.as_secs_f64();
        let average = if secs > 0.0 { bytes as f64 / secs } else { 0.0 };
        Bandwidth {
            instant,
            smoothed: self.smoothed.unwrap_or(0.0),
            average,
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.started = None;
        self.smoothed = None;
    }
}
