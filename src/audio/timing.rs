// Audio timing - maps clock seconds onto the output sample counter
// Lets triggers scheduled ahead of time start on an exact sample

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared audio timing state
#[derive(Debug, Clone)]
pub struct AudioTiming {
    /// Current sample position (incremented by audio callback)
    sample_position: Arc<AtomicU64>,
    /// Clock time of sample 0, as f64 bits (NaN until anchored)
    origin_bits: Arc<AtomicU64>,
    sample_rate: f64,
}

impl AudioTiming {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_position: Arc::new(AtomicU64::new(0)),
            origin_bits: Arc::new(AtomicU64::new(f64::NAN.to_bits())),
            sample_rate: sample_rate as f64,
        }
    }

    /// Current sample position
    pub fn current_sample(&self) -> u64 {
        self.sample_position.load(Ordering::Relaxed)
    }

    /// Advance sample position (called from audio callback)
    pub fn advance(&self, frames: usize) {
        self.sample_position
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Declare that the current sample plays at `clock_seconds`
    pub fn anchor(&self, clock_seconds: f64) {
        let origin = clock_seconds - self.current_sample() as f64 / self.sample_rate;
        self.origin_bits.store(origin.to_bits(), Ordering::Relaxed);
    }

    pub fn is_anchored(&self) -> bool {
        !self.origin().is_nan()
    }

    fn origin(&self) -> f64 {
        f64::from_bits(self.origin_bits.load(Ordering::Relaxed))
    }

    /// Convert a duration in seconds to whole samples
    pub fn seconds_to_samples(&self, seconds: f64) -> u64 {
        if seconds.is_finite() && seconds > 0.0 {
            (seconds * self.sample_rate).round() as u64
        } else {
            0
        }
    }

    /// Clock time at which a sample plays (NaN before anchoring)
    pub fn time_of_sample(&self, sample: u64) -> f64 {
        self.origin() + sample as f64 / self.sample_rate
    }

    /// Sample at which a clock time plays
    ///
    /// Times in the past (or any time before anchoring) map to the current
    /// sample so late triggers play immediately.
    pub fn sample_for_time(&self, time: f64) -> u64 {
        let current = self.current_sample();
        if !self.is_anchored() {
            return current;
        }
        let offset = time - self.origin();
        self.seconds_to_samples(offset).max(current)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }
}
