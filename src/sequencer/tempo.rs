// Tempo - BPM value and the step period derived from it

use crate::sequencer::SequencerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Steps per quarter note (sixteenth-note grid)
pub const STEPS_PER_BEAT: u32 = 4;

/// Lowest tempo the clock supports
pub const MIN_BPM: f64 = 20.0;

/// Highest tempo the clock supports
pub const MAX_BPM: f64 = 999.0;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo
    /// BPM must be finite and in range [20.0, 999.0]
    pub fn new(bpm: f64) -> Result<Self, SequencerError> {
        if bpm.is_finite() && (MIN_BPM..=MAX_BPM).contains(&bpm) {
            Ok(Self { bpm })
        } else {
            Err(SequencerError::InvalidTempo(bpm))
        }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one step (a sixteenth note) in seconds
    pub fn step_period(&self) -> f64 {
        self.beat_duration_seconds() / STEPS_PER_BEAT as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self { bpm: 120.0 }
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Tempo bounds exposed to the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoRange {
    pub min_bpm: f64,
    pub max_bpm: f64,
}

impl TempoRange {
    pub fn new(min_bpm: f64, max_bpm: f64) -> Result<Self, SequencerError> {
        Tempo::new(min_bpm)?;
        Tempo::new(max_bpm)?;
        if min_bpm > max_bpm {
            return Err(SequencerError::InvalidTempo(min_bpm));
        }
        Ok(Self { min_bpm, max_bpm })
    }

    pub fn contains(&self, bpm: f64) -> bool {
        (self.min_bpm..=self.max_bpm).contains(&bpm)
    }

    /// Clamp a requested BPM into the range
    ///
    /// Non-finite or non-positive input is rejected instead of clamped.
    pub fn clamp(&self, bpm: f64) -> Result<Tempo, SequencerError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(SequencerError::InvalidTempo(bpm));
        }
        Tempo::new(bpm.clamp(self.min_bpm, self.max_bpm))
    }
}

impl Default for TempoRange {
    fn default() -> Self {
        Self {
            min_bpm: 70.0,
            max_bpm: 160.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_period_formula() {
        for bpm in [20.0, 70.0, 96.5, 120.0, 160.0, 999.0] {
            let tempo = Tempo::new(bpm).unwrap();
            assert!((tempo.step_period() - 60.0 / bpm / 4.0).abs() < 1e-12);
        }
        assert_eq!(Tempo::default().step_period(), 0.125);
    }

    #[test]
    fn test_invalid_tempo_rejected() {
        assert!(Tempo::new(0.0).is_err());
        assert!(Tempo::new(-120.0).is_err());
        assert!(Tempo::new(f64::NAN).is_err());
        assert!(Tempo::new(f64::INFINITY).is_err());
        assert!(Tempo::new(1000.0).is_err());
    }

    #[test]
    fn test_range_clamps() {
        let range = TempoRange::default();
        assert_eq!(range.clamp(200.0).unwrap().bpm(), 160.0);
        assert_eq!(range.clamp(30.0).unwrap().bpm(), 70.0);
        assert_eq!(range.clamp(100.0).unwrap().bpm(), 100.0);
        assert!(range.clamp(0.0).is_err());
        assert!(range.clamp(f64::NAN).is_err());
    }

    #[test]
    fn test_range_validation() {
        assert!(TempoRange::new(70.0, 160.0).is_ok());
        assert!(TempoRange::new(160.0, 70.0).is_err());
        assert!(TempoRange::new(10.0, 160.0).is_err());
    }

    #[test]
    fn test_tempo_display() {
        assert_eq!(Tempo::default().to_string(), "120.0 BPM");
    }
}
