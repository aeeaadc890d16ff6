// Rhythm judge - classifies key presses against the step grid

use crate::game::state::{GameState, HitOutcome};
use crate::sequencer::BoundarySnapshot;
use serde::{Deserialize, Serialize};

/// Judging and scoring constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Upper bound of the hit window, in seconds
    pub max_window: f64,
    /// Hit window as a fraction of the step period (must stay below 0.5)
    pub window_factor: f64,
    pub base_points: u32,
    pub combo_bonus_cap: u32,
    pub miss_penalty: u32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            max_window: 0.08,
            window_factor: 0.35,
            base_points: 10,
            combo_bonus_cap: 50,
            miss_penalty: 5,
        }
    }
}

/// Detailed result of one evaluated press
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitReport {
    pub outcome: HitOutcome,
    /// Signed distance to the nearest boundary in seconds (negative = early)
    pub offset: f64,
    /// Window used for this press
    pub window: f64,
    /// Points gained (positive) or lost (negative)
    pub score_delta: i64,
    pub score: u32,
    pub combo: u32,
}

/// Scores presses against the transport's step boundaries
///
/// The phase within the current step is `(now - last_boundary)` wrapped into
/// `[0, period)`, so presses while stopped, before the first tick, or with a
/// stale boundary are still judged against the grid the boundary defines.
#[derive(Debug, Clone)]
pub struct RhythmJudge {
    config: JudgeConfig,
    state: GameState,
}

impl RhythmJudge {
    pub fn new(config: JudgeConfig) -> Self {
        Self {
            config,
            state: GameState::new(),
        }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// `min(max_window, window_factor * step_period)`
    pub fn hit_window(&self, step_period: f64) -> f64 {
        self.config
            .max_window
            .min(self.config.window_factor * step_period)
    }

    /// Classify a press without touching the score
    pub fn classify(&self, now: f64, boundary: BoundarySnapshot) -> (HitOutcome, f64) {
        let period = boundary.step_period;
        if !(period.is_finite() && period > 0.0) || !now.is_finite() {
            return (HitOutcome::OffBeat, 0.0);
        }

        let window = self.hit_window(period);
        let phase = (now - boundary.last_boundary).rem_euclid(period);
        let offset = if phase <= period / 2.0 {
            phase
        } else {
            phase - period
        };

        let outcome = if phase <= window || period - phase <= window {
            HitOutcome::OnBeat
        } else {
            HitOutcome::OffBeat
        };
        (outcome, offset)
    }

    /// Judge a press at `now` and update the score
    pub fn evaluate_hit(&mut self, now: f64, boundary: BoundarySnapshot) -> HitReport {
        let (outcome, offset) = self.classify(now, boundary);

        let score_delta = match outcome {
            HitOutcome::OnBeat => i64::from(
                self.state
                    .register_on_beat(self.config.base_points, self.config.combo_bonus_cap),
            ),
            HitOutcome::OffBeat => {
                -i64::from(self.state.register_off_beat(self.config.miss_penalty))
            }
        };

        tracing::debug!(?outcome, offset, score = self.state.score(), "hit evaluated");

        HitReport {
            outcome,
            offset,
            window: self.hit_window(boundary.step_period),
            score_delta,
            score: self.state.score(),
            combo: self.state.combo(),
        }
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }
}

impl Default for RhythmJudge {
    fn default() -> Self {
        Self::new(JudgeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundary(last_boundary: f64, step_period: f64) -> BoundarySnapshot {
        BoundarySnapshot {
            last_boundary,
            step_period,
        }
    }

    #[test]
    fn test_window_formula() {
        let judge = RhythmJudge::default();
        // 120 BPM: 0.35 * 0.125 = 0.04375
        assert!((judge.hit_window(0.125) - 0.04375).abs() < 1e-12);
        // 20 BPM: capped at 0.08
        assert_eq!(judge.hit_window(0.75), 0.08);
    }

    #[test]
    fn test_hit_just_after_boundary() {
        let mut judge = RhythmJudge::default();
        let report = judge.evaluate_hit(10.02, boundary(10.0, 0.125));
        assert_eq!(report.outcome, HitOutcome::OnBeat);
        assert_eq!(report.score_delta, 10);
        assert!((report.offset - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_hit_just_before_next_boundary() {
        let judge = RhythmJudge::default();
        let (outcome, offset) = judge.classify(10.11, boundary(10.0, 0.125));
        assert_eq!(outcome, HitOutcome::OnBeat);
        assert!((offset + 0.015).abs() < 1e-9);
    }

    #[test]
    fn test_mid_step_is_off_beat() {
        let mut judge = RhythmJudge::default();
        judge.evaluate_hit(0.0, boundary(0.0, 0.125));
        let report = judge.evaluate_hit(0.06, boundary(0.0, 0.125));
        assert_eq!(report.outcome, HitOutcome::OffBeat);
        assert_eq!(report.combo, 0);
        assert_eq!(report.score_delta, -5);
        assert_eq!(report.score, 5);
    }

    #[test]
    fn test_window_symmetry() {
        let judge = RhythmJudge::default();
        let period = 0.2;
        let w = judge.hit_window(period);
        for d in [0.0, w * 0.25, w * 0.5, w * 0.99] {
            let after = judge.classify(5.0 + d, boundary(5.0, period)).0;
            let before = judge.classify(5.0 + period - d, boundary(5.0, period)).0;
            assert_eq!(after, HitOutcome::OnBeat);
            assert_eq!(after, before);
        }
        assert_eq!(
            judge.classify(5.0 + period / 2.0, boundary(5.0, period)).0,
            HitOutcome::OffBeat
        );
    }

    #[test]
    fn test_stale_boundary_wraps_into_grid() {
        let judge = RhythmJudge::default();
        // Three steps and 0.01 s after the recorded boundary
        let (outcome, _) = judge.classify(0.385, boundary(0.0, 0.125));
        assert_eq!(outcome, HitOutcome::OnBeat);
        let (outcome, _) = judge.classify(0.31, boundary(0.0, 0.125));
        assert_eq!(outcome, HitOutcome::OffBeat);
    }

    #[test]
    fn test_press_before_boundary_time() {
        let judge = RhythmJudge::default();
        let (outcome, offset) = judge.classify(9.99, boundary(10.0, 0.125));
        assert_eq!(outcome, HitOutcome::OnBeat);
        assert!((offset + 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_negative_dt_is_not_automatically_on_beat() {
        let judge = RhythmJudge::default();
        // 60 ms before a boundary whose tick was dispatched early
        let (outcome, offset) = judge.classify(9.94, boundary(10.0, 0.125));
        assert_eq!(outcome, HitOutcome::OffBeat);
        assert!((offset + 0.06).abs() < 1e-9);

        // Two whole periods late lands back on the grid
        let (outcome, _) = judge.classify(10.25, boundary(10.0, 0.125));
        assert_eq!(outcome, HitOutcome::OnBeat);
    }

    #[test]
    fn test_invalid_inputs_do_not_panic() {
        let mut judge = RhythmJudge::default();
        assert_eq!(
            judge.evaluate_hit(1.0, boundary(0.0, 0.0)).outcome,
            HitOutcome::OffBeat
        );
        assert_eq!(
            judge.evaluate_hit(f64::NAN, boundary(0.0, 0.125)).outcome,
            HitOutcome::OffBeat
        );
        assert_eq!(judge.state().score(), 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut judge = RhythmJudge::default();
        judge.evaluate_hit(0.0, boundary(0.0, 0.125));
        judge.reset();
        assert_eq!(judge.state(), &GameState::default());
    }
}
