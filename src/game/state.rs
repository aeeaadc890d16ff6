// Game state - score, combo and the last judged hit

/// Result of judging one key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    OnBeat,
    OffBeat,
}

/// Score keeping for the rhythm game
///
/// Score never goes below zero. `last_hit` is `None` until the first press
/// and after a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameState {
    score: u32,
    combo: u32,
    last_hit: Option<HitOutcome>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn last_hit(&self) -> Option<HitOutcome> {
        self.last_hit
    }

    /// Award `base + min(combo, bonus_cap)` and extend the combo
    ///
    /// Returns the points awarded.
    pub fn register_on_beat(&mut self, base_points: u32, combo_bonus_cap: u32) -> u32 {
        let points = base_points.saturating_add(self.combo.min(combo_bonus_cap));
        self.score = self.score.saturating_add(points);
        self.combo = self.combo.saturating_add(1);
        self.last_hit = Some(HitOutcome::OnBeat);
        points
    }

    /// Break the combo and take up to `penalty` points
    ///
    /// Returns the points actually removed.
    pub fn register_off_beat(&mut self, penalty: u32) -> u32 {
        let before = self.score;
        self.score = self.score.saturating_sub(penalty);
        self.combo = 0;
        self.last_hit = Some(HitOutcome::OffBeat);
        before - self.score
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_beat_bonus_grows_with_combo() {
        let mut state = GameState::new();
        assert_eq!(state.register_on_beat(10, 50), 10);
        assert_eq!(state.register_on_beat(10, 50), 11);
        assert_eq!(state.register_on_beat(10, 50), 12);
        assert_eq!(state.score(), 33);
        assert_eq!(state.combo(), 3);
        assert_eq!(state.last_hit(), Some(HitOutcome::OnBeat));
    }

    #[test]
    fn test_combo_bonus_is_capped() {
        let mut state = GameState::new();
        for _ in 0..60 {
            state.register_on_beat(10, 50);
        }
        assert_eq!(state.register_on_beat(10, 50), 60);
    }

    #[test]
    fn test_off_beat_never_goes_negative() {
        let mut state = GameState::new();
        assert_eq!(state.register_off_beat(5), 0);
        assert_eq!(state.score(), 0);

        state.register_on_beat(3, 50);
        assert_eq!(state.register_off_beat(5), 3);
        assert_eq!(state.score(), 0);
        assert_eq!(state.combo(), 0);
        assert_eq!(state.last_hit(), Some(HitOutcome::OffBeat));
    }

    #[test]
    fn test_reset() {
        let mut state = GameState::new();
        state.register_on_beat(10, 50);
        state.reset();
        assert_eq!(state, GameState::default());
        assert_eq!(state.last_hit(), None);
    }
}
