// Game module - rhythm judging and score keeping

pub mod judge;
pub mod state;

pub use judge::{HitReport, JudgeConfig, RhythmJudge};
pub use state::{GameState, HitOutcome};
