// Session snapshot - read-only view handed to the presentation layer

use crate::game::HitOutcome;
use crate::sequencer::{BooleanTrack, MelodicTrack, TrackId};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Step currently heard (lags the dispatch cursor by the lookahead)
    pub step: usize,
    pub running: bool,
    pub bpm: f64,
    pub kick: BooleanTrack,
    pub snare: BooleanTrack,
    pub hihat: BooleanTrack,
    pub melody: MelodicTrack,
    /// Display label of the melodic value at each step
    pub melody_labels: Vec<String>,
    pub score: u32,
    pub combo: u32,
    pub last_hit: Option<HitOutcome>,
}

impl SessionSnapshot {
    /// Steps of a percussive track; `None` for the melody
    pub fn drum_track(&self, track: TrackId) -> Option<&BooleanTrack> {
        match track {
            TrackId::Kick => Some(&self.kick),
            TrackId::Snare => Some(&self.snare),
            TrackId::HiHat => Some(&self.hihat),
            TrackId::Melody => None,
        }
    }
}
