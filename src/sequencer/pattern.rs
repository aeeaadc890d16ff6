// Pattern - The four step tracks of the loop
// Three percussive on/off tracks plus one melodic track indexing into a scale

use crate::sequencer::randomize::RandomizePolicy;
use crate::sequencer::scale::{Note, Scale};
use crate::sequencer::{STEP_COUNT, SequencerError, check_step};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// On/off value per step for a percussive voice
pub type BooleanTrack = [bool; STEP_COUNT];

/// Scale index per step for the melodic voice (0 = rest)
pub type MelodicTrack = [usize; STEP_COUNT];

/// Identifies one of the four tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackId {
    Kick,
    Snare,
    HiHat,
    Melody,
}

impl TrackId {
    /// All tracks in display order
    pub const ALL: [TrackId; 4] = [TrackId::Kick, TrackId::Snare, TrackId::HiHat, TrackId::Melody];

    /// The percussive (boolean) tracks
    pub const DRUMS: [TrackId; 3] = [TrackId::Kick, TrackId::Snare, TrackId::HiHat];

    pub fn is_drum(self) -> bool {
        !matches!(self, TrackId::Melody)
    }

    pub fn name(self) -> &'static str {
        match self {
            TrackId::Kick => "kick",
            TrackId::Snare => "snare",
            TrackId::HiHat => "hihat",
            TrackId::Melody => "melody",
        }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrackId {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kick" => Ok(TrackId::Kick),
            "snare" => Ok(TrackId::Snare),
            "hihat" | "hi-hat" | "hat" => Ok(TrackId::HiHat),
            "melody" | "lead" => Ok(TrackId::Melody),
            _ => Err(SequencerError::UnknownTrack(s.to_string())),
        }
    }
}

/// Replacement data for a whole track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackValues {
    /// On/off values for a percussive track
    Steps(Vec<bool>),
    /// Scale indices for the melodic track
    Notes(Vec<usize>),
}

/// Holds the loop content
///
/// All mutators validate their input and leave the store untouched on error.
/// None of them produce sound; playback only happens from transport ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternStore {
    kick: BooleanTrack,
    snare: BooleanTrack,
    hihat: BooleanTrack,
    melody: MelodicTrack,
    scale: Scale,
}

impl PatternStore {
    /// Create an empty pattern using the given scale for the melodic track
    pub fn new(scale: Scale) -> Self {
        Self {
            kick: [false; STEP_COUNT],
            snare: [false; STEP_COUNT],
            hihat: [false; STEP_COUNT],
            melody: [0; STEP_COUNT],
            scale,
        }
    }

    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    /// Read a percussive track
    pub fn drum_track(&self, track: TrackId) -> Result<&BooleanTrack, SequencerError> {
        match track {
            TrackId::Kick => Ok(&self.kick),
            TrackId::Snare => Ok(&self.snare),
            TrackId::HiHat => Ok(&self.hihat),
            TrackId::Melody => Err(SequencerError::UnsupportedTrack {
                track,
                operation: "on/off steps",
            }),
        }
    }

    fn drum_track_mut(
        &mut self,
        track: TrackId,
        operation: &'static str,
    ) -> Result<&mut BooleanTrack, SequencerError> {
        match track {
            TrackId::Kick => Ok(&mut self.kick),
            TrackId::Snare => Ok(&mut self.snare),
            TrackId::HiHat => Ok(&mut self.hihat),
            TrackId::Melody => Err(SequencerError::UnsupportedTrack { track, operation }),
        }
    }

    pub fn melody(&self) -> &MelodicTrack {
        &self.melody
    }

    /// Whether a track sounds at a step (out-of-range steps are silent)
    pub fn is_active(&self, track: TrackId, step: usize) -> bool {
        if step >= STEP_COUNT {
            return false;
        }
        match track {
            TrackId::Kick => self.kick[step],
            TrackId::Snare => self.snare[step],
            TrackId::HiHat => self.hihat[step],
            TrackId::Melody => self.melody[step] != 0,
        }
    }

    /// Pitch of the melodic track at a step, `None` for a rest
    pub fn note_at(&self, step: usize) -> Option<Note> {
        self.melody
            .get(step)
            .and_then(|index| self.scale.note(*index))
    }

    /// Number of sounding steps on a track
    pub fn active_step_count(&self, track: TrackId) -> usize {
        (0..STEP_COUNT)
            .filter(|step| self.is_active(track, *step))
            .count()
    }

    /// Flip one step of a percussive track, returning the new value
    pub fn toggle_step(&mut self, track: TrackId, index: usize) -> Result<bool, SequencerError> {
        let index = check_step(index)?;
        let steps = self.drum_track_mut(track, "toggle_step")?;
        steps[index] = !steps[index];
        Ok(steps[index])
    }

    /// Advance the melodic entry at `index` to the next scale index, returning it
    pub fn cycle_note(&mut self, index: usize) -> Result<usize, SequencerError> {
        let index = check_step(index)?;
        let next = self.scale.next_index(self.melody[index]);
        self.melody[index] = next;
        Ok(next)
    }

    /// Replace a whole track
    pub fn set_all(&mut self, track: TrackId, values: TrackValues) -> Result<(), SequencerError> {
        match values {
            TrackValues::Steps(steps) => {
                let parsed = to_fixed(&steps)?;
                *self.drum_track_mut(track, "set_all with on/off steps")? = parsed;
            }
            TrackValues::Notes(notes) => {
                if track.is_drum() {
                    return Err(SequencerError::UnsupportedTrack {
                        track,
                        operation: "set_all with notes",
                    });
                }
                let parsed = to_fixed(&notes)?;
                let scale_len = self.scale.len();
                if let Some((step, value)) = parsed
                    .iter()
                    .enumerate()
                    .find(|(_, value)| **value >= scale_len)
                {
                    return Err(SequencerError::NoteOutOfRange {
                        step,
                        value: *value,
                        scale_len,
                    });
                }
                self.melody = parsed;
            }
        }
        Ok(())
    }

    /// Silence every track
    pub fn clear(&mut self) {
        self.kick = [false; STEP_COUNT];
        self.snare = [false; STEP_COUNT];
        self.hihat = [false; STEP_COUNT];
        self.melody = [0; STEP_COUNT];
    }

    /// Replace every track with a freshly generated groove
    pub fn randomize<R: Rng + ?Sized>(&mut self, policy: &RandomizePolicy, rng: &mut R) {
        let generated = policy.generate(self.scale.len(), rng);
        self.kick = generated.kick;
        self.snare = generated.snare;
        self.hihat = generated.hihat;
        self.melody = generated.melody;
    }
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new(Scale::default())
    }
}

fn to_fixed<T: Copy + Default>(values: &[T]) -> Result<[T; STEP_COUNT], SequencerError> {
    if values.len() != STEP_COUNT {
        return Err(SequencerError::TrackLength {
            expected: STEP_COUNT,
            actual: values.len(),
        });
    }
    let mut fixed = [T::default(); STEP_COUNT];
    fixed.copy_from_slice(values);
    Ok(fixed)
}
