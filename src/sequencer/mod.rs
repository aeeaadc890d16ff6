// Sequencer module - step patterns, transport clock and playback dispatch
// Everything that has to stay correct on the tick path lives here

pub mod dispatcher;
pub mod pattern;
pub mod randomize;
pub mod scale;
pub mod scheduler;
pub mod tempo;
pub mod transport;

pub use dispatcher::PlaybackDispatcher;
pub use pattern::{BooleanTrack, MelodicTrack, PatternStore, TrackId, TrackValues};
pub use randomize::RandomizePolicy;
pub use scale::{Note, ParseNoteError, Scale};
pub use scheduler::{
    ClockSource, ManualClock, ManualScheduler, MonotonicClock, Scheduler, ThreadScheduler,
    TickCallback,
};
pub use tempo::{Tempo, TempoRange};
pub use transport::{BoundarySnapshot, SharedClockState, StepTick, TransportClock, TransportState};

/// Number of steps in the loop (one bar of sixteenth notes)
pub const STEP_COUNT: usize = 16;

/// Validation errors raised by pattern and tempo mutators
///
/// These are returned to the caller (the presentation layer) and never
/// interrupt the transport.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SequencerError {
    #[error("step index {index} out of range (0..{len})")]
    StepOutOfRange { index: usize, len: usize },

    #[error("track {track} does not support {operation}")]
    UnsupportedTrack {
        track: TrackId,
        operation: &'static str,
    },

    #[error("unknown track identifier: {0:?}")]
    UnknownTrack(String),

    #[error("track data has {actual} steps, expected {expected}")]
    TrackLength { expected: usize, actual: usize },

    #[error("note index {value} at step {step} is outside the scale (0..{scale_len})")]
    NoteOutOfRange {
        step: usize,
        value: usize,
        scale_len: usize,
    },

    #[error("invalid tempo: {0} BPM")]
    InvalidTempo(f64),
}

/// Check that a step index addresses a slot of the loop
pub fn check_step(index: usize) -> Result<usize, SequencerError> {
    if index < STEP_COUNT {
        Ok(index)
    } else {
        Err(SequencerError::StepOutOfRange {
            index,
            len: STEP_COUNT,
        })
    }
}

/// Map a (possibly negative) tick count onto the loop
#[inline]
pub fn wrap_step(tick: i64) -> usize {
    tick.rem_euclid(STEP_COUNT as i64) as usize
}
