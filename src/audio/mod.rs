// Audio module - Sound engine boundary and the cpal backend behind it

pub mod device;
pub mod dsp_utils;
pub mod engine;
pub mod parameters;
pub mod status;
pub mod timing;

use crate::sequencer::Note;

/// Sound sources the sequencer can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Voice {
    Kick,
    Snare,
    HiHat,
    Lead,
}

/// A single scheduled sound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceTrigger {
    pub voice: Voice,
    /// Pitch, for voices that have one
    pub note: Option<Note>,
    /// Gate length in seconds
    pub duration: f64,
    /// Start time in clock seconds
    pub time: f64,
    /// 0.0 to 1.0
    pub velocity: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("audio output is not ready")]
    NotReady,

    #[error("no audio output device available")]
    NoDevice,

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("audio command queue is full")]
    QueueFull,
}

/// Anything that can play voice triggers
///
/// Calls come from the clock thread and the UI thread. Implementations must
/// not block for long in `trigger`.
pub trait SoundEngine: Send + Sync {
    /// Unlock the audio output; repeated calls after success are cheap
    fn ensure_ready(&self) -> Result<(), EngineError>;

    /// Schedule a voice at `trigger.time`
    fn trigger(&self, trigger: &VoiceTrigger) -> Result<(), EngineError>;

    /// Drop pending triggers scheduled at or after `time`
    fn cancel_from(&self, _time: f64) {}
}
