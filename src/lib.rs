// StepBeat - 16-step sequencer with a tap-the-beat game
// Library exports for the binary, tests and benchmarks

pub mod audio;
pub mod config;
pub mod game;
pub mod messaging;
pub mod sequencer;
pub mod session;
pub mod synth;
pub mod ui;

// Re-export commonly used types for convenience
pub use audio::engine::AudioEngine;
pub use audio::{EngineError, SoundEngine, Voice, VoiceTrigger};
pub use config::{ConfigError, SessionConfig};
pub use game::{GameState, HitOutcome, HitReport, RhythmJudge};
pub use messaging::channels::{create_command_channel, create_notification_channel};
pub use sequencer::{
    ClockSource, ManualClock, ManualScheduler, MonotonicClock, PatternStore, Scheduler,
    SequencerError, StepTick, Tempo, ThreadScheduler, TrackId, TrackValues, TransportClock,
    TransportState,
};
pub use session::{AudioGate, Session, SessionSnapshot};
