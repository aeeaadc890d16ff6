// Session - owns the pattern, transport, judge and sound engine
// All presentation intents go through here

pub mod snapshot;

pub use snapshot::SessionSnapshot;

use crate::audio::{EngineError, SoundEngine};
use crate::config::{ConfigError, SessionConfig};
use crate::game::{GameState, HitReport, RhythmJudge};
use crate::messaging::channels::{SharedNotificationProducer, push_notification};
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::sequencer::{
    ClockSource, PatternStore, PlaybackDispatcher, RandomizePolicy, STEP_COUNT, Scheduler,
    SequencerError, Tempo, TempoRange, TrackId, TrackValues, TransportClock,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Whether the audio output has been unlocked
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AudioGate {
    /// Not attempted yet
    #[default]
    Locked,
    Ready,
    /// Unlock failed; play and scoring continue without sound
    Unavailable(EngineError),
}

impl AudioGate {
    pub fn is_ready(&self) -> bool {
        matches!(self, AudioGate::Ready)
    }
}

pub struct Session {
    patterns: Arc<RwLock<PatternStore>>,
    transport: TransportClock,
    tempo_range: TempoRange,
    judge: RhythmJudge,
    randomize_policy: RandomizePolicy,
    engine: Arc<dyn SoundEngine>,
    audio_gate: AudioGate,
    rng: StdRng,
    notifications: Option<SharedNotificationProducer>,
}

impl Session {
    pub fn new(
        config: &SessionConfig,
        engine: Arc<dyn SoundEngine>,
        scheduler: Box<dyn Scheduler>,
        clock: Arc<dyn ClockSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let tempo = config.default_tempo()?;

        Ok(Self {
            patterns: Arc::new(RwLock::new(PatternStore::new(config.scale()?))),
            transport: TransportClock::new(tempo, scheduler, clock),
            tempo_range: config.tempo_range()?,
            judge: RhythmJudge::new(config.judge),
            randomize_policy: config.randomize,
            engine,
            audio_gate: AudioGate::Locked,
            rng: StdRng::from_entropy(),
            notifications: None,
        })
    }

    /// Use a fixed seed for `randomize`
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_notifications(mut self, tx: SharedNotificationProducer) -> Self {
        self.notifications = Some(tx);
        self
    }

    fn read_patterns(&self) -> RwLockReadGuard<'_, PatternStore> {
        self.patterns.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_patterns(&self) -> RwLockWriteGuard<'_, PatternStore> {
        self.patterns.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notification: Notification) {
        if let Some(tx) = &self.notifications {
            push_notification(tx, notification);
        }
    }

    // ---- Pattern intents ----

    pub fn toggle_step(&mut self, track: TrackId, step: usize) -> Result<bool, SequencerError> {
        let value = self.write_patterns().toggle_step(track, step)?;
        tracing::debug!(%track, step, value, "step toggled");
        Ok(value)
    }

    pub fn cycle_note(&mut self, step: usize) -> Result<usize, SequencerError> {
        let value = self.write_patterns().cycle_note(step)?;
        tracing::debug!(step, value, "note cycled");
        Ok(value)
    }

    pub fn set_all(&mut self, track: TrackId, values: TrackValues) -> Result<(), SequencerError> {
        self.write_patterns().set_all(track, values)
    }

    pub fn randomize(&mut self) {
        let policy = self.randomize_policy;
        let mut patterns = self
            .patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        patterns.randomize(&policy, &mut self.rng);
        tracing::debug!("pattern randomized");
    }

    /// Silence every track and reset the score
    pub fn clear(&mut self) {
        self.write_patterns().clear();
        self.judge.reset();
        tracing::debug!("session cleared");
    }

    // ---- Transport intents ----

    /// Set the tempo, clamped to the configured range
    pub fn set_tempo(&mut self, bpm: f64) -> Result<Tempo, SequencerError> {
        let tempo = self.tempo_range.clamp(bpm)?;
        self.transport.set_tempo(tempo);
        Ok(tempo)
    }

    /// Unlock audio (once) and start the loop from step 0
    pub fn start(&mut self) {
        if self.transport.is_running() {
            return;
        }
        self.unlock_audio();

        let mut dispatcher =
            PlaybackDispatcher::new(Arc::clone(&self.patterns), Arc::clone(&self.engine));
        if let Some(tx) = &self.notifications {
            dispatcher = dispatcher.with_notifications(Arc::clone(tx));
        }
        self.transport.start(move |tick| dispatcher.dispatch(tick));
    }

    /// Stop the loop; no further triggers are issued once this returns
    pub fn stop(&mut self) {
        let stopped_at = self.transport.stop();
        self.engine.cancel_from(stopped_at);
    }

    pub fn toggle_playback(&mut self) {
        if self.transport.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    fn unlock_audio(&mut self) {
        if self.audio_gate.is_ready() {
            return;
        }
        match self.engine.ensure_ready() {
            Ok(()) => {
                tracing::info!("audio unlocked");
                self.audio_gate = AudioGate::Ready;
            }
            Err(e) => {
                tracing::warn!(error = %e, "audio unavailable, continuing without sound");
                self.notify(Notification::warning(
                    NotificationCategory::Audio,
                    format!("Audio unavailable: {e}"),
                ));
                self.audio_gate = AudioGate::Unavailable(e);
            }
        }
    }

    // ---- Game intents ----

    /// Judge a key press made at clock time `now`
    pub fn evaluate_hit(&mut self, now: f64) -> HitReport {
        self.judge.evaluate_hit(now, self.transport.boundary())
    }

    /// Judge a key press made right now
    pub fn tap(&mut self) -> HitReport {
        let now = self.transport.now();
        self.evaluate_hit(now)
    }

    // ---- Read-only state ----

    pub fn now(&self) -> f64 {
        self.transport.now()
    }

    pub fn is_running(&self) -> bool {
        self.transport.is_running()
    }

    pub fn current_step(&self) -> usize {
        self.transport.current_step()
    }

    pub fn tempo(&self) -> Tempo {
        self.transport.tempo()
    }

    pub fn tempo_range(&self) -> TempoRange {
        self.tempo_range
    }

    pub fn game_state(&self) -> GameState {
        *self.judge.state()
    }

    pub fn audio_gate(&self) -> &AudioGate {
        &self.audio_gate
    }

    /// Copy of the pattern store
    pub fn patterns(&self) -> PatternStore {
        self.read_patterns().clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let patterns = self.read_patterns();
        let scale = patterns.scale();
        let melody = *patterns.melody();
        let game = self.judge.state();

        SessionSnapshot {
            step: self.transport.audible_step(),
            running: self.transport.is_running(),
            bpm: self.transport.tempo().bpm(),
            kick: drum_copy(&patterns, TrackId::Kick),
            snare: drum_copy(&patterns, TrackId::Snare),
            hihat: drum_copy(&patterns, TrackId::HiHat),
            melody,
            melody_labels: melody.iter().map(|v| scale.label(*v)).collect(),
            score: game.score(),
            combo: game.combo(),
            last_hit: game.last_hit(),
        }
    }
}

fn drum_copy(patterns: &PatternStore, track: TrackId) -> [bool; STEP_COUNT] {
    patterns
        .drum_track(track)
        .copied()
        .unwrap_or([false; STEP_COUNT])
}
