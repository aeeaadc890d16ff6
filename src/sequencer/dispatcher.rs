// Playback dispatcher - turns transport ticks into voice triggers
// Runs on the clock thread; engine failures never reach the transport

use crate::audio::{EngineError, SoundEngine, Voice, VoiceTrigger};
use crate::messaging::channels::{SharedNotificationProducer, push_notification};
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::sequencer::pattern::{PatternStore, TrackId};
use crate::sequencer::scale::Note;
use crate::sequencer::transport::StepTick;
use std::sync::{Arc, PoisonError, RwLock};

/// Kick pitch (C1)
const KICK_NOTE: u8 = 24;
const HIHAT_VELOCITY: f32 = 0.6;
const FULL_VELOCITY: f32 = 1.0;

/// Voice lengths in steps (one step is a sixteenth note)
const EIGHTH_NOTE: f64 = 2.0;
const SIXTEENTH_NOTE: f64 = 1.0;
const THIRTY_SECOND_NOTE: f64 = 0.5;

pub struct PlaybackDispatcher {
    patterns: Arc<RwLock<PatternStore>>,
    engine: Arc<dyn SoundEngine>,
    notifications: Option<SharedNotificationProducer>,
    /// Consecutive rejected triggers, reset on the next success
    failed_triggers: u64,
}

impl PlaybackDispatcher {
    pub fn new(patterns: Arc<RwLock<PatternStore>>, engine: Arc<dyn SoundEngine>) -> Self {
        Self {
            patterns,
            engine,
            notifications: None,
            failed_triggers: 0,
        }
    }

    pub fn with_notifications(mut self, tx: SharedNotificationProducer) -> Self {
        self.notifications = Some(tx);
        self
    }

    pub fn failed_triggers(&self) -> u64 {
        self.failed_triggers
    }

    /// Issue one trigger per voice active at the tick's step
    pub fn dispatch(&mut self, tick: StepTick) {
        let triggers = {
            let store = self.patterns.read().unwrap_or_else(PoisonError::into_inner);
            triggers_for(&store, &tick)
        };

        for trigger in &triggers {
            match self.engine.trigger(trigger) {
                Ok(()) => {
                    if self.failed_triggers > 0 {
                        tracing::info!(
                            failed = self.failed_triggers,
                            "sound engine accepting triggers again"
                        );
                        self.failed_triggers = 0;
                    }
                }
                Err(e) => self.report_failure(trigger, &e),
            }
        }
    }

    fn report_failure(&mut self, trigger: &VoiceTrigger, error: &EngineError) {
        self.failed_triggers += 1;
        if self.failed_triggers > 1 {
            tracing::debug!(voice = ?trigger.voice, %error, "trigger dropped");
            return;
        }

        tracing::warn!(voice = ?trigger.voice, %error, "sound engine rejected trigger");
        if let Some(tx) = &self.notifications {
            push_notification(
                tx,
                Notification::warning(
                    NotificationCategory::Audio,
                    format!("Sound unavailable: {error}"),
                ),
            );
        }
    }
}

/// Triggers for every active voice at a tick, in kick/snare/hi-hat/melody order
pub fn triggers_for(store: &PatternStore, tick: &StepTick) -> Vec<VoiceTrigger> {
    let step_period = tick.step_period;
    let mut triggers = Vec::with_capacity(4);

    let mut push = |voice, note, steps: f64, velocity| {
        triggers.push(VoiceTrigger {
            voice,
            note,
            duration: steps * step_period,
            time: tick.time,
            velocity,
        });
    };

    if store.is_active(TrackId::Kick, tick.step) {
        push(
            Voice::Kick,
            Some(Note::from_midi(KICK_NOTE)),
            EIGHTH_NOTE,
            FULL_VELOCITY,
        );
    }
    if store.is_active(TrackId::Snare, tick.step) {
        push(Voice::Snare, None, SIXTEENTH_NOTE, FULL_VELOCITY);
    }
    if store.is_active(TrackId::HiHat, tick.step) {
        push(Voice::HiHat, None, THIRTY_SECOND_NOTE, HIHAT_VELOCITY);
    }
    if let Some(note) = store.note_at(tick.step) {
        push(Voice::Lead, Some(note), EIGHTH_NOTE, FULL_VELOCITY);
    }

    triggers
}
