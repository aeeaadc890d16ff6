// Voice - One sounding instance of a drum hit or lead note

use super::envelope::{AmpEnvelope, EnvelopeShape};
use super::oscillator::{Oscillator, SimpleOscillator, WaveformType};
use crate::audio::{Voice, VoiceTrigger};
use rand::Rng;

/// Kick pitch starts this many times above its base note
const KICK_SWEEP_RATIO: f32 = 4.0;
/// Fallback pitch when a trigger carries no note
const KICK_BASE_HZ: f32 = 32.7;
const SNARE_TONE_HZ: f32 = 185.0;
const LEAD_RELEASE: f32 = 0.06;
const LEAD_GAIN: f32 = 0.45;
/// One-pole coefficient of the hi-hat's low-pass (its complement is the output)
const HIHAT_LOWPASS: f32 = 0.55;

#[derive(Debug, Clone, Copy)]
pub struct SynthVoice {
    kind: Voice,
    oscillator: SimpleOscillator,
    amp: AmpEnvelope,
    /// Pitch sweep (kick) or noise layer (snare)
    aux: AmpEnvelope,
    base_frequency: f32,
    lowpass: f32,
    velocity: f32,
    age: u64,
    sample_rate: f32,
}

impl SynthVoice {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            kind: Voice::Lead,
            oscillator: SimpleOscillator::new(WaveformType::Sine, sample_rate),
            amp: AmpEnvelope::new(sample_rate),
            aux: AmpEnvelope::new(sample_rate),
            base_frequency: 0.0,
            lowpass: 0.0,
            velocity: 0.0,
            age: 0,
            sample_rate,
        }
    }

    /// Start sounding a trigger; `age` orders voices for stealing
    pub fn start(&mut self, trigger: &VoiceTrigger, age: u64) {
        self.kind = trigger.voice;
        self.velocity = trigger.velocity.clamp(0.0, 1.0);
        self.age = age;
        self.lowpass = 0.0;
        self.base_frequency = trigger.note.map(|n| n.frequency()).unwrap_or(KICK_BASE_HZ);

        let waveform = match trigger.voice {
            Voice::Lead => WaveformType::Triangle,
            _ => WaveformType::Sine,
        };
        self.oscillator = SimpleOscillator::new(waveform, self.sample_rate);

        match trigger.voice {
            Voice::Kick => {
                self.amp.trigger(EnvelopeShape::percussive(0.001, 0.12));
                self.aux.trigger(EnvelopeShape::percussive(0.0, 0.03));
            }
            Voice::Snare => {
                self.oscillator.set_frequency(SNARE_TONE_HZ);
                self.amp.trigger(EnvelopeShape::percussive(0.001, 0.04));
                self.aux.trigger(EnvelopeShape::percussive(0.001, 0.07));
            }
            Voice::HiHat => {
                self.amp.trigger(EnvelopeShape::percussive(0.0005, 0.02));
            }
            Voice::Lead => {
                self.oscillator.set_frequency(self.base_frequency);
                let hold = (trigger.duration as f32).max(0.0);
                self.amp.trigger(EnvelopeShape {
                    attack: 0.005,
                    hold,
                    release: LEAD_RELEASE,
                });
            }
        }
    }

    pub fn is_active(&self) -> bool {
        // The snare's noise layer outlasts its tone
        self.amp.is_active() || (self.kind == Voice::Snare && self.aux.is_active())
    }

    pub fn is_releasing(&self) -> bool {
        self.amp.is_releasing()
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn kind(&self) -> Voice {
        self.kind
    }

    pub fn next_sample<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f32 {
        if !self.is_active() {
            return 0.0;
        }

        let sample = match self.kind {
            Voice::Kick => {
                let sweep = self.aux.next_sample();
                let freq = self.base_frequency * (1.0 + (KICK_SWEEP_RATIO - 1.0) * sweep);
                self.oscillator.set_frequency(freq);
                self.oscillator.next_sample() * self.amp.next_sample()
            }
            Voice::Snare => {
                let noise: f32 = rng.gen_range(-1.0..1.0);
                let tone = self.oscillator.next_sample() * self.amp.next_sample() * 0.4;
                tone + noise * self.aux.next_sample() * 0.6
            }
            Voice::HiHat => {
                let noise: f32 = rng.gen_range(-1.0..1.0);
                self.lowpass += HIHAT_LOWPASS * (noise - self.lowpass);
                (noise - self.lowpass) * self.amp.next_sample() * 0.5
            }
            Voice::Lead => self.oscillator.next_sample() * self.amp.next_sample() * LEAD_GAIN,
        };

        sample * self.velocity
    }
}
