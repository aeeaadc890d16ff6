// Amplitude envelope
//
// Linear attack, a hold segment while the note is gated, then an
// exponential release. Percussive voices use a zero hold so the release
// acts as their decay.

/// Level under which a releasing envelope is considered silent
const SILENCE: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvelopeState {
    Idle,
    Attack,
    Hold,
    Release,
}

/// Envelope timings, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeShape {
    pub attack: f32,
    pub hold: f32,
    /// Time constant of the exponential release
    pub release: f32,
}

impl EnvelopeShape {
    pub fn percussive(attack: f32, decay: f32) -> Self {
        Self {
            attack,
            hold: 0.0,
            release: decay,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AmpEnvelope {
    state: EnvelopeState,
    level: f32,
    attack_step: f32,
    hold_samples: u32,
    held: u32,
    release_coeff: f32,
    sample_rate: f32,
}

impl AmpEnvelope {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            state: EnvelopeState::Idle,
            level: 0.0,
            attack_step: 1.0,
            hold_samples: 0,
            held: 0,
            release_coeff: 0.0,
            sample_rate,
        }
    }

    /// Restart the envelope with a new shape
    pub fn trigger(&mut self, shape: EnvelopeShape) {
        let attack_samples = (shape.attack.max(0.0) * self.sample_rate).max(1.0);
        self.attack_step = 1.0 / attack_samples;
        self.hold_samples = (shape.hold.max(0.0) * self.sample_rate) as u32;
        self.held = 0;
        let release_samples = (shape.release.max(1e-4) * self.sample_rate).max(1.0);
        self.release_coeff = (-1.0 / release_samples).exp();
        self.level = 0.0;
        self.state = EnvelopeState::Attack;
    }

    /// Jump to the release phase
    pub fn release(&mut self) {
        if self.state != EnvelopeState::Idle {
            self.state = EnvelopeState::Release;
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        match self.state {
            EnvelopeState::Idle => return 0.0,
            EnvelopeState::Attack => {
                self.level += self.attack_step;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.state = if self.hold_samples > 0 {
                        EnvelopeState::Hold
                    } else {
                        EnvelopeState::Release
                    };
                }
            }
            EnvelopeState::Hold => {
                self.held += 1;
                if self.held >= self.hold_samples {
                    self.state = EnvelopeState::Release;
                }
            }
            EnvelopeState::Release => {
                self.level *= self.release_coeff;
                if self.level < SILENCE {
                    self.level = 0.0;
                    self.state = EnvelopeState::Idle;
                }
            }
        }
        self.level
    }

    pub fn is_active(&self) -> bool {
        self.state != EnvelopeState::Idle
    }

    pub fn is_releasing(&self) -> bool {
        self.state == EnvelopeState::Release
    }
}
