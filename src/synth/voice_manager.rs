// Voice Manager - Fixed pool of voices with stealing

use super::voice::SynthVoice;
use crate::audio::VoiceTrigger;
use rand::SeedableRng;
use rand::rngs::SmallRng;

const MAX_VOICES: usize = 24;
const MIX_GAIN: f32 = 0.5;

pub struct VoiceManager {
    voices: [SynthVoice; MAX_VOICES],
    /// Age counter incremented on each trigger for voice stealing priority
    age_counter: u64,
    noise: SmallRng,
}

impl VoiceManager {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            voices: [SynthVoice::new(sample_rate); MAX_VOICES],
            age_counter: 0,
            noise: SmallRng::seed_from_u64(0x5EED_BEA7),
        }
    }

    pub fn trigger(&mut self, trigger: &VoiceTrigger) {
        self.age_counter = self.age_counter.wrapping_add(1);

        let index = self
            .voices
            .iter()
            .position(|v| !v.is_active())
            .unwrap_or_else(|| self.find_voice_to_steal());
        self.voices[index].start(trigger, self.age_counter);
    }

    /// Releasing voices first, then the oldest one
    fn find_voice_to_steal(&self) -> usize {
        self.voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| (!v.is_releasing(), v.age()))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    pub fn next_sample(&mut self) -> f32 {
        let noise = &mut self.noise;
        self.voices
            .iter_mut()
            .map(|v| v.next_sample(&mut *noise))
            .sum::<f32>()
            * MIX_GAIN
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }
}
