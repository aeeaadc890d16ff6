// Synth module - Drum and lead voices rendered on the audio thread

pub mod envelope;
pub mod oscillator;
pub mod voice;
pub mod voice_manager;
