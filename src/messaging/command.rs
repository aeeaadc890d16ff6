// Commands sent to the audio thread

use crate::audio::VoiceTrigger;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCommand {
    /// Start a voice at the trigger's scheduled time
    Trigger(VoiceTrigger),
    /// Drop every pending trigger scheduled at or after this clock time
    CancelFrom(f64),
}
