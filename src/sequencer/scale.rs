// Scale - pitch set used by the melodic track
// Index 0 is always the rest entry, pitches start at index 1

use std::fmt;
use std::str::FromStr;

/// Label shown for the rest entry
pub const REST_LABEL: &str = "-";

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A pitched note, stored as a MIDI note number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Note {
    midi: u8,
}

impl Note {
    /// Create a note from a MIDI note number (clamped to 0..=127)
    pub fn from_midi(midi: u8) -> Self {
        Self {
            midi: midi.min(127),
        }
    }

    /// MIDI note number (C4 = 60)
    pub fn midi(&self) -> u8 {
        self.midi
    }

    /// Frequency in Hz, equal temperament with A4 = 440 Hz
    pub fn frequency(&self) -> f32 {
        440.0 * 2.0_f32.powf((self.midi as f32 - 69.0) / 12.0)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octave = self.midi as i32 / 12 - 1;
        write!(f, "{}{}", NOTE_NAMES[self.midi as usize % 12], octave)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid note name: {0:?}")]
pub struct ParseNoteError(pub String);

impl FromStr for Note {
    type Err = ParseNoteError;

    /// Parse scientific pitch notation: `C4`, `F#3`, `Bb2`, `C-1`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseNoteError(s.to_string());
        let trimmed = s.trim();
        let mut chars = trimmed.chars();

        let letter = chars.next().ok_or_else(err)?;
        let semitone: i32 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(err()),
        };

        let rest = chars.as_str();
        let (accidental, octave_str) = if let Some(r) = rest.strip_prefix('#') {
            (1, r)
        } else if let Some(r) = rest.strip_prefix('b') {
            (-1, r)
        } else {
            (0, rest)
        };

        let octave: i32 = octave_str.parse().map_err(|_| err())?;
        let midi = (octave + 1) * 12 + semitone + accidental;

        u8::try_from(midi)
            .ok()
            .filter(|m| *m <= 127)
            .map(Note::from_midi)
            .ok_or_else(err)
    }
}

/// Ordered pitch set with a reserved rest at index 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scale {
    notes: Vec<Note>,
}

#[allow(clippy::len_without_is_empty)]
impl Scale {
    /// Build a scale from its pitched entries (the rest is implicit)
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    /// Parse a list of note labels such as `["C4", "D4", "E4"]`
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, ParseNoteError> {
        let notes = labels
            .iter()
            .map(|label| label.as_ref().parse())
            .collect::<Result<Vec<Note>, _>>()?;
        Ok(Self::new(notes))
    }

    /// Number of entries, rest included
    pub fn len(&self) -> usize {
        self.notes.len() + 1
    }

    /// Number of playable pitches
    pub fn pitch_count(&self) -> usize {
        self.notes.len()
    }

    /// Note at a scale index; `None` for the rest or an index past the end
    pub fn note(&self, index: usize) -> Option<Note> {
        index
            .checked_sub(1)
            .and_then(|i| self.notes.get(i).copied())
    }

    /// Display label for a scale index
    pub fn label(&self, index: usize) -> String {
        if index == 0 {
            REST_LABEL.to_string()
        } else {
            self.note(index)
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string())
        }
    }

    /// Next index when cycling, wrapping back to the rest
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.len()
    }
}

impl Default for Scale {
    /// C major pentatonic, C4 to C5
    fn default() -> Self {
        Self::new([60, 62, 64, 67, 69, 72].into_iter().map(Note::from_midi).collect())
    }
}
