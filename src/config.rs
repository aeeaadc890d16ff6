// Configuration - session settings loaded from a RON file
//
// Lookup order: a path passed on the command line, then
// `<config_dir>/stepbeat/config.ron`, then built-in defaults. Every field
// has a default, so a config file only needs the values it changes.

use crate::game::JudgeConfig;
use crate::sequencer::{ParseNoteError, RandomizePolicy, Scale, Tempo, TempoRange};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "stepbeat";
const CONFIG_FILE_NAME: &str = "config.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Invalid scale: {0}")]
    InvalidNote(#[from] ParseNoteError),
}

/// Tempo bounds and the tempo a session starts at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub min_bpm: f64,
    pub max_bpm: f64,
    pub default_bpm: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_bpm: 70.0,
            max_bpm: 160.0,
            default_bpm: 120.0,
        }
    }
}

/// Audio output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// How far ahead of their playback time ticks are dispatched, in seconds
    pub lookahead_secs: f64,
    /// Master volume (0.0 to 1.0)
    pub master_volume: f32,
    /// Capacity of the trigger queue to the audio thread
    pub command_queue_capacity: usize,
    /// Output device name; `None` uses the system default
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: 0.05,
            master_volume: 0.5,
            command_queue_capacity: 256,
            output_device: None,
        }
    }
}

/// Complete session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub tempo: TempoConfig,
    pub judge: JudgeConfig,
    pub randomize: RandomizePolicy,
    /// Pitches of the melodic track (the rest entry is implicit)
    pub scale: Vec<String>,
    pub audio: AudioConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tempo: TempoConfig::default(),
            judge: JudgeConfig::default(),
            randomize: RandomizePolicy::default(),
            scale: ["C4", "D4", "E4", "G4", "A4", "C5"]
                .into_iter()
                .map(String::from)
                .collect(),
            audio: AudioConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Default config file location for this platform
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Parse and validate a RON document
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&source)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load from `path` (or the default location); a missing file yields defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => {
                    tracing::warn!("no config directory on this platform, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Write the config, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    /// Reject values the session cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = self.tempo_range()?;
        if !range.contains(self.tempo.default_bpm) {
            return Err(ConfigError::Invalid(format!(
                "default tempo {} BPM is outside {}..={} BPM",
                self.tempo.default_bpm, range.min_bpm, range.max_bpm
            )));
        }

        let judge = &self.judge;
        if !(judge.max_window.is_finite() && judge.max_window > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "judge.max_window must be positive, got {}",
                judge.max_window
            )));
        }
        // Windows around adjacent boundaries must not overlap
        if !(judge.window_factor > 0.0 && judge.window_factor < 0.5) {
            return Err(ConfigError::Invalid(format!(
                "judge.window_factor must be in (0, 0.5), got {}",
                judge.window_factor
            )));
        }

        for (name, probability) in self.randomize.probabilities() {
            if !(0.0..=1.0).contains(&probability) {
                return Err(ConfigError::Invalid(format!(
                    "randomize.{name} must be within 0..=1, got {probability}"
                )));
            }
        }

        if self.scale()?.pitch_count() == 0 {
            return Err(ConfigError::Invalid("scale needs at least one note".into()));
        }

        let audio = &self.audio;
        if !(audio.lookahead_secs.is_finite() && (0.0..=1.0).contains(&audio.lookahead_secs)) {
            return Err(ConfigError::Invalid(format!(
                "audio.lookahead_secs must be within 0..=1, got {}",
                audio.lookahead_secs
            )));
        }
        if !(0.0..=1.0).contains(&audio.master_volume) {
            return Err(ConfigError::Invalid(format!(
                "audio.master_volume must be within 0..=1, got {}",
                audio.master_volume
            )));
        }
        if audio.command_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "audio.command_queue_capacity must be at least 1".into(),
            ));
        }

        Ok(())
    }

    pub fn tempo_range(&self) -> Result<TempoRange, ConfigError> {
        TempoRange::new(self.tempo.min_bpm, self.tempo.max_bpm)
            .map_err(|e| ConfigError::Invalid(format!("tempo range: {e}")))
    }

    pub fn default_tempo(&self) -> Result<Tempo, ConfigError> {
        Tempo::new(self.tempo.default_bpm)
            .map_err(|e| ConfigError::Invalid(format!("default tempo: {e}")))
    }

    pub fn scale(&self) -> Result<Scale, ConfigError> {
        Ok(Scale::from_labels(&self.scale)?)
    }
}
