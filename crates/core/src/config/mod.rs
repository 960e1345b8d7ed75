use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{tempo::DEFAULT_TEMPO, BeatSyncError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub calibration: InputCalibration,
}

impl AppConfig {
    /// Parses a configuration from JSON. Missing sections fall back to their
    /// defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let tempo = self.engine.starting_tempo;
        if !(tempo.is_finite() && tempo > 0.0) {
            return Err(BeatSyncError::InvalidTempo { tempo });
        }
        let speed = self.engine.playback_speed;
        if !(speed.is_finite() && speed >= 0.0) {
            return Err(BeatSyncError::InvalidPlaybackSpeed { speed });
        }
        if !self.calibration.audio_offset_ms.is_finite() {
            return Err(BeatSyncError::msg("audio offset must be finite"));
        }
        Ok(())
    }
}

/// Configuration for the beat clock and scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tempo of the mandatory change at beat 0.
    pub starting_tempo: f64,
    /// Multiplier applied to every seconds delta from the timing source.
    pub playback_speed: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_tempo: DEFAULT_TEMPO,
            playback_speed: 1.0,
        }
    }
}

/// Per-player latency calibration handed to audio-driven event callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputCalibration {
    /// Output latency in milliseconds. Positive values mean audio is heard
    /// later than the logical clock, so audio callbacks run that much earlier.
    pub audio_offset_ms: f64,
    /// Suppresses sounds that only exist as feedback for player input.
    pub disable_input_sounds: bool,
}

impl InputCalibration {
    pub fn audio_offset_seconds(&self) -> f64 {
        self.audio_offset_ms / 1000.0
    }
}
