use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{AUDIO_N_SAMPLES, DEFAULT_FOCUS_WINDOW, DEFAULT_HOP_SIZE};
use crate::error::ConfigError;

/// Tuning of the streaming note detector. Every field has a default, so a
/// config file only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Samples consumed per processing step.
    pub hop_size: usize,

    /// Audio context handed to the model on every hop.
    pub window_length: usize,

    /// Trailing model frames reduced into one confidence per note.
    pub focus_window: usize,

    /// RMS below which a hop counts as silence.
    pub min_volume: f32,

    /// Note confidence needed to start a note.
    pub start_threshold: f32,

    /// Note confidence needed to keep an active note sounding.
    pub keep_threshold: f32,

    /// Onset confidence needed to re-trigger an active note.
    pub onset_threshold: f32,

    /// Seconds after an onset during which the same note cannot re-trigger.
    pub retrigger_cooldown: f64,

    /// MIDI numbers below this get scaled thresholds.
    pub low_freq_bias_cutoff: u8,
    pub low_freq_bias_factor: f32,

    /// A note above this confidence can shadow its sub-octaves.
    pub harmonic_presence_threshold: f32,

    /// A sub-octave survives only with at least this fraction of the
    /// shadowing note's confidence.
    pub harmonic_ratio: f32,
}

/// Thresholds resolved for a single MIDI number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteThresholds {
    pub start: f32,
    pub keep: f32,
    pub onset: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            hop_size: DEFAULT_HOP_SIZE,
            window_length: AUDIO_N_SAMPLES,
            focus_window: DEFAULT_FOCUS_WINDOW,
            min_volume: 0.01,
            start_threshold: 0.4,
            keep_threshold: 0.3,
            onset_threshold: 0.5,
            retrigger_cooldown: 0.12,
            low_freq_bias_cutoff: 48,
            low_freq_bias_factor: 0.7,
            harmonic_presence_threshold: 0.5,
            harmonic_ratio: 0.9,
        }
    }
}

impl DetectorConfig {
    /// Load a config from a TOML file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hop_size == 0 || self.window_length == 0 || self.focus_window == 0 {
            return Err(ConfigError::Invalid(
                "hop_size, window_length and focus_window must be non-zero".to_string(),
            ));
        }
        if self.hop_size > self.window_length {
            return Err(ConfigError::Invalid(format!(
                "hop_size ({}) exceeds window_length ({})",
                self.hop_size, self.window_length
            )));
        }
        if self.keep_threshold > self.start_threshold {
            return Err(ConfigError::Invalid(format!(
                "keep_threshold ({}) must not exceed start_threshold ({})",
                self.keep_threshold, self.start_threshold
            )));
        }
        if self.low_freq_bias_factor <= 0.0 {
            return Err(ConfigError::Invalid("low_freq_bias_factor must be positive".to_string()));
        }
        Ok(())
    }

    /// Thresholds for `midi`, lowered in the bass register where the model is
    /// less confident.
    pub fn thresholds_for(&self, midi: u8) -> NoteThresholds {
        let scale = if midi < self.low_freq_bias_cutoff {
            self.low_freq_bias_factor
        } else {
            1.0
        };

        NoteThresholds {
            start: self.start_threshold * scale,
            keep: self.keep_threshold * scale,
            onset: self.onset_threshold * scale,
        }
    }

    /// Seconds of audio covered by one hop.
    pub fn hop_seconds(&self, sample_rate: usize) -> f64 {
        self.hop_size as f64 / sample_rate as f64
    }
}
