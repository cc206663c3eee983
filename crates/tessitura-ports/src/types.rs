use serde::{Deserialize, Serialize};
use std::fmt;

pub type SampleTime = u64; // capture sample index, monotonic while stream running

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioInputDevice {
    pub id: DeviceId,
    pub name: String,
    pub default_sample_rate_hz: u32,
    pub default_channels: u16,
}

/// Capture and pitch analysis settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate_hz: u32,
    pub block_size_frames: u32,
    pub channels: u16,
    pub min_freq_hz: f32,
    pub max_freq_hz: f32,
    /// Minimum normalized autocorrelation peak for a frame to count as pitched.
    pub corr_threshold: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100,
            block_size_frames: 1024,
            channels: 1,
            min_freq_hz: 80.0,
            max_freq_hz: 900.0,
            corr_threshold: 0.35,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("min_freq_hz ({min}) must be below max_freq_hz ({max})")]
    EmptyPitchRange { min: f32, max: f32 },
    #[error("pitch range up to {max_freq_hz} Hz needs a sample rate above {sample_rate_hz} Hz")]
    RangeAboveNyquist { max_freq_hz: f32, sample_rate_hz: u32 },
}

fn positive_f32(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field });
    }
    if value <= 0.0 {
        return Err(ConfigError::NotPositive { field });
    }
    Ok(())
}

fn positive_f64(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field });
    }
    if value <= 0.0 {
        return Err(ConfigError::NotPositive { field });
    }
    Ok(())
}

impl AudioConfig {
    pub fn frame_duration_s(&self) -> f64 {
        self.block_size_frames as f64 / self.sample_rate_hz as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::NotPositive { field: "sample_rate_hz" });
        }
        if self.block_size_frames == 0 {
            return Err(ConfigError::NotPositive { field: "block_size_frames" });
        }
        if self.channels == 0 {
            return Err(ConfigError::NotPositive { field: "channels" });
        }
        positive_f32("min_freq_hz", self.min_freq_hz)?;
        positive_f32("max_freq_hz", self.max_freq_hz)?;
        if self.min_freq_hz >= self.max_freq_hz {
            return Err(ConfigError::EmptyPitchRange {
                min: self.min_freq_hz,
                max: self.max_freq_hz,
            });
        }
        if self.max_freq_hz * 2.0 > self.sample_rate_hz as f32 {
            return Err(ConfigError::RangeAboveNyquist {
                max_freq_hz: self.max_freq_hz,
                sample_rate_hz: self.sample_rate_hz,
            });
        }
        if !self.corr_threshold.is_finite() {
            return Err(ConfigError::NotFinite { field: "corr_threshold" });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteTrackingConfig {
    /// Voicing threshold as a multiple of the running noise floor.
    pub energy_multiplier: f32,
    pub min_note_s: f64,
    /// Hangover: unvoiced time needed before an active note ends.
    pub release_s: f64,
}

impl Default for NoteTrackingConfig {
    fn default() -> Self {
        Self {
            energy_multiplier: 3.0,
            min_note_s: 0.12,
            release_s: 0.15,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub pitch_tolerance_cents: f64,
    pub rhythm_tolerance_s: f64,
    pub pitch_weight: f64,
    pub rhythm_weight: f64,
}

impl NoteTrackingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_f32("energy_multiplier", self.energy_multiplier)?;
        if !self.min_note_s.is_finite() || self.min_note_s < 0.0 {
            return Err(ConfigError::NotFinite { field: "min_note_s" });
        }
        if !self.release_s.is_finite() || self.release_s < 0.0 {
            return Err(ConfigError::NotFinite { field: "release_s" });
        }
        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            pitch_tolerance_cents: 80.0,
            rhythm_tolerance_s: 0.25,
            pitch_weight: 0.6,
            rhythm_weight: 0.4,
        }
    }
}

impl ScoringConfig {
    /// Tolerances divide the errors, and the weights divide the blend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_f64("pitch_tolerance_cents", self.pitch_tolerance_cents)?;
        positive_f64("rhythm_tolerance_s", self.rhythm_tolerance_s)?;
        if !self.pitch_weight.is_finite() || self.pitch_weight < 0.0 {
            return Err(ConfigError::NotFinite { field: "pitch_weight" });
        }
        if !self.rhythm_weight.is_finite() || self.rhythm_weight < 0.0 {
            return Err(ConfigError::NotFinite { field: "rhythm_weight" });
        }
        positive_f64("pitch_weight + rhythm_weight", self.pitch_weight + self.rhythm_weight)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
