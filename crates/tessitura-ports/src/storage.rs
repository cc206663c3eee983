use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("invalid settings: {0}")]
    Invalid(#[from] ConfigError),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    pub selected_audio_in: Option<DeviceId>,
    pub audio: AudioConfig,
    pub tracking: NoteTrackingConfig,
    pub scoring: ScoringConfig,
}

impl SettingsDto {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.audio.validate()?;
        self.tracking.validate()?;
        self.scoring.validate()
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;
}
