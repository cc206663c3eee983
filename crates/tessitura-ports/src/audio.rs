use crate::types::*;

#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("unsupported config: {0}")]
    UnsupportedConfig(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Capture callback: runs on the device thread and must be realtime-safe.
/// No blocking, no allocation, no I/O.
pub trait AudioCaptureCallback: Send + 'static {
    /// `mono` holds one channel of the device buffer, `sample_time_start` counts
    /// samples delivered since the stream opened.
    fn capture(&mut self, sample_time_start: SampleTime, mono: &[f32]);
}

/// Open capture stream. Closing (or dropping) releases the device.
pub trait AudioStreamHandle: Send {
    fn close(self: Box<Self>);
}

pub trait AudioInputPort: Send + Sync {
    fn list_inputs(&self) -> Result<Vec<AudioInputDevice>, AudioError>;

    fn default_input(&self) -> Result<DeviceId, AudioError>;

    fn open_input(
        &self,
        device_id: &DeviceId,
        config: AudioConfig,
        cb: Box<dyn AudioCaptureCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError>;
}
