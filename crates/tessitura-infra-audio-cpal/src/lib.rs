use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, FromSample, SampleFormat, SampleRate, SizedSample, StreamConfig,
    SupportedStreamConfigRange,
};
use std::sync::mpsc;
use std::thread;
use tessitura_ports::audio::{AudioCaptureCallback, AudioError, AudioInputPort, AudioStreamHandle};
use tessitura_ports::types::{AudioConfig, AudioInputDevice, DeviceId};

/// Mono scratch reserved up front; larger device buffers grow it once.
const INITIAL_SCRATCH_FRAMES: usize = 8192;

pub struct CpalAudioInputPort {
    host: cpal::Host,
}

impl CpalAudioInputPort {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn with_host(host: cpal::Host) -> Self {
        Self { host }
    }

    fn list_devices_from_host(
        host: &cpal::Host,
    ) -> Result<Vec<(DeviceId, cpal::Device)>, AudioError> {
        let host_id = format!("{:?}", host.id());
        let devices = host
            .input_devices()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| {
                let name = device.name().unwrap_or_else(|_| "Unknown Input".to_string());
                (DeviceId(format!("cpal:{}:{}:{}", host_id, index, name)), device)
            })
            .collect())
    }

    fn select_stream_config(
        device: &cpal::Device,
        desired: AudioConfig,
    ) -> Result<(StreamConfig, SampleFormat), AudioError> {
        let mut supported = device
            .supported_input_configs()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        let chosen = select_supported_config(&mut supported, desired)?;
        let sample_format = chosen.sample_format();
        let mut config = chosen.config();
        // Framing happens in the session, so let the backend pick its period.
        config.buffer_size = BufferSize::Default;

        Ok((config, sample_format))
    }
}

impl Default for CpalAudioInputPort {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the capture thread (and its `cpal::Stream`) alive until closed.
pub struct CpalAudioStreamHandle {
    stop_tx: mpsc::Sender<()>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl CpalAudioStreamHandle {
    fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            if handle.join().is_err() {
                tracing::error!("capture thread panicked");
            }
        }
    }
}

impl AudioStreamHandle for CpalAudioStreamHandle {
    fn close(mut self: Box<Self>) {
        self.shutdown();
    }
}

impl Drop for CpalAudioStreamHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl AudioInputPort for CpalAudioInputPort {
    fn list_inputs(&self) -> Result<Vec<AudioInputDevice>, AudioError> {
        let devices = Self::list_devices_from_host(&self.host)?;
        let mut results = Vec::new();

        for (id, device) in devices {
            let name = device.name().unwrap_or_else(|_| "Unknown Input".to_string());
            let default_config = match device.default_input_config() {
                Ok(config) => config,
                Err(err) => {
                    tracing::debug!(device = %id, error = %err, "skipping input without default config");
                    continue;
                }
            };

            results.push(AudioInputDevice {
                id,
                name,
                default_sample_rate_hz: default_config.sample_rate().0,
                default_channels: default_config.channels(),
            });
        }

        Ok(results)
    }

    fn default_input(&self) -> Result<DeviceId, AudioError> {
        let default = self
            .host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceNotFound("no default input".to_string()))?;
        let default_name = default
            .name()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        Self::list_devices_from_host(&self.host)?
            .into_iter()
            .find(|(_, device)| device.name().ok().as_deref() == Some(default_name.as_str()))
            .map(|(id, _)| id)
            .ok_or(AudioError::DeviceNotFound(default_name))
    }

    fn open_input(
        &self,
        device_id: &DeviceId,
        config: AudioConfig,
        cb: Box<dyn AudioCaptureCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        let device_id = device_id.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        // cpal streams are not Send on every platform, so the stream is built
        // and dropped on its own thread.
        let join_handle = thread::spawn(move || {
            let host = cpal::default_host();
            let devices = match Self::list_devices_from_host(&host) {
                Ok(list) => list,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            let Some((_, device)) = devices.into_iter().find(|(id, _)| id == &device_id) else {
                let _ = ready_tx.send(Err(AudioError::DeviceNotFound(device_id.to_string())));
                return;
            };

            let (stream_config, sample_format) = match Self::select_stream_config(&device, config) {
                Ok(selected) => selected,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            tracing::info!(
                device = %device_id,
                sample_rate_hz = stream_config.sample_rate.0,
                channels = stream_config.channels,
                format = ?sample_format,
                "opening capture stream"
            );

            let stream = match sample_format {
                SampleFormat::F32 => build_capture_stream::<f32>(&device, &stream_config, cb),
                SampleFormat::I16 => build_capture_stream::<i16>(&device, &stream_config, cb),
                SampleFormat::U16 => build_capture_stream::<u16>(&device, &stream_config, cb),
                _ => Err(cpal::BuildStreamError::StreamConfigNotSupported),
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = ready_tx.send(Err(AudioError::Backend(err.to_string())));
                    return;
                }
            };

            if let Err(err) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::Backend(err.to_string())));
                return;
            }

            let _ = ready_tx.send(Ok(()));
            let _ = stop_rx.recv();
            drop(stream);
            tracing::debug!(device = %device_id, "capture stream closed");
        });

        match ready_rx
            .recv()
            .map_err(|e| AudioError::Backend(e.to_string()))?
        {
            Ok(()) => Ok(Box::new(CpalAudioStreamHandle {
                stop_tx,
                join_handle: Some(join_handle),
            })),
            Err(err) => {
                let _ = join_handle.join();
                Err(err)
            }
        }
    }
}

fn build_capture_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut cb: Box<dyn AudioCaptureCallback>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels).max(1);
    let mut mono: Vec<f32> = vec![0.0; INITIAL_SCRATCH_FRAMES];
    let mut sample_time: u64 = 0;

    device.build_input_stream(
        config,
        move |data: &[T], _info: &cpal::InputCallbackInfo| {
            let frames = data.len() / channels;
            if frames > mono.len() {
                mono.resize(frames, 0.0);
            }
            first_channel_into(data, channels, &mut mono[..frames]);
            cb.capture(sample_time, &mono[..frames]);
            sample_time = sample_time.saturating_add(frames as u64);
        },
        |err| tracing::error!(error = %err, "cpal capture stream error"),
        None,
    )
}

/// Copies channel 0 of an interleaved buffer into `out`.
fn first_channel_into<T>(data: &[T], channels: usize, out: &mut [f32])
where
    T: SizedSample,
    f32: FromSample<T>,
{
    for (dst, frame) in out.iter_mut().zip(data.chunks_exact(channels)) {
        *dst = f32::from_sample_(frame[0]);
    }
}

/// Picks the best format at the desired rate. Exact channel matches win; a
/// device that only offers more channels is still usable since capture keeps
/// channel 0.
fn select_supported_config(
    supported: &mut dyn Iterator<Item = SupportedStreamConfigRange>,
    desired: AudioConfig,
) -> Result<cpal::SupportedStreamConfig, AudioError> {
    let mut best: Option<cpal::SupportedStreamConfig> = None;
    let mut best_score: i32 = -1;

    for config_range in supported {
        if config_range.channels() == 0 {
            continue;
        }
        let min = config_range.min_sample_rate().0;
        let max = config_range.max_sample_rate().0;
        if desired.sample_rate_hz < min || desired.sample_rate_hz > max {
            continue;
        }

        let format_score = match config_range.sample_format() {
            SampleFormat::F32 => 3,
            SampleFormat::I16 => 2,
            SampleFormat::U16 => 1,
            _ => continue,
        };
        let channel_score = if config_range.channels() == desired.channels {
            10
        } else {
            0
        };
        let score = format_score + channel_score;

        if score > best_score {
            best = Some(config_range.with_sample_rate(SampleRate(desired.sample_rate_hz)));
            best_score = score;
        }
    }

    best.ok_or_else(|| {
        AudioError::UnsupportedConfig(format!(
            "no input format at {} Hz",
            desired.sample_rate_hz
        ))
    })
}
