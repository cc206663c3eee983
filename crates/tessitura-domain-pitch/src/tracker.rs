use crate::dsp::{hz_to_midi, median_in_place, rms};
use serde::{Deserialize, Serialize};
use tessitura_ports::types::NoteTrackingConfig;

const NOISE_FLOOR_ALPHA: f32 = 0.02;
const MIN_VOICING_RMS: f32 = 0.003;

/// A finalized sung note.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserNote {
    pub start_s: f64,
    pub end_s: f64,
    /// Median of the pitch samples observed while the note was voiced.
    pub midi: f64,
}

impl UserNote {
    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }
}

#[derive(Debug)]
struct ActiveNote {
    start_s: f64,
    last_voiced_s: f64,
    midi_samples: Vec<f64>,
}

#[derive(Debug)]
enum TrackerState {
    Idle,
    Active(ActiveNote),
}

/// Segments a per-frame pitch stream into notes.
///
/// A frame is voiced when it has a pitch and its RMS clears an adaptive
/// threshold above the running noise floor. A note opens on the first voiced
/// frame and closes once no voiced frame has been seen for `release_s`.
pub struct NoteTracker {
    config: NoteTrackingConfig,
    noise_floor: f32,
    state: TrackerState,
    /// Recycled sample storage so a new note does not allocate.
    spare_samples: Vec<f64>,
}

impl NoteTracker {
    pub fn new(config: NoteTrackingConfig) -> Self {
        Self {
            config,
            noise_floor: 0.0,
            state: TrackerState::Idle,
            spare_samples: Vec::with_capacity(256),
        }
    }

    pub fn config(&self) -> &NoteTrackingConfig {
        &self.config
    }

    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, TrackerState::Active(_))
    }

    pub fn process(&mut self, time_s: f64, frame: &[f32], pitch_hz: Option<f32>) -> Option<UserNote> {
        let frame_rms = rms(frame);
        self.update_noise_floor(frame_rms);
        let threshold = (self.noise_floor * self.config.energy_multiplier).max(MIN_VOICING_RMS);

        let midi = pitch_hz.and_then(hz_to_midi);
        let voiced_midi = midi.filter(|_| frame_rms >= threshold);

        match voiced_midi {
            Some(midi) => {
                self.on_voiced(time_s, midi);
                None
            }
            None => {
                let release_due = matches!(
                    &self.state,
                    TrackerState::Active(active) if time_s - active.last_voiced_s >= self.config.release_s
                );
                if release_due {
                    self.finalize()
                } else {
                    None
                }
            }
        }
    }

    /// End of stream: closes any open note without waiting for the release.
    pub fn flush(&mut self) -> Option<UserNote> {
        self.finalize()
    }

    fn finalize(&mut self) -> Option<UserNote> {
        let TrackerState::Active(mut active) = std::mem::replace(&mut self.state, TrackerState::Idle)
        else {
            return None;
        };

        let duration = active.last_voiced_s - active.start_s;
        let note = if duration < self.config.min_note_s {
            None
        } else {
            median_in_place(&mut active.midi_samples).map(|midi| UserNote {
                start_s: active.start_s,
                end_s: active.last_voiced_s,
                midi,
            })
        };

        active.midi_samples.clear();
        self.spare_samples = active.midi_samples;
        note
    }

    fn on_voiced(&mut self, time_s: f64, midi: f64) {
        match &mut self.state {
            TrackerState::Active(active) => {
                active.last_voiced_s = time_s;
                active.midi_samples.push(midi);
            }
            TrackerState::Idle => {
                let mut midi_samples = std::mem::take(&mut self.spare_samples);
                midi_samples.push(midi);
                self.state = TrackerState::Active(ActiveNote {
                    start_s: time_s,
                    last_voiced_s: time_s,
                    midi_samples,
                });
            }
        }
    }

    fn update_noise_floor(&mut self, frame_rms: f32) {
        if self.noise_floor == 0.0 {
            self.noise_floor = frame_rms;
            return;
        }
        self.noise_floor = (1.0 - NOISE_FLOOR_ALPHA) * self.noise_floor + NOISE_FLOOR_ALPHA * frame_rms;
    }
}
