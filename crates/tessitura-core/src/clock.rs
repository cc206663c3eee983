const NUDGE_GAIN: f64 = 0.05;

/// Song time derived from captured sample counts.
///
/// Each frame is stamped with the time before it is advanced, so stamps are
/// strictly increasing and spaced exactly by the frame length. External
/// playback readings only pull the estimate a fraction of the way, never
/// jumping it.
#[derive(Clone, Debug)]
pub struct PlaybackClock {
    sample_rate_hz: u32,
    time_s: f64,
}

impl PlaybackClock {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            time_s: 0.0,
        }
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn now_s(&self) -> f64 {
        self.time_s
    }

    /// Returns the timestamp of a frame of `frames` samples and moves past it.
    /// A zero sample rate stamps every frame with the current time.
    pub fn advance(&mut self, frames: usize) -> f64 {
        let stamp = self.time_s;
        if self.sample_rate_hz > 0 {
            self.time_s += frames as f64 / self.sample_rate_hz as f64;
        }
        stamp
    }

    pub fn nudge(&mut self, external_s: f64) {
        if !external_s.is_finite() {
            return;
        }
        self.time_s += self.drift_s(external_s) * NUDGE_GAIN;
    }

    pub fn drift_s(&self, external_s: f64) -> f64 {
        external_s - self.time_s
    }
}
