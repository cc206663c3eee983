use crate::dsp::hann_window;
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessitura_ports::types::AudioConfig;

const SILENCE_PEAK: f32 = 1e-4;
const DEGENERATE_ENERGY: f32 = 1e-9;
const MIN_PARABOLA_DENOM: f32 = 1e-6;

/// Result for one frame. `hz` is `None` when the frame carries no usable pitch;
/// `confidence` is the normalized autocorrelation peak (0 when never computed).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    pub hz: Option<f32>,
    pub confidence: f32,
}

impl PitchEstimate {
    pub const UNVOICED: Self = Self {
        hz: None,
        confidence: 0.0,
    };

    pub fn is_voiced(&self) -> bool {
        self.hz.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PitchEstimatorConfig {
    pub sample_rate_hz: u32,
    pub min_freq_hz: f32,
    pub max_freq_hz: f32,
    pub corr_threshold: f32,
}

impl From<&AudioConfig> for PitchEstimatorConfig {
    fn from(audio: &AudioConfig) -> Self {
        Self {
            sample_rate_hz: audio.sample_rate_hz,
            min_freq_hz: audio.min_freq_hz,
            max_freq_hz: audio.max_freq_hz,
            corr_threshold: audio.corr_threshold,
        }
    }
}

/// FFT plans and scratch buffers for one frame length.
struct FramePlan {
    len: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    window: Vec<f32>,
    time: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    corr: Vec<f32>,
}

impl FramePlan {
    fn new(planner: &mut RealFftPlanner<f32>, len: usize) -> Self {
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let time = forward.make_input_vec();
        let spectrum = forward.make_output_vec();
        let corr = inverse.make_output_vec();
        Self {
            len,
            forward,
            inverse,
            window: hann_window(len),
            time,
            spectrum,
            corr,
        }
    }
}

/// Autocorrelation pitch estimator.
///
/// The autocorrelation is computed through the power spectrum (Wiener–Khinchin),
/// normalized by its zero-lag value, searched for the strongest lag between the
/// configured frequency bounds and refined with a three-point parabola.
///
/// Output depends only on the frame and the configuration. Plans and scratch
/// buffers are kept for the last seen frame length so that steady-state calls
/// do not allocate.
pub struct PitchEstimator {
    config: PitchEstimatorConfig,
    planner: RealFftPlanner<f32>,
    plan: Option<FramePlan>,
}

impl PitchEstimator {
    pub fn new(config: PitchEstimatorConfig) -> Self {
        Self {
            config,
            planner: RealFftPlanner::new(),
            plan: None,
        }
    }

    /// Builds the estimator with plans ready for `frame_len`, so the first
    /// frame on the audio path does not pay for planning.
    pub fn with_frame_len(config: PitchEstimatorConfig, frame_len: usize) -> Self {
        let mut estimator = Self::new(config);
        if frame_len > 0 {
            estimator.ensure_plan(frame_len);
        }
        estimator
    }

    pub fn config(&self) -> &PitchEstimatorConfig {
        &self.config
    }

    pub fn estimate(&mut self, frame: &[f32]) -> PitchEstimate {
        let len = frame.len();
        if len == 0 {
            return PitchEstimate::UNVOICED;
        }

        let mean = frame.iter().sum::<f32>() / len as f32;
        let peak = frame
            .iter()
            .fold(0.0_f32, |acc, &sample| acc.max((sample - mean).abs()));
        if peak < SILENCE_PEAK {
            return PitchEstimate::UNVOICED;
        }

        // Lags kept from the circular autocorrelation.
        let corr_len = len / 2;
        let sample_rate = self.config.sample_rate_hz as f32;
        let Some((min_lag, max_lag)) = self.lag_range(corr_len) else {
            return PitchEstimate::UNVOICED;
        };

        let threshold = self.config.corr_threshold;
        self.ensure_plan(len);
        let Some(plan) = self.plan.as_mut() else {
            return PitchEstimate::UNVOICED;
        };

        for ((dst, &sample), &w) in plan.time.iter_mut().zip(frame).zip(&plan.window) {
            *dst = (sample - mean) * w;
        }
        if plan.forward.process(&mut plan.time, &mut plan.spectrum).is_err() {
            return PitchEstimate::UNVOICED;
        }
        for bin in plan.spectrum.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }
        if plan.inverse.process(&mut plan.spectrum, &mut plan.corr).is_err() {
            return PitchEstimate::UNVOICED;
        }

        let corr = &mut plan.corr[..corr_len];
        // realfft leaves the inverse unscaled.
        let zero_lag = corr[0] / len as f32;
        if zero_lag <= DEGENERATE_ENERGY {
            return PitchEstimate::UNVOICED;
        }
        let norm = corr[0];
        for value in corr.iter_mut() {
            *value /= norm;
        }

        let (lag, confidence) = strongest_lag(corr, min_lag, max_lag);
        if confidence < threshold {
            return PitchEstimate {
                hz: None,
                confidence,
            };
        }

        let refined = refine_lag(corr, lag);
        let hz = (refined > 0.0).then(|| sample_rate / refined);
        PitchEstimate { hz, confidence }
    }

    /// Lag search window for a correlation of `corr_len` lags, `None` when the
    /// configured band leaves fewer than three lags to search.
    fn lag_range(&self, corr_len: usize) -> Option<(usize, usize)> {
        let PitchEstimatorConfig {
            sample_rate_hz,
            min_freq_hz,
            max_freq_hz,
            ..
        } = self.config;
        let usable = |hz: f32| hz.is_finite() && hz > 0.0;
        if sample_rate_hz == 0 || !usable(min_freq_hz) || !usable(max_freq_hz) {
            return None;
        }

        let sample_rate = sample_rate_hz as f32;
        let min_lag = (sample_rate / max_freq_hz) as usize;
        let max_lag = ((sample_rate / min_freq_hz) as usize).min(corr_len.saturating_sub(1));
        if max_lag <= min_lag.saturating_add(2) {
            return None;
        }
        Some((min_lag, max_lag))
    }

    fn ensure_plan(&mut self, len: usize) {
        if self.plan.as_ref().map_or(true, |plan| plan.len != len) {
            self.plan = Some(FramePlan::new(&mut self.planner, len));
        }
    }
}

/// First maximum of `corr[min_lag..max_lag]`.
fn strongest_lag(corr: &[f32], min_lag: usize, max_lag: usize) -> (usize, f32) {
    let mut best_lag = min_lag;
    let mut best = corr[min_lag];
    for (lag, &value) in corr.iter().enumerate().take(max_lag).skip(min_lag + 1) {
        if value > best {
            best = value;
            best_lag = lag;
        }
    }
    (best_lag, best)
}

fn refine_lag(corr: &[f32], lag: usize) -> f32 {
    if lag == 0 || lag + 1 >= corr.len() {
        return lag as f32;
    }
    let (y0, y1, y2) = (corr[lag - 1], corr[lag], corr[lag + 1]);
    let denom = 2.0 * (2.0 * y1 - y0 - y2);
    if denom.abs() > MIN_PARABOLA_DENOM {
        lag as f32 + (y0 - y2) / denom
    } else {
        lag as f32
    }
}
