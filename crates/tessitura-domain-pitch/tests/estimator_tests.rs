use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use std::f32::consts::PI;
use tessitura_domain_pitch::{PitchEstimate, PitchEstimator, PitchEstimatorConfig};

const SAMPLE_RATE: u32 = 44_100;

fn config() -> PitchEstimatorConfig {
    PitchEstimatorConfig {
        sample_rate_hz: SAMPLE_RATE,
        min_freq_hz: 80.0,
        max_freq_hz: 900.0,
        corr_threshold: 0.35,
    }
}

fn sine(freq_hz: f32, len: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (2.0 * PI * freq_hz * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

/// Deterministic white-ish noise in [-amplitude, amplitude].
fn noise(len: usize, amplitude: f32, mut seed: u32) -> Vec<f32> {
    (0..len)
        .map(|_| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((seed >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * amplitude
        })
        .collect()
}

fn assert_within_percent(hz: Option<f32>, expected: f32, percent: f32) {
    let hz = hz.expect("expected a pitch");
    let error = (hz - expected).abs() / expected * 100.0;
    assert!(error <= percent, "{hz} Hz is {error:.2}% away from {expected} Hz");
}

#[test]
fn sine_440_in_1024_frame_is_detected() {
    let mut estimator = PitchEstimator::new(config());
    let estimate = estimator.estimate(&sine(440.0, 1024, 0.5));

    assert_within_percent(estimate.hz, 440.0, 1.0);
    assert!(estimate.confidence > 0.35);
    assert!(estimate.confidence <= 1.0 + 1e-4);
}

#[test]
fn sine_220_in_2048_frame_is_detected() {
    let mut estimator = PitchEstimator::with_frame_len(config(), 2048);
    let estimate = estimator.estimate(&sine(220.0, 2048, 0.5));

    assert_within_percent(estimate.hz, 220.0, 1.0);
    assert!(estimate.confidence > 0.35);
}

#[test]
fn sine_220_in_1024_frame_stays_close() {
    let mut estimator = PitchEstimator::new(config());
    let estimate = estimator.estimate(&sine(220.0, 1024, 0.5));

    // Fewer than five periods fit the window, the Hann taper biases the lag.
    assert_within_percent(estimate.hz, 220.0, 2.0);
}

#[test]
fn silence_and_empty_frames_are_unvoiced() {
    let mut estimator = PitchEstimator::new(config());

    assert_eq!(estimator.estimate(&[0.0; 1024]), PitchEstimate::UNVOICED);
    assert_eq!(estimator.estimate(&[]), PitchEstimate::UNVOICED);
    assert_eq!(estimator.estimate(&sine(220.0, 1024, 1e-5)), PitchEstimate::UNVOICED);
    assert_eq!(estimator.estimate(&[0.25; 1024]), PitchEstimate::UNVOICED);
}

#[test]
fn frame_too_short_for_search_window_is_unvoiced() {
    let mut estimator = PitchEstimator::new(config());
    // 64 samples only give 32 lags, below the 49-sample lag of 900 Hz.
    assert_eq!(estimator.estimate(&sine(440.0, 64, 0.5)), PitchEstimate::UNVOICED);
}

#[test]
fn noise_is_rejected_but_reports_confidence() {
    let mut estimator = PitchEstimator::new(config());
    let estimate = estimator.estimate(&noise(1024, 0.3, 7));

    assert!(estimate.hz.is_none());
    assert!(estimate.confidence < 0.35);
}

#[test]
fn peak_below_threshold_keeps_confidence() {
    let strict = PitchEstimatorConfig {
        corr_threshold: 0.99,
        ..config()
    };
    let mut estimator = PitchEstimator::new(strict);
    let estimate = estimator.estimate(&sine(440.0, 1024, 0.5));

    assert!(estimate.hz.is_none());
    assert!(estimate.confidence > 0.35 && estimate.confidence < 0.99);
}

#[test]
fn dc_offset_does_not_change_the_estimate() {
    let mut estimator = PitchEstimator::new(config());
    let clean = estimator.estimate(&sine(330.0, 1024, 0.3));
    let shifted: Vec<f32> = sine(330.0, 1024, 0.3).iter().map(|s| s + 0.6).collect();
    let offset = estimator.estimate(&shifted);

    assert_abs_diff_eq!(clean.hz.unwrap(), offset.hz.unwrap(), epsilon = 0.5);
    assert_abs_diff_eq!(clean.confidence, offset.confidence, epsilon = 1e-3);
}

#[test]
fn estimate_is_repeatable_across_frame_lengths() {
    let mut estimator = PitchEstimator::new(config());
    let frame = sine(300.0, 1024, 0.4);

    let first = estimator.estimate(&frame);
    let _ = estimator.estimate(&sine(300.0, 2048, 0.4));
    let second = estimator.estimate(&frame);
    let fresh = PitchEstimator::new(config()).estimate(&frame);

    assert_eq!(first, second);
    assert_eq!(first, fresh);
}

#[test]
fn unusable_frequency_band_is_unvoiced_instead_of_panicking() {
    let frame = sine(220.0, 1024, 0.5);
    let bad_configs = [
        PitchEstimatorConfig {
            max_freq_hz: 0.0,
            ..config()
        },
        PitchEstimatorConfig {
            min_freq_hz: -80.0,
            ..config()
        },
        PitchEstimatorConfig {
            max_freq_hz: f32::NAN,
            ..config()
        },
        PitchEstimatorConfig {
            min_freq_hz: f32::INFINITY,
            ..config()
        },
        PitchEstimatorConfig {
            sample_rate_hz: 0,
            ..config()
        },
        PitchEstimatorConfig {
            min_freq_hz: 900.0,
            max_freq_hz: 80.0,
            ..config()
        },
    ];

    for bad in bad_configs {
        let mut estimator = PitchEstimator::new(bad);
        assert_eq!(estimator.estimate(&frame), PitchEstimate::UNVOICED, "{bad:?}");
    }
}
