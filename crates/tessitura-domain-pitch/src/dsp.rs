use std::f32::consts::PI;

const A4_HZ: f64 = 440.0;
const A4_MIDI: f64 = 69.0;

/// Root-mean-square level of a frame, 0 for an empty frame.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / frame.len() as f64).sqrt() as f32
}

pub fn hz_to_midi(hz: f32) -> Option<f64> {
    if !hz.is_finite() || hz <= 0.0 {
        return None;
    }
    Some(A4_MIDI + 12.0 * (hz as f64 / A4_HZ).log2())
}

pub fn midi_to_hz(midi: f64) -> f32 {
    (A4_HZ * 2f64.powf((midi - A4_MIDI) / 12.0)) as f32
}

/// Symmetric Hann window, same shape as `numpy.hanning`.
pub fn hann_window(len: usize) -> Vec<f32> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (len - 1) as f32;
            (0..len)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / denom).cos())
                .collect()
        }
    }
}

/// Median of the values, sorting them in place. Even counts average the two
/// middle values.
pub fn median_in_place(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) * 0.5)
    }
}
