use ndarray::{ArrayView1, Axis};

use super::spectrogram::Spectrogram;

const ROLLOFF_FRACTION: f64 = 0.85;
const FLATNESS_FLOOR: f64 = 1e-10;
const ENTROPY_EPSILON: f64 = 1e-12;

/// Per-frame spectral descriptors.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpectralSeries {
    pub centroid: Vec<f64>,
    pub flatness: Vec<f64>,
    pub rolloff: Vec<f64>,
    pub bandwidth: Vec<f64>,
}

impl SpectralSeries {
    pub fn from_spectrogram(spectrogram: &Spectrogram) -> Self {
        let freqs = &spectrogram.frequencies;
        let mut series = SpectralSeries::default();
        for frame in spectrogram.magnitude.axis_iter(Axis(0)) {
            let centroid = frame_centroid(frame, freqs);
            series.centroid.push(centroid);
            series.flatness.push(frame_flatness(frame));
            series.rolloff.push(frame_rolloff(frame, freqs));
            series.bandwidth.push(frame_bandwidth(frame, freqs, centroid));
        }
        series
    }
}

/// Σ f·S / Σ S; a frame without energy has centroid 0.
fn frame_centroid(frame: ArrayView1<f64>, freqs: &[f64]) -> f64 {
    let total = frame.sum();
    if total <= 0.0 {
        return 0.0;
    }
    frame.iter().zip(freqs).map(|(m, f)| m * f).sum::<f64>() / total
}

/// Geometric over arithmetic mean of the floored power spectrum.
fn frame_flatness(frame: ArrayView1<f64>) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let count = frame.len() as f64;
    let (log_sum, sum) = frame.iter().fold((0.0, 0.0), |(log_sum, sum), m| {
        let power = (m * m).max(FLATNESS_FLOOR);
        (log_sum + power.ln(), sum + power)
    });
    (log_sum / count).exp() / (sum / count)
}

/// Lowest frequency below which `ROLLOFF_FRACTION` of the magnitude lies.
fn frame_rolloff(frame: ArrayView1<f64>, freqs: &[f64]) -> f64 {
    let threshold = ROLLOFF_FRACTION * frame.sum();
    let mut cumulative = 0.0;
    for (m, f) in frame.iter().zip(freqs) {
        cumulative += m;
        if cumulative >= threshold {
            return *f;
        }
    }
    freqs.last().copied().unwrap_or(0.0)
}

/// Second-order spread of the frame around its centroid.
fn frame_bandwidth(frame: ArrayView1<f64>, freqs: &[f64], centroid: f64) -> f64 {
    let total = frame.sum();
    if total <= 0.0 {
        return 0.0;
    }
    let spread: f64 = frame
        .iter()
        .zip(freqs)
        .map(|(m, f)| (m / total) * (f - centroid).powi(2))
        .sum();
    spread.sqrt()
}

/// Mean over frames of the base-2 Shannon entropy of each frame's
/// normalized power spectrum.
pub(crate) fn spectral_entropy(spectrogram: &Spectrogram) -> f64 {
    let frames = spectrogram.frame_count();
    if frames == 0 {
        return 0.0;
    }
    let total: f64 = spectrogram
        .magnitude
        .axis_iter(Axis(0))
        .map(|frame| {
            let norm = frame.iter().map(|m| m * m).sum::<f64>() + ENTROPY_EPSILON;
            -frame
                .iter()
                .map(|m| {
                    let p = m * m / norm;
                    p * (p + ENTROPY_EPSILON).log2()
                })
                .sum::<f64>()
        })
        .sum();
    total / frames as f64
}

/// Frequency of the bin with the largest frame-averaged magnitude.
pub(crate) fn peak_frequency(spectrogram: &Spectrogram) -> f64 {
    let average = spectrogram.average_spectrum();
    let bin = super::statistics::argmax(&average.to_vec());
    spectrogram.frequencies.get(bin).copied().unwrap_or(0.0)
}
