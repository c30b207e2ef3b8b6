use aus::spectrum;
use aus::WindowType;
use ndarray::{Array1, Array2, Axis};

/// Magnitude STFT of a prepared waveform, one row per analysis frame.
pub(crate) struct Spectrogram {
    /// `frames × bins`
    pub magnitude: Array2<f64>,
    /// Centre frequency of each bin in Hz
    pub frequencies: Vec<f64>,
}

impl Spectrogram {
    /// Frames are centred: the signal is zero padded by half a window on
    /// both sides so the first frame is centred on the first sample.
    pub fn compute(samples: &[f32], sample_rate: u32, fft_size: usize, hop_length: usize) -> Self {
        let pad = fft_size / 2;
        let mut padded = vec![0.0_f64; (samples.len() + 2 * pad).max(fft_size)];
        for (dst, &src) in padded[pad..].iter_mut().zip(samples) {
            *dst = src as f64;
        }

        let stft = spectrum::rstft(&padded, fft_size, hop_length, WindowType::Hanning);
        let (magnitude, _phase) = spectrum::complex_to_polar_rstft(&stft);
        let frequencies = spectrum::rfftfreq(fft_size, sample_rate);

        Self {
            magnitude: frames_to_array(&magnitude, frequencies.len()),
            frequencies,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.magnitude.len_of(Axis(0))
    }

    /// Magnitude of each bin averaged over all frames.
    pub fn average_spectrum(&self) -> Array1<f64> {
        self.magnitude
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.frequencies.len()))
    }
}

fn frames_to_array(frames: &[Vec<f64>], bins: usize) -> Array2<f64> {
    Array2::from_shape_fn((frames.len(), bins), |(frame, bin)| {
        frames[frame]
            .get(bin)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    })
}
