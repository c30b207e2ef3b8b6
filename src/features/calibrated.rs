use tracing::debug;

use super::pitch::{track_pitch, PitchRange};
use super::schema::FeatureMap;
use super::spectral::{spectral_entropy, SpectralSeries};
use super::spectrogram::Spectrogram;
use super::statistics as stats;
use super::{FeatureExtractor, Variant};
use crate::types::{AudioData, ExtractionParams};

const F0_SCALE: f64 = 1.0 / 1000.0;
const SP_ENT_RANGE: (f64, f64) = (0.7, 1.0);
const MODINDX_CAP: f64 = 1.0;
const MEANDOM_RANGE: (f64, f64) = (0.005, 3.0);
const MINDOM_RANGE: (f64, f64) = (0.004, 0.5);
const MAXDOM_RANGE: (f64, f64) = (0.01, 22.0);

// Stand-ins used when no frame is voiced.
const UNVOICED_MEANFUN: f64 = 0.1;
const UNVOICED_MINFUN: f64 = 0.02;
const UNVOICED_MAXFUN: f64 = 0.25;
const UNVOICED_MODINDX: f64 = 0.1;

/// Features rescaled and clamped into the numeric ranges of the original
/// hand-engineered voice dataset.
///
/// Frequency statistics come from the frame-averaged magnitude spectrum
/// treated as a distribution over bin frequencies and are divided by the
/// Nyquist frequency. f0 values are in kHz, searched over 80–400 Hz.
#[derive(Debug, Clone, Default)]
pub struct CalibratedExtractor {
    params: ExtractionParams,
}

impl CalibratedExtractor {
    pub fn new(params: ExtractionParams) -> Self {
        Self { params }
    }
}

impl FeatureExtractor for CalibratedExtractor {
    fn variant(&self) -> Variant {
        Variant::Calibrated
    }

    fn params(&self) -> &ExtractionParams {
        &self.params
    }

    fn extract_prepared(&self, waveform: &AudioData) -> FeatureMap {
        let spectrogram = Spectrogram::compute(
            &waveform.samples,
            waveform.sample_rate,
            self.params.fft_size,
            self.params.hop_length,
        );
        let series = SpectralSeries::from_spectrogram(&spectrogram);
        let pitch = track_pitch(waveform, PitchRange::NARROW);

        debug!(
            frames = spectrogram.frame_count(),
            voiced = pitch.f0().len(),
            mean_bandwidth = stats::mean(&series.bandwidth),
            "calibrated spectral analysis"
        );

        let freqs = &spectrogram.frequencies;
        let distribution = normalized(spectrogram.average_spectrum().to_vec());
        let moments = stats::weighted_moments(freqs, &distribution);
        let at = |q: f64| {
            freqs
                .get(stats::cumulative_index(&distribution, q))
                .copied()
                .unwrap_or(0.0)
        };
        let (q25, median, q75) = (at(0.25), at(0.5), at(0.75));
        let mode = freqs
            .get(stats::argmax(&distribution))
            .copied()
            .unwrap_or(0.0);

        let nyquist = waveform.sample_rate as f64 / 2.0;
        let freq_scale = 1.0 / nyquist;
        let dom_scale = 20.0 / nyquist;

        let sp_ent = (0.7 + 0.3 * (spectral_entropy(&spectrogram) / 10.0))
            .clamp(SP_ENT_RANGE.0, SP_ENT_RANGE.1);
        let (meanfun, minfun, maxfun, modindx) = pitch_statistics(pitch.f0());

        let meandom = (moments.mean * dom_scale * 0.1).clamp(MEANDOM_RANGE.0, MEANDOM_RANGE.1);
        let mindom = (q25 * dom_scale * 0.1).clamp(MINDOM_RANGE.0, MINDOM_RANGE.1);
        let maxdom = (q75 * dom_scale * 0.5).clamp(MAXDOM_RANGE.0, MAXDOM_RANGE.1);
        let meanfreq = moments.mean * freq_scale;

        FeatureMap::from_iter([
            ("meanfreq", meanfreq),
            ("sd", moments.std_dev * freq_scale),
            ("median", median * freq_scale),
            ("Q25", q25 * freq_scale),
            ("Q75", q75 * freq_scale),
            ("IQR", (q75 - q25) * freq_scale),
            ("skew", moments.skewness),
            ("kurt", moments.kurtosis),
            ("sp.ent", sp_ent),
            ("sfm", stats::mean(&series.flatness)),
            ("mode", mode * freq_scale),
            ("centroid", meanfreq),
            ("meanfun", meanfun),
            ("minfun", minfun),
            ("maxfun", maxfun),
            ("meandom", meandom),
            ("mindom", mindom),
            ("maxdom", maxdom),
            ("dfrange", maxdom - mindom),
            ("modindx", modindx),
        ])
    }
}

/// Scale `values` to sum to one; an all-zero spectrum stays all zero.
fn normalized(mut values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter_mut().for_each(|v| *v /= total);
    }
    values
}

/// (meanfun, minfun, maxfun, modindx) in kHz, or the unvoiced stand-ins.
fn pitch_statistics(f0_hz: &[f64]) -> (f64, f64, f64, f64) {
    if f0_hz.is_empty() {
        return (
            UNVOICED_MEANFUN,
            UNVOICED_MINFUN,
            UNVOICED_MAXFUN,
            UNVOICED_MODINDX,
        );
    }
    let scaled: Vec<f64> = f0_hz.iter().map(|f| f * F0_SCALE).collect();
    let mean = stats::mean(&scaled);
    let modindx = if mean > 0.0 {
        stats::coefficient_of_variation(&scaled).min(MODINDX_CAP)
    } else {
        0.0
    };
    (mean, stats::min(&scaled), stats::max(&scaled), modindx)
}
