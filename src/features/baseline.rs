use tracing::debug;

use super::pitch::{track_pitch, PitchRange};
use super::schema::FeatureMap;
use super::spectral::{peak_frequency, spectral_entropy, SpectralSeries};
use super::spectrogram::Spectrogram;
use super::statistics as stats;
use super::{FeatureExtractor, Variant};
use crate::types::{AudioData, ExtractionParams};

/// Frequency statistics taken over the per-frame centroid series, in Hz,
/// with pitch searched over 50–500 Hz. Empty series give 0.0.
#[derive(Debug, Clone, Default)]
pub struct BaselineExtractor {
    params: ExtractionParams,
}

impl BaselineExtractor {
    pub fn new(params: ExtractionParams) -> Self {
        Self { params }
    }
}

impl FeatureExtractor for BaselineExtractor {
    fn variant(&self) -> Variant {
        Variant::Baseline
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
        let pitch = track_pitch(waveform, PitchRange::BROAD);

        debug!(
            frames = spectrogram.frame_count(),
            voiced = pitch.f0().len(),
            mean_rolloff = stats::mean(&series.rolloff),
            "baseline spectral analysis"
        );

        let centroid = &series.centroid;
        let f0 = pitch.f0();
        let q25 = stats::quantile(centroid, 0.25);
        let q75 = stats::quantile(centroid, 0.75);
        let mindom = stats::min(centroid);
        let maxdom = stats::max(centroid);

        FeatureMap::from_iter([
            ("meanfreq", stats::mean(centroid)),
            ("sd", stats::std_dev(centroid)),
            ("median", stats::median(centroid)),
            ("Q25", q25),
            ("Q75", q75),
            ("IQR", q75 - q25),
            ("skew", stats::skewness(centroid)),
            ("kurt", stats::excess_kurtosis(centroid)),
            ("sp_ent", spectral_entropy(&spectrogram)),
            ("sfm", stats::mean(&series.flatness)),
            ("centroid", stats::mean(centroid)),
            ("peakf", peak_frequency(&spectrogram)),
            ("meanfun", stats::mean(f0)),
            ("minfun", stats::min(f0)),
            ("maxfun", stats::max(f0)),
            // The centroid doubles as the dominant-frequency proxy.
            ("meandom", stats::mean(centroid)),
            ("mindom", mindom),
            ("maxdom", maxdom),
            ("dfrange", maxdom - mindom),
            ("modindx", stats::coefficient_of_variation(f0)),
        ])
    }
}
