use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::error::{Result, VoiceError};

const SINC_LEN: usize = 256;

/// Band-limited resampling of a mono clip from `source_rate` to `target_rate`.
///
/// Content above the lower Nyquist frequency is filtered out before the rate
/// change. The output holds `ceil(len · target / source)` samples aligned
/// with the input.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == 0 || target_rate == 0 {
        return Err(VoiceError::InvalidParams(format!(
            "cannot resample from {} Hz to {} Hz",
            source_rate, target_rate
        )));
    }
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let expected = ((samples.len() as f64) * ratio).ceil() as usize;

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    // Trailing zeros push the filter's delayed tail out in a single pass.
    let mut padded = Vec::with_capacity(samples.len() + SINC_LEN);
    padded.extend_from_slice(samples);
    padded.resize(samples.len() + SINC_LEN, 0.0);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, padded.len(), 1)
        .map_err(|err| VoiceError::Resample(err.to_string()))?;
    let delay = resampler.output_delay();
    let mut output = resampler
        .process(&[padded], None)
        .map_err(|err| VoiceError::Resample(err.to_string()))?
        .into_iter()
        .next()
        .unwrap_or_default();

    let start = delay.min(output.len());
    output.drain(..start);
    output.resize(expected, 0.0);

    debug!(
        source_rate,
        target_rate,
        input = samples.len(),
        output = output.len(),
        "resampled clip"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::resample;

    fn tone(frequency: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn output_length_follows_rate_ratio() {
        assert_eq!(resample(&vec![0.5; 480], 44_100, 22_050).unwrap().len(), 240);
        assert_eq!(resample(&vec![0.5; 100], 16_000, 22_050).unwrap().len(), 138);
    }

    #[test]
    fn constant_signal_survives_away_from_edges() {
        let resampled = resample(&vec![0.5; 8_000], 44_100, 22_050).unwrap();
        assert!(resampled[500..3_500]
            .iter()
            .all(|&sample| (sample - 0.5).abs() < 5e-3));
    }

    #[test]
    fn in_band_tone_keeps_its_level() {
        let input = tone(1_000.0, 44_100, 44_100);
        let resampled = resample(&input, 44_100, 22_050).unwrap();
        let level = rms(&resampled[1_000..21_000]);
        assert!((level - 0.5 / 2.0_f32.sqrt()).abs() < 0.01, "rms {level}");
    }

    #[test]
    fn tone_above_target_nyquist_is_removed() {
        let input = tone(15_000.0, 44_100, 44_100);
        let resampled = resample(&input, 44_100, 22_050).unwrap();
        let residual = rms(&resampled[1_000..21_000]);
        assert!(residual < 5e-3, "aliased residual {residual}");
    }

    #[test]
    fn rejects_zero_rates() {
        assert!(resample(&[0.1, 0.2], 0, 22_050).is_err());
        assert!(resample(&[0.1, 0.2], 22_050, 0).is_err());
    }
}
