use tracing::debug;

use crate::audio::resample;
use crate::error::{Result, VoiceError};
use crate::types::{AudioData, ExtractionParams};

/// Bring decoded audio into the shape the extractors analyse: cut to
/// `[offset, offset + duration)`, non-finite samples zeroed, resampled to the
/// target rate, and short clips zero padded to `min_samples`.
pub fn prepare_waveform(audio: &AudioData, params: &ExtractionParams) -> Result<AudioData> {
    params.validate()?;
    if audio.sample_rate == 0 {
        return Err(VoiceError::InvalidParams(
            "decoded audio has a zero sample rate".to_string(),
        ));
    }

    let end = params.duration.map(|duration| params.offset + duration);
    let mut window = trim_audio_segment(audio, params.offset, end).samples;
    window.iter_mut().for_each(|s| {
        if !s.is_finite() {
            *s = 0.0;
        }
    });

    let mut samples = resample::resample(&window, audio.sample_rate, params.sample_rate)?;
    let trimmed_len = samples.len();
    if samples.len() < params.min_samples {
        samples.resize(params.min_samples, 0.0);
    }

    debug!(
        source_rate = audio.sample_rate,
        source_samples = audio.samples.len(),
        trimmed_len,
        analysed_len = samples.len(),
        "prepared waveform"
    );

    Ok(AudioData::new(samples, params.sample_rate))
}

/// Cut `audio` to the given time range; `None` runs to the end of the clip.
/// Ranges beyond the clip are clamped, yielding an empty clip if needed.
pub fn trim_audio_segment(
    audio: &AudioData,
    start_seconds: f64,
    end_seconds: Option<f64>,
) -> AudioData {
    let sr = audio.sample_rate as f64;
    let total_samples = audio.samples.len();

    let start_index = ((start_seconds * sr).floor().max(0.0)) as usize;
    let start_index = start_index.min(total_samples);
    let end_index = match end_seconds {
        Some(end) => ((end * sr).round().max(start_index as f64)) as usize,
        None => total_samples,
    };
    let end_index = end_index.min(total_samples);

    AudioData::new(
        audio.samples[start_index..end_index].to_vec(),
        audio.sample_rate,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize, sample_rate: u32) -> AudioData {
        AudioData::new((0..len).map(|i| i as f32 / len as f32).collect(), sample_rate)
    }

    #[test]
    fn trims_to_offset_and_duration() {
        let audio = ramp(22_050 * 4, 22_050);
        let params = ExtractionParams {
            offset: 1.0,
            duration: Some(2.0),
            ..ExtractionParams::default()
        };
        let prepared = prepare_waveform(&audio, &params).unwrap();
        assert_eq!(prepared.samples.len(), 44_100);
        assert_eq!(prepared.samples[0], audio.samples[22_050]);
    }

    #[test]
    fn open_ended_duration_keeps_remaining_clip() {
        let audio = ramp(22_050 * 5, 22_050);
        let params = ExtractionParams {
            offset: 0.5,
            duration: None,
            ..ExtractionParams::default()
        };
        let prepared = prepare_waveform(&audio, &params).unwrap();
        assert_eq!(prepared.samples.len(), 22_050 * 5 - 11_025);
    }

    #[test]
    fn pads_short_clips_with_zeros() {
        let audio = AudioData::new(vec![0.25; 100], 22_050);
        let prepared = prepare_waveform(&audio, &ExtractionParams::default()).unwrap();
        assert_eq!(prepared.samples.len(), 1024);
        assert_eq!(prepared.samples[99], 0.25);
        assert!(prepared.samples[100..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn offset_past_end_yields_padded_silence() {
        let audio = AudioData::new(vec![0.5; 2_000], 22_050);
        let params = ExtractionParams {
            offset: 10.0,
            ..ExtractionParams::default()
        };
        let prepared = prepare_waveform(&audio, &params).unwrap();
        assert_eq!(prepared.samples.len(), params.min_samples);
        assert!(prepared.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn replaces_non_finite_samples() {
        let audio = AudioData::new(vec![f32::NAN, 0.5, f32::INFINITY], 22_050);
        let prepared = prepare_waveform(&audio, &ExtractionParams::default()).unwrap();
        assert_eq!(&prepared.samples[..3], &[0.0, 0.5, 0.0]);
    }

    #[test]
    fn zero_source_rate_is_invalid() {
        let audio = AudioData::new(vec![0.1; 100], 0);
        let err = prepare_waveform(&audio, &ExtractionParams::default()).unwrap_err();
        assert!(matches!(err, VoiceError::InvalidParams(_)));
    }

    #[test]
    fn high_rate_input_is_band_limited_before_analysis() {
        let audio = AudioData::new(
            (0..44_100)
                .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 15_000.0 * i as f32 / 44_100.0).sin())
                .collect(),
            44_100,
        );
        let prepared = prepare_waveform(&audio, &ExtractionParams::default()).unwrap();
        let interior = &prepared.samples[1_000..21_000];
        let peak = interior.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        assert!(peak < 0.02, "aliased peak {peak}");
    }

    #[test]
    fn resamples_to_target_rate() {
        let audio = AudioData::new(vec![0.1; 44_100], 44_100);
        let prepared = prepare_waveform(&audio, &ExtractionParams::default()).unwrap();
        assert_eq!(prepared.sample_rate, 22_050);
        assert_eq!(prepared.samples.len(), 22_050);
    }
}
