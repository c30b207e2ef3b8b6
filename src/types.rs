//! Core types for the voxgender extraction pipeline

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoiceError};

pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;
pub const DEFAULT_DURATION_SECS: f64 = 3.0;
pub const DEFAULT_MIN_SAMPLES: usize = 1024;
pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_HOP_LENGTH: usize = 512;

/// Raw audio data representation (mono, f32 samples)
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples, normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g., 22050)
    pub sample_rate: u32,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Parameters controlling how a clip is windowed and analysed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractionParams {
    /// Target sample rate the clip is resampled to before analysis
    pub sample_rate: u32,
    /// Analysis window length in seconds; `None` keeps the rest of the clip
    pub duration: Option<f64>,
    /// Start of the analysis window in seconds
    pub offset: f64,
    /// Clips shorter than this are zero padded
    pub min_samples: usize,
    pub fft_size: usize,
    pub hop_length: usize,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            duration: Some(DEFAULT_DURATION_SECS),
            offset: 0.0,
            min_samples: DEFAULT_MIN_SAMPLES,
            fft_size: DEFAULT_FFT_SIZE,
            hop_length: DEFAULT_HOP_LENGTH,
        }
    }
}

impl ExtractionParams {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("sample rate must be positive"));
        }
        if self.fft_size < 2 {
            return Err(invalid(format!(
                "fft size must be at least 2, got {}",
                self.fft_size
            )));
        }
        if self.hop_length == 0 {
            return Err(invalid("hop length must be positive"));
        }
        if !self.offset.is_finite() || self.offset < 0.0 {
            return Err(invalid(format!(
                "offset must be non-negative, got {}",
                self.offset
            )));
        }
        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(invalid(format!(
                    "duration must be positive, got {}",
                    duration
                )));
            }
        }
        Ok(())
    }

    /// Nyquist frequency of the analysis sample rate.
    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }
}

fn invalid(message: impl Into<String>) -> VoiceError {
    VoiceError::InvalidParams(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = ExtractionParams::default();
        params.validate().unwrap();
        assert_eq!(params.sample_rate, 22_050);
        assert_eq!(params.duration, Some(3.0));
        assert_eq!(params.nyquist(), 11_025.0);
    }

    #[test]
    fn rejects_zero_hop_and_negative_offset() {
        let params = ExtractionParams {
            hop_length: 0,
            ..ExtractionParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(VoiceError::InvalidParams(_))
        ));

        let params = ExtractionParams {
            offset: -1.0,
            ..ExtractionParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_duration() {
        let params = ExtractionParams {
            duration: Some(0.0),
            ..ExtractionParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn reports_clip_duration() {
        let audio = AudioData::new(vec![0.0; 11_025], 22_050);
        assert!((audio.duration_secs() - 0.5).abs() < 1e-12);
    }
}
