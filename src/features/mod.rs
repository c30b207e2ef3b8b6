mod baseline;
mod calibrated;
pub mod pitch;
pub mod schema;
mod spectral;
mod spectrogram;
mod statistics;

use std::fmt::{Display, Formatter};
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub use baseline::BaselineExtractor;
pub use calibrated::CalibratedExtractor;
pub use pitch::{track_pitch, PitchRange, PitchTrack};
pub use schema::{
    vectorize, vectorize_strict, FeatureMap, FeatureSchema, SchemaPolicy, BASELINE_FEATURES,
    CALIBRATED_FEATURES,
};

use crate::audio::{decoder, window};
use crate::error::Result;
use crate::types::{AudioData, ExtractionParams};

/// Turns a waveform into a named set of acoustic statistics.
pub trait FeatureExtractor {
    fn variant(&self) -> Variant;

    fn params(&self) -> &ExtractionParams;

    /// Features of a waveform already brought to the analysis sample rate
    /// and window by [`window::prepare_waveform`]. Never fails.
    fn extract_prepared(&self, waveform: &AudioData) -> FeatureMap;

    fn extract(&self, audio: &AudioData) -> Result<FeatureMap> {
        let waveform = window::prepare_waveform(audio, self.params())?;
        Ok(self.extract_prepared(&waveform))
    }

    fn extract_file(&self, path: &Path) -> Result<FeatureMap> {
        let audio = decoder::decode_audio(path)?;
        self.extract(&audio)
    }

    fn schema(&self) -> FeatureSchema {
        self.variant().schema()
    }
}

/// Which extraction strategy to run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Raw Hz statistics over the spectral-centroid series
    #[default]
    Baseline,
    /// Statistics rescaled and clamped to the original dataset's ranges
    Calibrated,
}

impl Variant {
    pub fn name(self) -> &'static str {
        match self {
            Variant::Baseline => "baseline",
            Variant::Calibrated => "calibrated",
        }
    }

    pub fn schema(self) -> FeatureSchema {
        match self {
            Variant::Baseline => FeatureSchema::baseline(),
            Variant::Calibrated => FeatureSchema::calibrated(),
        }
    }

    pub fn extractor(self, params: ExtractionParams) -> Box<dyn FeatureExtractor> {
        match self {
            Variant::Baseline => Box::new(BaselineExtractor::new(params)),
            Variant::Calibrated => Box::new(CalibratedExtractor::new(params)),
        }
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Decode `path` and extract the `variant` feature set from it.
pub fn extract_features_from_file(
    path: &Path,
    variant: Variant,
    params: ExtractionParams,
) -> Result<FeatureMap> {
    variant.extractor(params).extract_file(path)
}
