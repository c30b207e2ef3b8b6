use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::features::{SchemaPolicy, Variant};
use crate::types::{ExtractionParams, DEFAULT_DURATION_SECS, DEFAULT_SAMPLE_RATE};

#[derive(Parser, Debug)]
#[command(name = "voxgender")]
#[command(version)]
#[command(about = "Voice gender feature extraction and classification", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the acoustic features of an audio file as JSON.
    Extract(ExtractArgs),
    /// Extract features from an audio file and classify them.
    Predict(PredictArgs),
    /// Classify a raw, already ordered feature vector.
    Classify(ClassifyArgs),
    /// Print the feature names of a variant, one per line.
    Schema(SchemaArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractionArgs {
    /// Feature extraction strategy.
    #[arg(long, value_enum, default_value_t = Variant::Baseline)]
    pub variant: Variant,
    /// Sample rate the clip is resampled to before analysis.
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,
    /// Seconds of audio to analyse.
    #[arg(long, default_value_t = DEFAULT_DURATION_SECS, conflicts_with = "full")]
    pub duration: f64,
    /// Analyse the whole clip after the offset.
    #[arg(long)]
    pub full: bool,
    /// Seconds to skip before the analysis window.
    #[arg(long, default_value_t = 0.0)]
    pub offset: f64,
}

impl ExtractionArgs {
    pub fn params(&self) -> Result<ExtractionParams> {
        let params = ExtractionParams {
            sample_rate: self.sample_rate,
            duration: (!self.full).then_some(self.duration),
            offset: self.offset,
            ..ExtractionParams::default()
        };
        params.validate()?;
        Ok(params)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Input audio file (WAV, MP3, FLAC, OGG, ...).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
    #[command(flatten)]
    pub extraction: ExtractionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
    /// Directory holding the fitted model artifacts.
    #[arg(long)]
    pub models: Option<PathBuf>,
    /// Fill features missing from the schema with 0.0 instead of failing.
    #[arg(long)]
    pub lenient: bool,
    #[command(flatten)]
    pub extraction: ExtractionArgs,
}

impl PredictArgs {
    pub fn policy(&self) -> SchemaPolicy {
        if self.lenient {
            SchemaPolicy::Lenient
        } else {
            SchemaPolicy::Strict
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClassifyArgs {
    /// JSON array of feature values in schema order.
    #[arg(long, value_name = "JSON")]
    pub features: String,
    #[arg(long)]
    pub models: Option<PathBuf>,
    /// Schema assumed when the scaler artifact carries no feature names.
    #[arg(long, value_enum, default_value_t = Variant::Baseline)]
    pub variant: Variant,
}

impl ClassifyArgs {
    pub fn vector(&self) -> Result<Vec<f64>> {
        let values: Vec<f64> = serde_json::from_str(&self.features)
            .context("--features must be a JSON array of numbers")?;
        ensure!(!values.is_empty(), "--features must not be empty");
        ensure!(
            values.iter().all(|v| v.is_finite()),
            "--features must only contain finite numbers"
        );
        Ok(values)
    }
}

#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    #[arg(long, value_enum, default_value_t = Variant::Baseline)]
    pub variant: Variant,
}
