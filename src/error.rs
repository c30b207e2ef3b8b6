use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for results returned by the library.
pub type Result<T> = std::result::Result<T, VoiceError>;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("failed to decode audio from {source_name}: {message}")]
    Decode {
        source_name: String,
        message: String,
    },

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("feature map is missing schema entries: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("failed to load model artifact {}: {message}", path.display())]
    ArtifactLoad { path: PathBuf, message: String },

    #[error("feature vector has {actual} values, fitted transforms expect {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl VoiceError {
    pub(crate) fn artifact(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        VoiceError::ArtifactLoad {
            path: path.into(),
            message: message.into(),
        }
    }
}
