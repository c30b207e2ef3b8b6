//! Scale → PCA → classify over externally fitted artifacts.
//!
//! A [`ModelContext`] is loaded once from a models directory and is
//! read-only afterwards, so it can be shared freely between requests.

mod classifier;
mod forest;
mod labels;
mod pca;
mod scaler;
mod svm;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::Array1;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

pub use classifier::{ClassOutcome, Classifier, ClassifierKind};
pub use labels::LabelEncoder;
pub use pca::Pca;
pub use scaler::StandardScaler;

use crate::error::{Result, VoiceError};
use crate::features::{FeatureMap, FeatureSchema, SchemaPolicy};

pub const SCALER_FILE: &str = "scaler.json";
pub const PCA_FILE: &str = "pca.json";
pub const CLASSIFIER_FILE: &str = "final_model.json";
pub const LABEL_ENCODER_FILE: &str = "label_encoder.json";

/// Outcome of running one feature vector through the fitted pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub label: String,
    /// Largest class probability, when the classifier provides probabilities
    pub confidence: Option<f64>,
    pub probabilities: Option<BTreeMap<String, f64>>,
    pub scaled_features: Vec<f64>,
    pub pca_features: Vec<f64>,
}

/// The four fitted artifacts plus the feature order they expect.
#[derive(Debug, Clone)]
pub struct ModelContext {
    schema: FeatureSchema,
    scaler: StandardScaler,
    pca: Pca,
    classifier: Classifier,
    labels: LabelEncoder,
}

impl ModelContext {
    /// Load and cross-check the artifacts in `dir`. The schema is taken from
    /// the scaler's `feature_names` when present, else `default_schema`.
    pub fn load(dir: &Path, default_schema: FeatureSchema) -> Result<Self> {
        let scaler_artifact: scaler::ScalerArtifact = read_artifact(dir, SCALER_FILE)?;
        let pca_artifact: pca::PcaArtifact = read_artifact(dir, PCA_FILE)?;
        let classifier_artifact: classifier::ClassifierArtifact =
            read_artifact(dir, CLASSIFIER_FILE)?;
        let labels: LabelEncoder = read_artifact(dir, LABEL_ENCODER_FILE)?;

        let scaler = StandardScaler::from_artifact(&scaler_artifact)
            .map_err(|msg| VoiceError::artifact(dir.join(SCALER_FILE), msg))?;
        let pca = Pca::from_artifact(&pca_artifact)
            .map_err(|msg| VoiceError::artifact(dir.join(PCA_FILE), msg))?;
        let classifier = Classifier::from_artifact(&classifier_artifact)
            .map_err(|msg| VoiceError::artifact(dir.join(CLASSIFIER_FILE), msg))?;
        let schema = scaler_artifact
            .feature_names
            .map(FeatureSchema::new)
            .unwrap_or(default_schema);

        let context = Self {
            schema,
            scaler,
            pca,
            classifier,
            labels,
        };
        context
            .check_consistency()
            .map_err(|msg| VoiceError::artifact(dir, msg))?;

        info!(
            dir = %dir.display(),
            features = context.scaler.n_features(),
            components = context.pca.n_components(),
            classes = %context.labels.classes().join(","),
            "loaded model artifacts"
        );
        Ok(context)
    }

    fn check_consistency(&self) -> std::result::Result<(), String> {
        if self.schema.len() != self.scaler.n_features() {
            return Err(format!(
                "schema has {} features but the scaler was fitted on {}",
                self.schema.len(),
                self.scaler.n_features()
            ));
        }
        if self.pca.n_features() != self.scaler.n_features() {
            return Err(format!(
                "pca expects {} inputs but the scaler produces {}",
                self.pca.n_features(),
                self.scaler.n_features()
            ));
        }
        if self.classifier.n_features() != self.pca.n_components() {
            return Err(format!(
                "classifier expects {} inputs but pca produces {}",
                self.classifier.n_features(),
                self.pca.n_components()
            ));
        }
        if let Some(class) = self
            .classifier
            .classes()
            .iter()
            .find(|&&class| self.labels.inverse_transform(class).is_none())
        {
            return Err(format!(
                "classifier emits class {} but the label encoder knows {} labels",
                class,
                self.labels.classes().len()
            ));
        }
        Ok(())
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn labels(&self) -> &LabelEncoder {
        &self.labels
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Standardize and project `vector`; returns `(scaled, projected)`.
    pub fn transform(&self, vector: &Array1<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        let expected = self.scaler.n_features();
        if vector.len() != expected {
            return Err(VoiceError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        let scaled = self.scaler.transform(vector);
        let projected = self.pca.transform(&scaled);
        Ok((scaled, projected))
    }

    pub fn predict_vector(&self, vector: &Array1<f64>) -> Result<Prediction> {
        let (scaled, projected) = self.transform(vector)?;
        let outcome = self.classifier.predict(&projected);
        let label = self.decode(outcome.class);

        let probabilities = outcome.probabilities.as_ref().map(|probs| {
            self.classifier
                .classes()
                .iter()
                .zip(probs)
                .map(|(&class, &p)| (self.decode(class), p))
                .collect::<BTreeMap<_, _>>()
        });
        let confidence = outcome
            .probabilities
            .as_ref()
            .map(|probs| probs.iter().copied().fold(0.0, f64::max));

        Ok(Prediction {
            label,
            confidence,
            probabilities,
            scaled_features: scaled.to_vec(),
            pca_features: projected.to_vec(),
        })
    }

    /// Vectorize `features` against this context's schema and classify.
    pub fn predict_features(&self, features: &FeatureMap, policy: SchemaPolicy) -> Result<Prediction> {
        let vector = policy.vectorize(features, &self.schema)?;
        self.predict_vector(&vector)
    }

    // Every classifier class was checked against the encoder at load time.
    fn decode(&self, class: usize) -> String {
        self.labels
            .inverse_transform(class)
            .map(str::to_string)
            .unwrap_or_else(|| class.to_string())
    }
}

fn read_artifact<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let path = dir.join(name);
    let file = File::open(&path).map_err(|err| VoiceError::artifact(&path, err.to_string()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| VoiceError::artifact(&path, err.to_string()))
}
