use ndarray::Array1;
use serde::Deserialize;

/// On-disk form of a fitted standard scaler.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScalerArtifact {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

/// Per-column standardization, `(x - mean) / scale`.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub(crate) fn from_artifact(artifact: &ScalerArtifact) -> Result<Self, String> {
        if artifact.mean.is_empty() {
            return Err("scaler has no columns".to_string());
        }
        if artifact.mean.len() != artifact.scale.len() {
            return Err(format!(
                "scaler mean has {} columns but scale has {}",
                artifact.mean.len(),
                artifact.scale.len()
            ));
        }
        if let Some(names) = &artifact.feature_names {
            if names.len() != artifact.mean.len() {
                return Err(format!(
                    "scaler lists {} feature names for {} columns",
                    names.len(),
                    artifact.mean.len()
                ));
            }
        }
        if artifact
            .mean
            .iter()
            .chain(&artifact.scale)
            .any(|v| !v.is_finite())
        {
            return Err("scaler contains non-finite values".to_string());
        }
        // A constant training column has scale 0; it is left unscaled.
        let scale = artifact
            .scale
            .iter()
            .map(|&s| if s == 0.0 { 1.0 } else { s })
            .collect();
        Ok(Self {
            mean: Array1::from_vec(artifact.mean.clone()),
            scale,
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &Array1<f64>) -> Array1<f64> {
        (x - &self.mean) / &self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn artifact(mean: Vec<f64>, scale: Vec<f64>) -> ScalerArtifact {
        ScalerArtifact {
            mean,
            scale,
            feature_names: None,
        }
    }

    #[test]
    fn standardizes_each_column() {
        let scaler = StandardScaler::from_artifact(&artifact(vec![1.0, 10.0], vec![2.0, 5.0])).unwrap();
        assert_eq!(scaler.transform(&array![3.0, 0.0]), array![1.0, -2.0]);
    }

    #[test]
    fn zero_scale_is_treated_as_unit() {
        let scaler = StandardScaler::from_artifact(&artifact(vec![1.0], vec![0.0])).unwrap();
        assert_eq!(scaler.transform(&array![4.0]), array![3.0]);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(StandardScaler::from_artifact(&artifact(vec![1.0, 2.0], vec![1.0])).is_err());
        let named = ScalerArtifact {
            feature_names: Some(vec!["a".into()]),
            ..artifact(vec![0.0, 0.0], vec![1.0, 1.0])
        };
        assert!(StandardScaler::from_artifact(&named).is_err());
    }
}
