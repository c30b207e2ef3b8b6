use ndarray::{Array1, Array2};
use serde::Deserialize;

/// On-disk form of a fitted PCA projection.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PcaArtifact {
    pub mean: Vec<f64>,
    /// `n_components × n_features`
    pub components: Vec<Vec<f64>>,
    #[serde(default)]
    pub explained_variance: Option<Vec<f64>>,
    #[serde(default)]
    pub whiten: bool,
}

/// Linear projection onto the principal axes, `(x - mean) · componentsᵀ`,
/// optionally whitened by the per-component explained variance.
#[derive(Debug, Clone)]
pub struct Pca {
    mean: Array1<f64>,
    components: Array2<f64>,
    whitening: Option<Array1<f64>>,
}

impl Pca {
    pub(crate) fn from_artifact(artifact: &PcaArtifact) -> Result<Self, String> {
        let n_features = artifact.mean.len();
        let n_components = artifact.components.len();
        if n_components == 0 {
            return Err("pca has no components".to_string());
        }
        if let Some(row) = artifact.components.iter().position(|r| r.len() != n_features) {
            return Err(format!(
                "pca component {} has {} values, mean has {}",
                row,
                artifact.components[row].len(),
                n_features
            ));
        }
        let flat: Vec<f64> = artifact.components.iter().flatten().copied().collect();
        if flat.iter().chain(&artifact.mean).any(|v| !v.is_finite()) {
            return Err("pca contains non-finite values".to_string());
        }
        let components = Array2::from_shape_vec((n_components, n_features), flat)
            .map_err(|err| format!("invalid pca components: {err}"))?;

        let whitening = if artifact.whiten {
            let variance = artifact
                .explained_variance
                .as_ref()
                .ok_or_else(|| "whitened pca needs explained_variance".to_string())?;
            if variance.len() != n_components {
                return Err(format!(
                    "pca has {} components but {} explained variances",
                    n_components,
                    variance.len()
                ));
            }
            if variance.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err("explained variances must be positive".to_string());
            }
            Some(variance.iter().map(|v| v.sqrt()).collect())
        } else {
            None
        };

        Ok(Self {
            mean: Array1::from_vec(artifact.mean.clone()),
            components,
            whitening,
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn transform(&self, x: &Array1<f64>) -> Array1<f64> {
        let projected = self.components.dot(&(x - &self.mean));
        match &self.whitening {
            Some(std_dev) => projected / std_dev,
            None => projected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn artifact() -> PcaArtifact {
        PcaArtifact {
            mean: vec![1.0, 1.0, 0.0],
            components: vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.6, 0.8]],
            explained_variance: Some(vec![4.0, 1.0]),
            whiten: false,
        }
    }

    #[test]
    fn projects_centred_vector() {
        let pca = Pca::from_artifact(&artifact()).unwrap();
        assert_eq!(pca.n_features(), 3);
        assert_eq!(pca.n_components(), 2);
        let projected = pca.transform(&array![3.0, 2.0, 1.0]);
        assert!((projected[0] - 2.0).abs() < 1e-12);
        assert!((projected[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn whitening_divides_by_component_std() {
        let pca = Pca::from_artifact(&PcaArtifact {
            whiten: true,
            ..artifact()
        })
        .unwrap();
        let projected = pca.transform(&array![3.0, 2.0, 1.0]);
        assert!((projected[0] - 1.0).abs() < 1e-12);
        assert!((projected[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn rejects_ragged_components() {
        let mut ragged = artifact();
        ragged.components[1].pop();
        assert!(Pca::from_artifact(&ragged).is_err());
    }
}
