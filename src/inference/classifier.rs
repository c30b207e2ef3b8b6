use ndarray::{Array1, Array2};
use serde::Deserialize;

use super::forest::{ForestArtifact, RandomForest};
use super::svm::{KernelSvm, KernelSvmArtifact, Platt};

/// On-disk form of the fitted classifier, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum ClassifierArtifact {
    LogisticRegression(LinearArtifact),
    LinearSvm(LinearArtifact),
    KernelSvm(KernelSvmArtifact),
    RandomForest(ForestArtifact),
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LinearArtifact {
    /// One row per decision function (a single row for binary problems)
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
    /// Encoded labels in decision order; defaults to `0..n_classes`
    #[serde(default)]
    pub classes: Option<Vec<usize>>,
    /// Platt scaling parameters of a binary SVM
    #[serde(default)]
    pub prob_a: Option<Vec<f64>>,
    #[serde(default)]
    pub prob_b: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    /// Produces class probabilities
    LogisticRegression,
    /// Probabilities only with Platt parameters
    LinearSvm,
    /// One-vs-one SVM over support vectors
    KernelSvm,
    /// Averaged tree leaf distributions
    RandomForest,
}

/// Fitted classifier over the reduced feature vector.
#[derive(Debug, Clone)]
pub struct Classifier {
    model: Model,
    classes: Vec<usize>,
}

#[derive(Debug, Clone)]
enum Model {
    Linear(LinearModel),
    KernelSvm(KernelSvm),
    Forest(RandomForest),
}

/// Decision functions `coef · x + intercept`.
#[derive(Debug, Clone)]
struct LinearModel {
    kind: ClassifierKind,
    coef: Array2<f64>,
    intercept: Array1<f64>,
    platt: Option<Platt>,
}

/// Position of the chosen class in decision order plus optional per-class
/// probabilities in the same order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Decision {
    pub index: usize,
    pub probabilities: Option<Vec<f64>>,
}

/// Encoded class chosen by the classifier plus optional per-class probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassOutcome {
    pub class: usize,
    pub probabilities: Option<Vec<f64>>,
}

impl Classifier {
    pub(crate) fn from_artifact(artifact: &ClassifierArtifact) -> Result<Self, String> {
        let (model, n_classes, classes) = match artifact {
            ClassifierArtifact::LogisticRegression(linear) => {
                let model = LinearModel::from_artifact(ClassifierKind::LogisticRegression, linear)?;
                let n_classes = model.n_classes();
                (Model::Linear(model), n_classes, &linear.classes)
            }
            ClassifierArtifact::LinearSvm(linear) => {
                let model = LinearModel::from_artifact(ClassifierKind::LinearSvm, linear)?;
                let n_classes = model.n_classes();
                (Model::Linear(model), n_classes, &linear.classes)
            }
            ClassifierArtifact::KernelSvm(kernel) => {
                let model = KernelSvm::from_artifact(kernel)?;
                let n_classes = model.n_classes();
                (Model::KernelSvm(model), n_classes, &kernel.classes)
            }
            ClassifierArtifact::RandomForest(forest) => {
                let model = RandomForest::from_artifact(forest)?;
                let n_classes = model.n_classes();
                (Model::Forest(model), n_classes, &forest.classes)
            }
        };
        let classes = resolve_classes(classes.clone(), n_classes)?;
        Ok(Self { model, classes })
    }

    pub fn kind(&self) -> ClassifierKind {
        match &self.model {
            Model::Linear(linear) => linear.kind,
            Model::KernelSvm(_) => ClassifierKind::KernelSvm,
            Model::Forest(_) => ClassifierKind::RandomForest,
        }
    }

    pub fn n_features(&self) -> usize {
        match &self.model {
            Model::Linear(linear) => linear.coef.ncols(),
            Model::KernelSvm(svm) => svm.n_features(),
            Model::Forest(forest) => forest.n_features(),
        }
    }

    /// Encoded labels this classifier can emit, in decision order.
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn supports_probabilities(&self) -> bool {
        match &self.model {
            Model::Linear(linear) => {
                linear.kind == ClassifierKind::LogisticRegression || linear.platt.is_some()
            }
            Model::KernelSvm(svm) => svm.has_probabilities(),
            Model::Forest(_) => true,
        }
    }

    pub fn predict(&self, x: &Array1<f64>) -> ClassOutcome {
        let decision = match &self.model {
            Model::Linear(linear) => linear.decide(x),
            Model::KernelSvm(svm) => svm.decide(x),
            Model::Forest(forest) => forest.decide(x),
        };
        ClassOutcome {
            class: self.classes[decision.index],
            probabilities: decision.probabilities,
        }
    }
}

impl LinearModel {
    fn from_artifact(kind: ClassifierKind, linear: &LinearArtifact) -> Result<Self, String> {
        let rows = linear.coef.len();
        let n_features = linear.coef.first().map(Vec::len).unwrap_or(0);
        if rows == 0 || n_features == 0 {
            return Err("classifier has no coefficients".to_string());
        }
        if linear.coef.iter().any(|row| row.len() != n_features) {
            return Err("classifier coefficient rows differ in length".to_string());
        }
        if linear.intercept.len() != rows {
            return Err(format!(
                "classifier has {} coefficient rows but {} intercepts",
                rows,
                linear.intercept.len()
            ));
        }

        let flat: Vec<f64> = linear.coef.iter().flatten().copied().collect();
        if flat.iter().chain(&linear.intercept).any(|v| !v.is_finite()) {
            return Err("classifier contains non-finite values".to_string());
        }
        let coef = Array2::from_shape_vec((rows, n_features), flat)
            .map_err(|err| format!("invalid classifier coefficients: {err}"))?;

        let platt = Platt::from_parts(linear.prob_a.as_deref(), linear.prob_b.as_deref(), 1)?;
        if platt.is_some() && (kind != ClassifierKind::LinearSvm || rows != 1) {
            return Err(
                "platt parameters apply to binary linear SVMs; use kernel_svm with a linear kernel for more classes"
                    .to_string(),
            );
        }

        Ok(Self {
            kind,
            coef,
            intercept: Array1::from_vec(linear.intercept.clone()),
            platt,
        })
    }

    fn n_classes(&self) -> usize {
        match self.coef.nrows() {
            1 => 2,
            rows => rows,
        }
    }

    fn decide(&self, x: &Array1<f64>) -> Decision {
        let decision = self.coef.dot(x) + &self.intercept;
        let binary = decision.len() == 1;
        let index = if binary {
            usize::from(decision[0] > 0.0)
        } else {
            argmax(decision.iter().copied())
        };

        let probabilities = match (self.kind, &self.platt) {
            (ClassifierKind::LogisticRegression, _) if binary => {
                let positive = sigmoid(decision[0]);
                Some(vec![1.0 - positive, positive])
            }
            (ClassifierKind::LogisticRegression, _) => Some(softmax(&decision)),
            // The fitted Platt curve is defined on the first class's side of the boundary.
            (_, Some(platt)) => {
                let first = platt.probability(0, -decision[0]);
                Some(vec![first, 1.0 - first])
            }
            _ => None,
        };
        Decision {
            index,
            probabilities,
        }
    }
}

fn resolve_classes(classes: Option<Vec<usize>>, n_classes: usize) -> Result<Vec<usize>, String> {
    let classes = classes.unwrap_or_else(|| (0..n_classes).collect());
    if classes.len() != n_classes {
        return Err(format!(
            "classifier decides between {} classes but lists {}",
            n_classes,
            classes.len()
        ));
    }
    Ok(classes)
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn softmax(scores: &Array1<f64>) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Index of the first largest value.
pub(crate) fn argmax(values: impl Iterator<Item = f64>) -> usize {
    values
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_value), (idx, value)| {
            if value > best_value {
                (idx, value)
            } else {
                (best, best_value)
            }
        })
        .0
}
