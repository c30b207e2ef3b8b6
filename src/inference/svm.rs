use ndarray::{Array1, Array2, ArrayView1};
use serde::Deserialize;

use super::classifier::{argmax, Decision};

/// Support-vector classifier in libsvm's one-vs-one layout.
///
/// `dual_coef` and `intercept` are the fitted attributes as exported after
/// training: for two classes a positive decision selects the second class.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct KernelSvmArtifact {
    pub support_vectors: Vec<Vec<f64>>,
    /// `(n_classes - 1) × n_support_vectors`
    pub dual_coef: Vec<Vec<f64>>,
    /// One entry per class pair
    pub intercept: Vec<f64>,
    /// Support vectors per class, in class order
    pub n_support: Vec<usize>,
    pub kernel: Kernel,
    #[serde(default)]
    pub gamma: Option<f64>,
    #[serde(default)]
    pub coef0: f64,
    #[serde(default = "default_degree")]
    pub degree: u32,
    #[serde(default)]
    pub classes: Option<Vec<usize>>,
    #[serde(default)]
    pub prob_a: Option<Vec<f64>>,
    #[serde(default)]
    pub prob_b: Option<Vec<f64>>,
}

fn default_degree() -> u32 {
    3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Kernel {
    Linear,
    Poly,
    Rbf,
    Sigmoid,
}

#[derive(Debug, Clone)]
pub(crate) struct KernelSvm {
    support_vectors: Array2<f64>,
    dual_coef: Array2<f64>,
    intercept: Vec<f64>,
    /// Start offset of each class's support vectors, plus the total
    offsets: Vec<usize>,
    kernel: Kernel,
    gamma: f64,
    coef0: f64,
    degree: i32,
    platt: Option<Platt>,
}

/// Per-pair sigmoid `P = 1 / (1 + exp(A·f + B))` fitted on decision values.
#[derive(Debug, Clone)]
pub(crate) struct Platt {
    a: Vec<f64>,
    b: Vec<f64>,
}

impl Platt {
    pub(crate) fn from_parts(
        a: Option<&[f64]>,
        b: Option<&[f64]>,
        pairs: usize,
    ) -> Result<Option<Self>, String> {
        match (a, b) {
            (None, None) => Ok(None),
            (Some(a), Some(b)) if a.len() == pairs && b.len() == pairs => {
                if a.iter().chain(b).any(|v| !v.is_finite()) {
                    return Err("platt parameters contain non-finite values".to_string());
                }
                Ok(Some(Self {
                    a: a.to_vec(),
                    b: b.to_vec(),
                }))
            }
            (Some(_), Some(_)) => Err(format!("expected {pairs} platt parameter pairs")),
            _ => Err("prob_a and prob_b must be given together".to_string()),
        }
    }

    /// Probability that `decision` belongs to the first class of `pair`.
    pub(crate) fn probability(&self, pair: usize, decision: f64) -> f64 {
        let z = decision * self.a[pair] + self.b[pair];
        if z >= 0.0 {
            let e = (-z).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + z.exp())
        }
    }
}

impl KernelSvm {
    pub(crate) fn from_artifact(artifact: &KernelSvmArtifact) -> Result<Self, String> {
        let n_classes = artifact.n_support.len();
        if n_classes < 2 {
            return Err("kernel svm needs at least two classes".to_string());
        }
        let n_sv = artifact.support_vectors.len();
        let n_features = artifact.support_vectors.first().map(Vec::len).unwrap_or(0);
        if n_sv == 0 || n_features == 0 {
            return Err("kernel svm has no support vectors".to_string());
        }
        if artifact.support_vectors.iter().any(|sv| sv.len() != n_features) {
            return Err("support vectors differ in length".to_string());
        }
        if artifact.n_support.iter().sum::<usize>() != n_sv {
            return Err(format!(
                "n_support counts {} vectors but {} are listed",
                artifact.n_support.iter().sum::<usize>(),
                n_sv
            ));
        }
        if artifact.dual_coef.len() != n_classes - 1
            || artifact.dual_coef.iter().any(|row| row.len() != n_sv)
        {
            return Err(format!(
                "dual_coef must be {} rows of {} coefficients",
                n_classes - 1,
                n_sv
            ));
        }
        let pairs = n_classes * (n_classes - 1) / 2;
        if artifact.intercept.len() != pairs {
            return Err(format!(
                "kernel svm over {} classes needs {} intercepts, found {}",
                n_classes,
                pairs,
                artifact.intercept.len()
            ));
        }

        let gamma = match (artifact.kernel, artifact.gamma) {
            (Kernel::Linear, gamma) => gamma.unwrap_or(1.0),
            (_, Some(gamma)) if gamma.is_finite() && gamma > 0.0 => gamma,
            (kernel, _) => return Err(format!("{kernel:?} kernel needs a positive gamma")),
        };

        let sv_flat: Vec<f64> = artifact.support_vectors.iter().flatten().copied().collect();
        let coef_flat: Vec<f64> = artifact.dual_coef.iter().flatten().copied().collect();
        if sv_flat
            .iter()
            .chain(&coef_flat)
            .chain(&artifact.intercept)
            .chain(std::iter::once(&artifact.coef0))
            .any(|v| !v.is_finite())
        {
            return Err("kernel svm contains non-finite values".to_string());
        }
        let support_vectors = Array2::from_shape_vec((n_sv, n_features), sv_flat)
            .map_err(|err| format!("invalid support vectors: {err}"))?;
        let dual_coef = Array2::from_shape_vec((n_classes - 1, n_sv), coef_flat)
            .map_err(|err| format!("invalid dual coefficients: {err}"))?;

        let offsets = std::iter::once(0)
            .chain(artifact.n_support.iter().scan(0, |total, &count| {
                *total += count;
                Some(*total)
            }))
            .collect();

        Ok(Self {
            support_vectors,
            dual_coef,
            intercept: artifact.intercept.clone(),
            offsets,
            kernel: artifact.kernel,
            gamma,
            coef0: artifact.coef0,
            degree: artifact.degree as i32,
            platt: Platt::from_parts(artifact.prob_a.as_deref(), artifact.prob_b.as_deref(), pairs)?,
        })
    }

    pub(crate) fn n_features(&self) -> usize {
        self.support_vectors.ncols()
    }

    pub(crate) fn n_classes(&self) -> usize {
        self.offsets.len() - 1
    }

    pub(crate) fn has_probabilities(&self) -> bool {
        self.platt.is_some()
    }

    fn kernel(&self, sv: ArrayView1<f64>, x: &Array1<f64>) -> f64 {
        match self.kernel {
            Kernel::Linear => sv.dot(x),
            Kernel::Poly => (self.gamma * sv.dot(x) + self.coef0).powi(self.degree),
            Kernel::Rbf => {
                let distance: f64 = sv.iter().zip(x).map(|(a, b)| (a - b) * (a - b)).sum();
                (-self.gamma * distance).exp()
            }
            Kernel::Sigmoid => (self.gamma * sv.dot(x) + self.coef0).tanh(),
        }
    }

    /// Pairwise decision values in `(0,1), (0,2), …, (1,2), …` order. A
    /// positive value favours the lower class of the pair.
    fn pairwise_decisions(&self, x: &Array1<f64>) -> Vec<f64> {
        let k: Vec<f64> = self
            .support_vectors
            .outer_iter()
            .map(|sv| self.kernel(sv, x))
            .collect();
        let n_classes = self.n_classes();
        let mut decisions = Vec::with_capacity(self.intercept.len());
        for i in 0..n_classes {
            for j in (i + 1)..n_classes {
                let own: f64 = (self.offsets[i]..self.offsets[i + 1])
                    .map(|s| self.dual_coef[[j - 1, s]] * k[s])
                    .sum();
                let other: f64 = (self.offsets[j]..self.offsets[j + 1])
                    .map(|s| self.dual_coef[[i, s]] * k[s])
                    .sum();
                decisions.push(own + other + self.intercept[decisions.len()]);
            }
        }
        // Exported binary models have their sign flipped towards the second class.
        if n_classes == 2 {
            decisions[0] = -decisions[0];
        }
        decisions
    }

    pub(crate) fn decide(&self, x: &Array1<f64>) -> Decision {
        let n_classes = self.n_classes();
        let decisions = self.pairwise_decisions(x);

        let mut votes = vec![0usize; n_classes];
        let mut pair = 0;
        for i in 0..n_classes {
            for j in (i + 1)..n_classes {
                if decisions[pair] > 0.0 {
                    votes[i] += 1;
                } else {
                    votes[j] += 1;
                }
                pair += 1;
            }
        }
        let index = argmax(votes.iter().map(|&v| v as f64));

        let probabilities = self.platt.as_ref().map(|platt| {
            if n_classes == 2 {
                let first = platt.probability(0, decisions[0]);
                vec![first, 1.0 - first]
            } else {
                couple_pairwise(platt, &decisions, n_classes)
            }
        });
        Decision {
            index,
            probabilities,
        }
    }
}

/// Combines pairwise probabilities into one distribution (Wu, Lin and Weng,
/// second method) as libsvm does for more than two classes.
fn couple_pairwise(platt: &Platt, decisions: &[f64], n_classes: usize) -> Vec<f64> {
    const MIN_PROB: f64 = 1e-7;
    let mut r = vec![vec![0.0; n_classes]; n_classes];
    let mut pair = 0;
    for i in 0..n_classes {
        for j in (i + 1)..n_classes {
            let p = platt
                .probability(pair, decisions[pair])
                .clamp(MIN_PROB, 1.0 - MIN_PROB);
            r[i][j] = p;
            r[j][i] = 1.0 - p;
            pair += 1;
        }
    }

    let k = n_classes;
    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..k {
            if j == t {
                continue;
            }
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut p = vec![1.0 / k as f64; k];
    let mut qp = vec![0.0; k];
    let eps = 0.005 / k as f64;
    for _ in 0..k.max(100) {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp += p[t] * qp[t];
        }
        let max_error = qp
            .iter()
            .map(|value| (value - pqp).abs())
            .fold(0.0, f64::max);
        if max_error < eps {
            break;
        }
        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }
    p
}
