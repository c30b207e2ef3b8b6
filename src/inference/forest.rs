use ndarray::Array1;
use serde::Deserialize;

use super::classifier::{argmax, Decision};

/// Marks a leaf in `children_left`/`children_right`.
const LEAF: i64 = -1;

/// Ensemble of decision trees stored as flat node arrays.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ForestArtifact {
    pub n_features: usize,
    pub trees: Vec<TreeArtifact>,
    #[serde(default)]
    pub classes: Option<Vec<usize>>,
}

/// One tree; node `i` splits on `feature[i] <= threshold[i]`, going left
/// when true. `value[i]` holds the per-class weight seen at the node.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TreeArtifact {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub(crate) struct RandomForest {
    n_features: usize,
    n_classes: usize,
    trees: Vec<Tree>,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Normalized class distribution
    Leaf(Vec<f64>),
}

impl RandomForest {
    pub(crate) fn from_artifact(artifact: &ForestArtifact) -> Result<Self, String> {
        if artifact.n_features == 0 {
            return Err("random forest has no input features".to_string());
        }
        let n_classes = artifact
            .trees
            .first()
            .and_then(|tree| tree.value.first())
            .map(Vec::len)
            .ok_or_else(|| "random forest has no trees".to_string())?;
        if n_classes < 2 {
            return Err("random forest needs at least two classes".to_string());
        }

        let trees = artifact
            .trees
            .iter()
            .enumerate()
            .map(|(idx, tree)| {
                Tree::from_artifact(tree, artifact.n_features, n_classes)
                    .map_err(|reason| format!("tree {idx}: {reason}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            n_features: artifact.n_features,
            n_classes,
            trees,
        })
    }

    pub(crate) fn n_features(&self) -> usize {
        self.n_features
    }

    pub(crate) fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Mean of the leaf distributions; the class is their argmax.
    pub(crate) fn decide(&self, x: &Array1<f64>) -> Decision {
        let mut totals = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (total, p) in totals.iter_mut().zip(tree.leaf(x)) {
                *total += p;
            }
        }
        let count = self.trees.len() as f64;
        let probabilities: Vec<f64> = totals.into_iter().map(|t| t / count).collect();
        Decision {
            index: argmax(probabilities.iter().copied()),
            probabilities: Some(probabilities),
        }
    }
}

impl Tree {
    fn from_artifact(tree: &TreeArtifact, n_features: usize, n_classes: usize) -> Result<Self, String> {
        let n_nodes = tree.children_left.len();
        if n_nodes == 0 {
            return Err("no nodes".to_string());
        }
        if tree.children_right.len() != n_nodes
            || tree.feature.len() != n_nodes
            || tree.threshold.len() != n_nodes
            || tree.value.len() != n_nodes
        {
            return Err("node arrays differ in length".to_string());
        }

        let mut nodes = Vec::with_capacity(n_nodes);
        for idx in 0..n_nodes {
            let (left, right) = (tree.children_left[idx], tree.children_right[idx]);
            if left == LEAF || right == LEAF {
                if left != right {
                    return Err(format!("node {idx} has a single child"));
                }
                nodes.push(Node::Leaf(normalize(&tree.value[idx], n_classes, idx)?));
                continue;
            }

            // Children always follow their parent, so a walk cannot loop.
            let child = |value: i64| -> Result<usize, String> {
                usize::try_from(value)
                    .ok()
                    .filter(|&c| c > idx && c < n_nodes)
                    .ok_or_else(|| format!("node {idx} points at invalid child {value}"))
            };
            let feature = usize::try_from(tree.feature[idx])
                .ok()
                .filter(|&f| f < n_features)
                .ok_or_else(|| format!("node {idx} splits on feature {}", tree.feature[idx]))?;
            let threshold = tree.threshold[idx];
            if threshold.is_nan() {
                return Err(format!("node {idx} has a NaN threshold"));
            }
            nodes.push(Node::Split {
                feature,
                threshold,
                left: child(left)?,
                right: child(right)?,
            });
        }
        Ok(Self { nodes })
    }

    fn leaf(&self, x: &Array1<f64>) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(distribution) => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn normalize(value: &[f64], n_classes: usize, idx: usize) -> Result<Vec<f64>, String> {
    if value.len() != n_classes {
        return Err(format!(
            "leaf {idx} has {} class weights, expected {n_classes}",
            value.len()
        ));
    }
    if value.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(format!("leaf {idx} has invalid class weights"));
    }
    let total: f64 = value.iter().sum();
    if total <= 0.0 {
        return Err(format!("leaf {idx} is empty"));
    }
    Ok(value.iter().map(|w| w / total).collect())
}
