use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::features::FEATURE_NAMES;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Failed to open model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse model file: {0}")]
    Format(#[from] serde_json::Error),
    #[error("Invalid model: {0}")]
    InvalidModel(String),
    #[error("input has {got} features, model expects {expected}")]
    ShapeMismatch { expected: usize, got: usize },
}

/// A pre-trained model answering one discrete class per input row.
/// Implementations are immutable after construction and shared across
/// workers without locking.
pub trait Classifier: Send + Sync {
    fn predict(&self, rows: ArrayView2<'_, f64>) -> Result<Vec<i64>, ClassifierError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        class: i64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let len = self.nodes.len();
        for (idx, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                if *feature >= n_features {
                    return Err(format!("node {idx} splits on feature {feature} of {n_features}"));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {idx} has a non-finite threshold"));
                }
                for child in [*left, *right] {
                    // children always come after their parent, so traversal terminates
                    if child <= idx || child >= len {
                        return Err(format!("node {idx} points to invalid child {child}"));
                    }
                }
            }
        }
        Ok(())
    }

    fn leaf_class(&self, row: &[f64]) -> i64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { class } => return *class,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Random forest persisted as JSON. Each tree votes with its leaf class and
/// the most common class wins; ties go to the smallest class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomForest {
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let file = File::open(path.as_ref())?;
        let forest: RandomForest = serde_json::from_reader(BufReader::new(file))?;
        forest.validate()?;
        Ok(forest)
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.n_features != FEATURE_NAMES.len() {
            return Err(ClassifierError::InvalidModel(format!(
                "model expects {} features, service provides {}",
                self.n_features,
                FEATURE_NAMES.len()
            )));
        }
        if self.trees.is_empty() {
            return Err(ClassifierError::InvalidModel("forest has no trees".to_string()));
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| ClassifierError::InvalidModel(format!("tree {idx}: {e}")))?;
        }
        Ok(())
    }

    fn vote(&self, row: &[f64]) -> i64 {
        let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
        for tree in &self.trees {
            *votes.entry(tree.leaf_class(row)).or_default() += 1;
        }
        let mut best: Option<(i64, usize)> = None;
        for (class, count) in votes {
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((class, count));
            }
        }
        best.map(|(class, _)| class).unwrap_or_default()
    }
}

impl Classifier for RandomForest {
    fn predict(&self, rows: ArrayView2<'_, f64>) -> Result<Vec<i64>, ClassifierError> {
        if rows.ncols() != self.n_features {
            return Err(ClassifierError::ShapeMismatch {
                expected: self.n_features,
                got: rows.ncols(),
            });
        }
        Ok(rows
            .rows()
            .into_iter()
            .map(|row| self.vote(&row.to_vec()))
            .collect())
    }
}
