//! Decision tree model
//!
//! An index-addressed binary tree, loaded from the `tree_` arrays a trained
//! scikit-learn classifier exposes. Construction validates the shape once so
//! every later stage can walk the tree without bounds or cycle checks.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{CompileError, Result};

/// Index of a node inside a [`DecisionTree`]. The root is always `0`.
pub type NodeId = usize;

/// sklearn's marker for "no child"
const TREE_LEAF: i64 = -1;

/// A node in the decision tree
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    /// `features[feature_index] <= threshold` goes left, otherwise right
    Split {
        feature_index: usize,
        threshold: f64,
        left: NodeId,
        right: NodeId,
    },
    /// `class_weights` is the leaf's row of sklearn's `tree_.value`: sample
    /// counts, weighted counts or per-class fractions depending on the export
    Leaf {
        class_weights: Vec<f64>,
        predicted_class: u64,
    },
}

impl TreeNode {
    pub fn split(feature_index: usize, threshold: f64, left: NodeId, right: NodeId) -> Self {
        TreeNode::Split {
            feature_index,
            threshold,
            left,
            right,
        }
    }

    /// Leaf predicting the first class with the highest weight
    pub fn leaf<I, W>(class_weights: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<f64>,
    {
        let class_weights: Vec<f64> = class_weights.into_iter().map(Into::into).collect();
        let predicted_class = argmax(class_weights.iter().copied()).unwrap_or(0) as u64;
        TreeNode::Leaf {
            class_weights,
            predicted_class,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }
}

/// Ordered feature names. Position `i` is `features[i]` in the circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSet(Vec<String>);

impl FeatureSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Per-node class distribution as sklearn writes it: either `[c0, c1]` or
/// the single-output nested form `[[c0, c1]]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NodeValue {
    Flat(Vec<f64>),
    Nested(Vec<Vec<f64>>),
}

impl NodeValue {
    fn weights(&self) -> &[f64] {
        match self {
            NodeValue::Flat(v) => v,
            NodeValue::Nested(outputs) => outputs.first().map(Vec::as_slice).unwrap_or(&[]),
        }
    }
}

/// Serialized tree exported by the training step
#[derive(Debug, Clone, Deserialize)]
pub struct TreeArtifact {
    pub feature_names: Vec<String>,
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<NodeValue>,
}

/// A validated binary decision tree
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    features: FeatureSet,
}

impl DecisionTree {
    /// Validate and wrap a node array.
    ///
    /// Rejects empty trees, child references out of range, cycles, shared
    /// subtrees, unreachable nodes, feature indices outside `features`,
    /// non-finite thresholds and leaves without a usable class distribution.
    /// Class weights must be finite and non-negative.
    pub fn new(nodes: Vec<TreeNode>, features: FeatureSet) -> Result<Self> {
        if nodes.is_empty() {
            return Err(CompileError::EmptyTree);
        }

        let mut seen = vec![false; nodes.len()];
        let mut stack: Vec<NodeId> = vec![0];

        while let Some(id) = stack.pop() {
            if seen[id] {
                return Err(CompileError::malformed(
                    id,
                    "node reached twice (cycle or shared subtree)",
                ));
            }
            seen[id] = true;

            match &nodes[id] {
                TreeNode::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature_index >= features.len() {
                        return Err(CompileError::malformed(
                            id,
                            format!(
                                "feature index {} out of range ({} features)",
                                feature_index,
                                features.len()
                            ),
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(CompileError::malformed(
                            id,
                            format!("non-finite threshold {}", threshold),
                        ));
                    }
                    for child in [*left, *right] {
                        if child >= nodes.len() {
                            return Err(CompileError::malformed(
                                id,
                                format!("child {} out of range ({} nodes)", child, nodes.len()),
                            ));
                        }
                    }
                    // right first so the left subtree is visited first
                    stack.push(*right);
                    stack.push(*left);
                }
                TreeNode::Leaf {
                    class_weights,
                    predicted_class,
                } => {
                    if class_weights.is_empty() {
                        return Err(CompileError::malformed(id, "leaf has no class distribution"));
                    }
                    if let Some(bad) = class_weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
                        return Err(CompileError::malformed(
                            id,
                            format!("class weight {} is not a finite non-negative number", bad),
                        ));
                    }
                    if *predicted_class as usize >= class_weights.len() {
                        return Err(CompileError::malformed(
                            id,
                            format!(
                                "predicted class {} outside {} classes",
                                predicted_class,
                                class_weights.len()
                            ),
                        ));
                    }
                }
            }
        }

        if let Some(orphan) = seen.iter().position(|reached| !reached) {
            return Err(CompileError::malformed(orphan, "unreachable from root"));
        }

        Ok(Self { nodes, features })
    }

    /// Build from sklearn's parallel `tree_` arrays.
    pub fn from_artifact(artifact: TreeArtifact) -> Result<Self> {
        let n = artifact.children_left.len();
        let lengths = [
            artifact.children_right.len(),
            artifact.feature.len(),
            artifact.threshold.len(),
            artifact.value.len(),
        ];
        if let Some(&short) = lengths.iter().find(|&&len| len != n) {
            return Err(CompileError::malformed(
                short.min(n),
                format!("node arrays have inconsistent lengths ({} vs {})", n, short),
            ));
        }
        if n == 0 {
            return Err(CompileError::EmptyTree);
        }

        let mut nodes = Vec::with_capacity(n);
        for id in 0..n {
            let left = artifact.children_left[id];
            let right = artifact.children_right[id];

            if left == TREE_LEAF && right == TREE_LEAF {
                nodes.push(TreeNode::leaf(artifact.value[id].weights().iter().copied()));
                continue;
            }
            if left < 0 || right < 0 {
                return Err(CompileError::malformed(
                    id,
                    format!("split must have two children, got left={} right={}", left, right),
                ));
            }
            let feature = artifact.feature[id];
            if feature < 0 {
                return Err(CompileError::malformed(
                    id,
                    format!("split has negative feature index {}", feature),
                ));
            }
            nodes.push(TreeNode::split(
                feature as usize,
                artifact.threshold[id],
                left as NodeId,
                right as NodeId,
            ));
        }

        let tree = Self::new(nodes, FeatureSet::new(artifact.feature_names))?;
        debug!(
            nodes = tree.node_count(),
            leaves = tree.leaf_count(),
            depth = tree.depth(),
            "Loaded decision tree"
        );
        Ok(tree)
    }

    /// Parse a JSON [`TreeArtifact`].
    pub fn from_json(json: &str) -> Result<Self> {
        let artifact: TreeArtifact = serde_json::from_str(json)
            .map_err(|e| CompileError::InvalidInput(format!("tree artifact: {}", e)))?;
        Self::from_artifact(artifact)
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn feature_name(&self, index: usize) -> &str {
        // indices are validated in `new`
        self.features.name(index).unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn split_count(&self) -> usize {
        self.node_count() - self.leaf_count()
    }

    /// Longest root-to-leaf path; a lone leaf has depth 0
    pub fn depth(&self) -> usize {
        self.depth_from(0)
    }

    fn depth_from(&self, id: NodeId) -> usize {
        match &self.nodes[id] {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => {
                1 + self.depth_from(*left).max(self.depth_from(*right))
            }
        }
    }

    /// Classify one sample with the float model (`<=` goes left).
    pub fn predict(&self, values: &[f64]) -> Result<u64> {
        Ok(self.predict_leaf(values)?.1)
    }

    /// Leaf reached by `values` and its predicted class
    pub fn predict_leaf(&self, values: &[f64]) -> Result<(NodeId, u64)> {
        if values.len() != self.features.len() {
            return Err(CompileError::InvalidInput(format!(
                "expected {} feature values, got {}",
                self.features.len(),
                values.len()
            )));
        }

        let mut idx: NodeId = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf {
                    predicted_class, ..
                } => return Ok((idx, *predicted_class)),
                TreeNode::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if values[*feature_index] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// SHA-256 over features and nodes, hex encoded.
    ///
    /// Stable across runs, so it can be embedded in generated output.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.features.len() as u64).to_be_bytes());
        for name in self.features.iter() {
            hasher.update((name.len() as u64).to_be_bytes());
            hasher.update(name.as_bytes());
        }
        for node in &self.nodes {
            match node {
                TreeNode::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    hasher.update([0u8]);
                    hasher.update((*feature_index as u64).to_be_bytes());
                    hasher.update(threshold.to_bits().to_be_bytes());
                    hasher.update((*left as u64).to_be_bytes());
                    hasher.update((*right as u64).to_be_bytes());
                }
                TreeNode::Leaf {
                    class_weights,
                    predicted_class,
                } => {
                    hasher.update([1u8]);
                    hasher.update(predicted_class.to_be_bytes());
                    hasher.update((class_weights.len() as u64).to_be_bytes());
                    for weight in class_weights {
                        hasher.update(weight.to_bits().to_be_bytes());
                    }
                }
            }
        }
        hex::encode(hasher.finalize())
    }
}

/// First index of the maximum, like `numpy.argmax`
fn argmax(values: impl Iterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
