//! Human-readable rules of a decision tree

use crate::tree::{DecisionTree, NodeId, TreeNode};

/// Display names for predicted classes; falls back to `class <k>`
#[derive(Clone, Debug, Default)]
pub struct ClassNames(Vec<String>);

impl ClassNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn name(&self, class: u64) -> String {
        self.0
            .get(class as usize)
            .cloned()
            .unwrap_or_else(|| format!("class {}", class))
    }
}

/// Indented listing of every split and leaf, left branch first.
pub fn render_tree(tree: &DecisionTree, classes: &ClassNames) -> Vec<String> {
    let mut lines = Vec::new();
    render_node(tree, classes, 0, 0, &mut lines);
    lines
}

fn render_node(
    tree: &DecisionTree,
    classes: &ClassNames,
    node: NodeId,
    depth: usize,
    lines: &mut Vec<String>,
) {
    let indent = "  ".repeat(depth);
    match tree.node(node) {
        TreeNode::Leaf {
            class_weights,
            predicted_class,
        } => {
            lines.push(format!(
                "{}LEAF: Predict {} (Samples: {}, Values: {})",
                indent,
                classes.name(*predicted_class),
                weight(class_weights.iter().sum()),
                weights(class_weights)
            ));
        }
        TreeNode::Split {
            feature_index,
            threshold,
            left,
            right,
        } => {
            let feature = tree.feature_name(*feature_index);
            lines.push(format!("{}NODE {}: If {} <= {:.4}", indent, node, feature, threshold));
            render_node(tree, classes, *left, depth + 1, lines);
            lines.push(format!(
                "{}NODE {}: Else (If {} > {:.4})",
                indent, node, feature, threshold
            ));
            render_node(tree, classes, *right, depth + 1, lines);
        }
    }
}

/// One `IF ... THEN Class: ...` rule per leaf, left to right.
pub fn extract_rules(tree: &DecisionTree, classes: &ClassNames) -> Vec<String> {
    let mut rules = Vec::with_capacity(tree.leaf_count());
    collect(tree, classes, 0, &mut Vec::new(), &mut rules);
    rules
}

fn collect(
    tree: &DecisionTree,
    classes: &ClassNames,
    node: NodeId,
    conditions: &mut Vec<String>,
    rules: &mut Vec<String>,
) {
    match tree.node(node) {
        TreeNode::Leaf {
            class_weights,
            predicted_class,
        } => {
            let samples: f64 = class_weights.iter().sum();
            let purity = if samples > 0.0 {
                class_weights[*predicted_class as usize] / samples
            } else {
                0.0
            };
            let premise = if conditions.is_empty() {
                "ALWAYS".to_string()
            } else {
                conditions.join(" AND ")
            };
            rules.push(format!(
                "{} THEN Class: {} (Samples: {}, Purity: {:.2}, Values: {})",
                premise,
                classes.name(*predicted_class),
                weight(samples),
                purity,
                weights(class_weights)
            ));
        }
        TreeNode::Split {
            feature_index,
            threshold,
            left,
            right,
        } => {
            let feature = tree.feature_name(*feature_index);

            conditions.push(format!("IF ({} <= {:.4})", feature, threshold));
            collect(tree, classes, *left, conditions, rules);
            conditions.pop();

            conditions.push(format!("IF ({} > {:.4})", feature, threshold));
            collect(tree, classes, *right, conditions, rules);
            conditions.pop();
        }
    }
}

/// Whole counts print as integers, fractions to at most 4 decimals
fn weight(w: f64) -> String {
    format!("{}", (w * 1e4).round() / 1e4)
}

fn weights(ws: &[f64]) -> String {
    let parts: Vec<String> = ws.iter().map(|&w| weight(w)).collect();
    format!("[{}]", parts.join(", "))
}
