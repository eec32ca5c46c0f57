//! Leaf path conditions
//!
//! A field circuit has no branches: each leaf gets a boolean "reached"
//! signal, the product of the comparator outcomes on its path. Products are
//! chained two factors at a time so every constraint stays quadratic.

use tracing::trace;

use super::{ComparatorRegistry, Expr, Statement, Term};
use crate::error::{CompileError, Result};
use crate::tree::{DecisionTree, NodeId, TreeNode};

/// One decision on the way to a leaf
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Factor {
    pub node: NodeId,
    pub signal: String,
    /// Right branch: `1 - signal`
    pub complemented: bool,
}

impl Factor {
    pub fn term(&self) -> Term {
        if self.complemented {
            Term::Complement(self.signal.clone())
        } else {
            Term::Signal(self.signal.clone())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafPath {
    pub leaf: NodeId,
    /// Root first
    pub factors: Vec<Factor>,
    pub predicted_class: u64,
}

impl LeafPath {
    pub fn active_signal(&self) -> String {
        format!("path_leaf{}_active", self.leaf)
    }

    fn step_signal(&self, step: usize) -> String {
        format!("leaf{}_pathprod_step{}", self.leaf, step)
    }

    /// Append the product chain and return the leaf-active signal name.
    ///
    /// No factors (the root is a leaf) gives constant 1; a single factor is
    /// aliased directly.
    pub fn emit(&self, out: &mut Vec<Statement>) -> String {
        let active = self.active_signal();

        let expr = match self.factors.as_slice() {
            [] => Expr::Term(Term::Constant(1)),
            [only] => Expr::Term(only.term()),
            [first, rest @ ..] => {
                let mut current = first.term();
                for (step, factor) in rest.iter().enumerate() {
                    let name = self.step_signal(step);
                    out.push(Statement::signal(&name, Expr::Mul(current, factor.term())));
                    current = Term::Signal(name);
                }
                Expr::Term(current)
            }
        };

        out.push(Statement::signal(&active, expr));
        active
    }
}

/// Walk the tree and record the factor list of every leaf, left to right.
///
/// Reads comparator outputs from `registry`, which must already hold every
/// split node.
pub fn collect_leaf_paths(
    tree: &DecisionTree,
    registry: &ComparatorRegistry,
) -> Result<Vec<LeafPath>> {
    let mut paths = Vec::with_capacity(tree.leaf_count());
    walk(tree, registry, 0, &mut Vec::new(), &mut paths)?;
    Ok(paths)
}

fn walk(
    tree: &DecisionTree,
    registry: &ComparatorRegistry,
    node: NodeId,
    factors: &mut Vec<Factor>,
    paths: &mut Vec<LeafPath>,
) -> Result<()> {
    match tree.node(node) {
        TreeNode::Leaf {
            predicted_class, ..
        } => {
            trace!(leaf = node, depth = factors.len(), class = *predicted_class, "Leaf path");
            paths.push(LeafPath {
                leaf: node,
                factors: factors.clone(),
                predicted_class: *predicted_class,
            });
            Ok(())
        }
        TreeNode::Split { left, right, .. } => {
            let signal = registry
                .get(node)
                .map(|gadget| gadget.output())
                .ok_or_else(|| CompileError::malformed(node, "split has no comparator"))?;

            factors.push(Factor {
                node,
                signal: signal.clone(),
                complemented: false,
            });
            walk(tree, registry, *left, factors, paths)?;
            factors.pop();

            factors.push(Factor {
                node,
                signal,
                complemented: true,
            });
            walk(tree, registry, *right, factors, paths)?;
            factors.pop();

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::{BinaryFeatures, FixedPointConfig, ThresholdResolver};
    use crate::tree::FeatureSet;

    fn factor(node: NodeId, complemented: bool) -> Factor {
        Factor {
            node,
            signal: format!("comp_node{}_out", node),
            complemented,
        }
    }

    #[test]
    fn test_collect_paths() {
        // 0: f0 ? 1 : (2: f1 ? 3 : 4)
        let tree = DecisionTree::new(
            vec![
                TreeNode::split(0, 0.5, 1, 2),
                TreeNode::leaf(vec![1, 0]),
                TreeNode::split(1, 1.2, 3, 4),
                TreeNode::leaf(vec![0, 1]),
                TreeNode::leaf(vec![1, 0]),
            ],
            FeatureSet::new(["f0", "f1"]),
        )
        .unwrap();
        let config = FixedPointConfig::new(100, 32);
        let binary = BinaryFeatures::none();
        let resolver = ThresholdResolver::new(&config, &binary);
        let registry = ComparatorRegistry::build(&tree, &resolver, 32).unwrap();

        let paths = collect_leaf_paths(&tree, &registry).unwrap();
        assert_eq!(paths.len(), 3);

        assert_eq!(paths[0].leaf, 1);
        assert_eq!(paths[0].factors, vec![factor(0, false)]);
        assert_eq!(paths[0].predicted_class, 0);

        assert_eq!(paths[1].leaf, 3);
        assert_eq!(paths[1].factors, vec![factor(0, true), factor(2, false)]);
        assert_eq!(paths[1].predicted_class, 1);

        assert_eq!(paths[2].leaf, 4);
        assert_eq!(paths[2].factors, vec![factor(0, true), factor(2, true)]);
    }

    #[test]
    fn test_missing_comparator_is_an_error() {
        let tree = DecisionTree::new(
            vec![TreeNode::split(0, 0.5, 1, 2), TreeNode::leaf(vec![1]), TreeNode::leaf(vec![1])],
            FeatureSet::new(["f0"]),
        )
        .unwrap();
        let err = collect_leaf_paths(&tree, &ComparatorRegistry::default()).unwrap_err();
        assert!(matches!(err, CompileError::MalformedTree { node: 0, .. }));
    }

    #[test]
    fn test_emit_empty_path() {
        let path = LeafPath {
            leaf: 0,
            factors: vec![],
            predicted_class: 1,
        };
        let mut out = Vec::new();
        assert_eq!(path.emit(&mut out), "path_leaf0_active");
        assert_eq!(
            out,
            vec![Statement::signal("path_leaf0_active", Expr::Term(Term::Constant(1)))]
        );
    }

    #[test]
    fn test_emit_single_factor() {
        let path = LeafPath {
            leaf: 2,
            factors: vec![factor(0, true)],
            predicted_class: 0,
        };
        let mut out = Vec::new();
        path.emit(&mut out);
        assert_eq!(
            out,
            vec![Statement::signal(
                "path_leaf2_active",
                Expr::Term(Term::Complement("comp_node0_out".into()))
            )]
        );
    }

    #[test]
    fn test_emit_pairwise_chain() {
        let path = LeafPath {
            leaf: 7,
            factors: vec![factor(0, false), factor(1, true), factor(4, false)],
            predicted_class: 1,
        };
        let mut out = Vec::new();
        path.emit(&mut out);

        assert_eq!(
            out,
            vec![
                Statement::signal(
                    "leaf7_pathprod_step0",
                    Expr::Mul(
                        Term::Signal("comp_node0_out".into()),
                        Term::Complement("comp_node1_out".into())
                    )
                ),
                Statement::signal(
                    "leaf7_pathprod_step1",
                    Expr::Mul(
                        Term::Signal("leaf7_pathprod_step0".into()),
                        Term::Signal("comp_node4_out".into())
                    )
                ),
                Statement::signal(
                    "path_leaf7_active",
                    Expr::Term(Term::Signal("leaf7_pathprod_step1".into()))
                ),
            ]
        );
    }
}
