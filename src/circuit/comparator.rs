//! Comparator gadgets, one per split node
//!
//! `LessEqThan(n)` comes from circomlib. It decomposes `in[0] + 2^n - in[1]`
//! into `n + 1` bits and does not range-check the operands themselves: the
//! result is only sound when both are below `2^n`. Thresholds are checked at
//! compile time; keeping `features` in range is up to whoever builds the
//! witness (see [`crate::input::CircuitInput`]).

use std::collections::BTreeMap;

use tracing::trace;

use super::{ComparatorGadget, Statement};
use crate::error::Result;
use crate::fixed_point::ThresholdResolver;
use crate::tree::{DecisionTree, NodeId, TreeNode};

/// Gadgets in pre-order, addressable by node id
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComparatorRegistry {
    gadgets: Vec<ComparatorGadget>,
    by_node: BTreeMap<NodeId, usize>,
}

impl ComparatorRegistry {
    /// Resolve every split threshold and register its gadget.
    ///
    /// Walks node, left subtree, right subtree, so the registry order is the
    /// order the gadgets appear in the circuit.
    pub fn build(tree: &DecisionTree, resolver: &ThresholdResolver<'_>, bits: u32) -> Result<Self> {
        let mut registry = Self::default();
        registry.visit(tree, 0, resolver, bits)?;
        Ok(registry)
    }

    fn visit(
        &mut self,
        tree: &DecisionTree,
        node: NodeId,
        resolver: &ThresholdResolver<'_>,
        bits: u32,
    ) -> Result<()> {
        let TreeNode::Split {
            feature_index,
            threshold,
            left,
            right,
        } = tree.node(node)
        else {
            return Ok(());
        };

        let feature_name = tree.feature_name(*feature_index);
        let resolved = resolver.resolve(node, feature_name, *threshold)?;
        trace!(
            node,
            feature = feature_name,
            raw = *threshold,
            fixed = %resolved.fixed,
            "Registered comparator"
        );

        self.by_node.insert(node, self.gadgets.len());
        self.gadgets.push(ComparatorGadget {
            node,
            feature_index: *feature_index,
            feature_name: feature_name.to_string(),
            threshold: resolved,
            bits,
        });

        self.visit(tree, *left, resolver, bits)?;
        self.visit(tree, *right, resolver, bits)
    }

    pub fn get(&self, node: NodeId) -> Option<&ComparatorGadget> {
        self.by_node.get(&node).map(|&i| &self.gadgets[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComparatorGadget> {
        self.gadgets.iter()
    }

    pub fn len(&self) -> usize {
        self.gadgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gadgets.is_empty()
    }

    /// Append one block per gadget
    pub fn emit(&self, out: &mut Vec<Statement>) {
        for gadget in &self.gadgets {
            out.push(Statement::Comparator(gadget.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::{BinaryFeatures, FixedPointConfig, ThresholdKind};
    use crate::tree::FeatureSet;

    fn tree() -> DecisionTree {
        // 0: Torque <= 1.2 ? (2: Type_L <= 0.5 ? 3 : 4) : 1
        DecisionTree::new(
            vec![
                TreeNode::split(0, 1.2, 2, 1),
                TreeNode::leaf(vec![0, 3]),
                TreeNode::split(1, 0.5, 3, 4),
                TreeNode::leaf(vec![5, 0]),
                TreeNode::leaf(vec![1, 4]),
            ],
            FeatureSet::new(["Torque [Nm]", "Type_L"]),
        )
        .unwrap()
    }

    #[test]
    fn test_registry_preorder() {
        let config = FixedPointConfig::new(100, 32);
        let binary = BinaryFeatures::default();
        let resolver = ThresholdResolver::new(&config, &binary);
        let registry = ComparatorRegistry::build(&tree(), &resolver, 32).unwrap();

        let nodes: Vec<NodeId> = registry.iter().map(|g| g.node).collect();
        assert_eq!(nodes, vec![0, 2]);
        assert_eq!(registry.len(), 2);

        let root = registry.get(0).unwrap();
        assert_eq!(root.threshold.fixed, 120);
        assert_eq!(root.output(), "comp_node0_out");

        let binary_split = registry.get(2).unwrap();
        assert_eq!(binary_split.threshold.kind, ThresholdKind::BinaryZero);
        assert_eq!(binary_split.threshold.fixed, 0);

        assert!(registry.get(1).is_none());
    }

    #[test]
    fn test_leaf_root_has_no_gadgets() {
        let tree =
            DecisionTree::new(vec![TreeNode::leaf(vec![1])], FeatureSet::new(["a"])).unwrap();
        let config = FixedPointConfig::default();
        let binary = BinaryFeatures::none();
        let resolver = ThresholdResolver::new(&config, &binary);
        let registry = ComparatorRegistry::build(&tree, &resolver, 32).unwrap();
        assert!(registry.is_empty());
    }
}
