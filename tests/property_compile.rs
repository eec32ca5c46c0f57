//! Property tests for tree compilation
//!
//! Random trees over three scaled features and one one-hot feature:
//! - Compilation is deterministic
//! - Exactly one leaf is active for any in-range input
//! - The circuit output equals the float model's prediction
//! - No constraint has more than one product

use dt_circom::{
    simulate, CircuitInput, Compiler, CompilerOptions, DecisionTree, FeatureSet, FixedPointConfig,
    TreeNode,
};
use proptest::collection::vec;
use proptest::prelude::*;

const FEATURES: [&str; 4] = ["air_temp", "torque", "tool_wear", "Type_L"];
const MAX_DEPTH: usize = 4;

// =============================================================================
// Strategy Helpers
// =============================================================================

/// Pre-order tree driven by a byte stream. Thresholds sit on a 0.1 grid
/// in [0, 2]; splits on `Type_L` always use 0.5.
fn build(bytes: &mut impl Iterator<Item = u8>, depth: usize, nodes: &mut Vec<TreeNode>) -> usize {
    let id = nodes.len();
    nodes.push(TreeNode::leaf(vec![1]));
    let b = bytes.next().unwrap_or(0);

    if depth < MAX_DEPTH && b % 3 != 0 {
        let feature = (b as usize / 3) % FEATURES.len();
        let threshold = if feature == 3 {
            0.5
        } else {
            ((b as usize / 12) % 21) as f64 / 10.0
        };
        let left = build(bytes, depth + 1, nodes);
        let right = build(bytes, depth + 1, nodes);
        nodes[id] = TreeNode::split(feature, threshold, left, right);
    } else {
        let mut counts = vec![1, 1, 1];
        counts[(b as usize / 3) % 3] = 5;
        nodes[id] = TreeNode::leaf(counts);
    }
    id
}

fn random_tree() -> impl Strategy<Value = DecisionTree> {
    vec(any::<u8>(), 1..64).prop_map(|bytes| {
        let mut nodes = Vec::new();
        build(&mut bytes.into_iter(), 0, &mut nodes);
        DecisionTree::new(nodes, FeatureSet::new(FEATURES)).unwrap()
    })
}

/// Scaled values on a 0.05 grid in [0, 2.05], one-hot value 0 or 1
fn sample() -> impl Strategy<Value = Vec<f64>> {
    (vec(0u32..=41, 3), 0u32..=1).prop_map(|(grid, one_hot)| {
        let mut values: Vec<f64> = grid.into_iter().map(|j| j as f64 / 20.0).collect();
        values.push(one_hot as f64);
        values
    })
}

fn options(assert_single_leaf: bool) -> CompilerOptions {
    CompilerOptions {
        fixed_point: FixedPointConfig::new(100, 16),
        assert_single_leaf,
        ..CompilerOptions::default()
    }
}

// =============================================================================
// Compilation Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_compilation_deterministic(tree in random_tree()) {
        let compiler = Compiler::new(options(false)).unwrap();
        let a = compiler.compile_to_circom(&tree).unwrap();
        let b = compiler.compile_to_circom(&tree).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_one_gadget_per_split_one_output_per_leaf(tree in random_tree()) {
        let program = Compiler::new(options(false)).unwrap().compile(&tree).unwrap();
        prop_assert_eq!(program.comparators().count(), tree.split_count());
        prop_assert_eq!(program.leaves.len(), tree.leaf_count());

        let text = program.to_circom();
        prop_assert_eq!(text.matches("LessEqThan(16)").count(), tree.split_count());
        prop_assert_eq!(text.matches("_contribution <== ").count(), tree.leaf_count());
    }

    #[test]
    fn prop_degree_at_most_two(tree in random_tree()) {
        let text = Compiler::new(options(true)).unwrap().compile_to_circom(&tree).unwrap();
        for line in text.lines().filter(|l| l.contains("<==") || l.contains("===")) {
            prop_assert!(line.matches('*').count() <= 1, "{}", line);
        }
    }

    #[test]
    fn prop_circuit_matches_model(tree in random_tree(), values in sample()) {
        let options = options(true);
        let program = Compiler::new(options.clone()).unwrap().compile(&tree).unwrap();
        let input = CircuitInput::prepare_ordered(tree.features(), &values, &options).unwrap();

        let sim = simulate(&program, &input.features).unwrap();
        let (leaf, class) = tree.predict_leaf(&values).unwrap();

        prop_assert_eq!(sim.active_leaves, vec![leaf]);
        prop_assert_eq!(sim.output, class as i128);
    }
}
