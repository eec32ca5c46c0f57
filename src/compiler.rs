//! ╔══════════════════════════════════════════════════════════════════╗
//! ║   DECISION TREE → CIRCOM COMPILER                                ║
//! ║                                                                  ║
//! ║   Pass 1: comparator per split node (pre-order registry)         ║
//! ║   Pass 2: factor list per leaf (reads the finished registry)     ║
//! ║   Then:   path products, contributions, output sum               ║
//! ╚══════════════════════════════════════════════════════════════════╝

use tracing::{debug, info, instrument};

use crate::circuit::{
    aggregate, paths, CircuitProgram, ComparatorRegistry, LeafOutput, LeafPath, ProgramHeader,
    Statement,
};
use crate::error::{CompileError, Result};
use crate::fixed_point::{BinaryFeatures, FixedPointConfig, ThresholdResolver};
use crate::tree::DecisionTree;

pub const DEFAULT_TEMPLATE_NAME: &str = "DecisionTree";
pub const DEFAULT_INCLUDE_PATH: &str = "../../node_modules/circomlib/circuits/comparators.circom";
pub const DEFAULT_PRAGMA_VERSION: &str = "2.1.5";

/// Circom keywords plus the templates and functions `comparators.circom`
/// pulls in; a template with one of these names does not compile.
const RESERVED_NAMES: &[&str] = &[
    "signal",
    "input",
    "output",
    "public",
    "template",
    "component",
    "var",
    "function",
    "return",
    "if",
    "else",
    "for",
    "while",
    "do",
    "log",
    "assert",
    "include",
    "pragma",
    "circom",
    "custom_templates",
    "custom",
    "parallel",
    "bus",
    "main",
    "IsZero",
    "IsEqual",
    "ForceEqualIfEnabled",
    "LessThan",
    "LessEqThan",
    "GreaterThan",
    "GreaterEqThan",
    "Num2Bits",
    "Num2Bits_strict",
    "Num2BitsNeg",
    "Bits2Num",
    "Bits2Num_strict",
    "BinSum",
    "nbits",
    "CompConstant",
    "AliasCheck",
];

/// Everything that shapes the generated circuit
#[derive(Clone, Debug, PartialEq)]
pub struct CompilerOptions {
    pub fixed_point: FixedPointConfig,
    pub binary_features: BinaryFeatures,
    pub template_name: String,
    /// Path of circomlib's `comparators.circom` as seen from the output file
    pub include_path: String,
    pub pragma_version: String,
    /// Emit `sum(leaf_active) === 1`
    pub assert_single_leaf: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            fixed_point: FixedPointConfig::default(),
            binary_features: BinaryFeatures::default(),
            template_name: DEFAULT_TEMPLATE_NAME.to_string(),
            include_path: DEFAULT_INCLUDE_PATH.to_string(),
            pragma_version: DEFAULT_PRAGMA_VERSION.to_string(),
            assert_single_leaf: false,
        }
    }
}

impl CompilerOptions {
    pub fn validate(&self) -> Result<()> {
        self.fixed_point.validate()?;

        let epsilon = self.binary_features.epsilon();
        if !(epsilon.is_finite() && epsilon > 0.0 && epsilon < 0.5) {
            return Err(CompileError::InvalidConfig(format!(
                "binary epsilon {} outside (0, 0.5)",
                epsilon
            )));
        }
        if !is_identifier(&self.template_name) {
            return Err(CompileError::InvalidConfig(format!(
                "template name {:?} is not a Circom identifier",
                self.template_name
            )));
        }
        if RESERVED_NAMES.contains(&self.template_name.as_str()) {
            return Err(CompileError::InvalidConfig(format!(
                "template name {:?} is reserved",
                self.template_name
            )));
        }
        if self.include_path.is_empty() || self.include_path.contains(['"', '\n', '\r']) {
            return Err(CompileError::InvalidConfig(format!(
                "include path {:?} cannot be quoted",
                self.include_path
            )));
        }
        if self.pragma_version.is_empty()
            || !self
                .pragma_version
                .chars()
                .all(|c| c.is_ascii_digit() || c == '.')
        {
            return Err(CompileError::InvalidConfig(format!(
                "pragma version {:?} is not a version number",
                self.pragma_version
            )));
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Stateless compiler; reusable across trees
#[derive(Clone, Debug)]
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile `tree` into a circuit program.
    #[instrument(skip_all, fields(nodes = tree.node_count(), leaves = tree.leaf_count()))]
    pub fn compile(&self, tree: &DecisionTree) -> Result<CircuitProgram> {
        let mut ctx = CompilationContext::new(tree, &self.options);
        ctx.register_comparators()?;
        ctx.collect_paths()?;
        let program = ctx.assemble();

        info!(
            comparators = program.comparators().count(),
            leaves = program.leaves.len(),
            statements = program.statements.len(),
            "Compiled decision tree"
        );
        Ok(program)
    }

    /// Compile and render in one step.
    pub fn compile_to_circom(&self, tree: &DecisionTree) -> Result<String> {
        Ok(self.compile(tree)?.to_circom())
    }
}

/// Intermediate state of one compilation. Never shared between calls.
struct CompilationContext<'a> {
    tree: &'a DecisionTree,
    options: &'a CompilerOptions,
    registry: ComparatorRegistry,
    paths: Vec<LeafPath>,
}

impl<'a> CompilationContext<'a> {
    fn new(tree: &'a DecisionTree, options: &'a CompilerOptions) -> Self {
        Self {
            tree,
            options,
            registry: ComparatorRegistry::default(),
            paths: Vec::new(),
        }
    }

    /// Pass 1
    fn register_comparators(&mut self) -> Result<()> {
        let resolver =
            ThresholdResolver::new(&self.options.fixed_point, &self.options.binary_features);
        self.registry = ComparatorRegistry::build(
            self.tree,
            &resolver,
            self.options.fixed_point.comparator_bit_width,
        )?;
        debug!(comparators = self.registry.len(), "Comparator pass done");
        Ok(())
    }

    /// Pass 2
    fn collect_paths(&mut self) -> Result<()> {
        self.paths = paths::collect_leaf_paths(self.tree, &self.registry)?;
        debug!(paths = self.paths.len(), "Path pass done");
        Ok(())
    }

    fn assemble(self) -> CircuitProgram {
        let mut statements = Vec::new();

        statements.push(Statement::comment("--- Comparators for Split Nodes ---"));
        self.registry.emit(&mut statements);

        statements.push(Statement::comment("--- Path Conditions and Leaf Value Aggregation ---"));
        let mut leaves: Vec<LeafOutput> = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let active = path.emit(&mut statements);
            leaves.push(aggregate::emit_contribution(path, active, &mut statements));
        }
        aggregate::emit_output(&leaves, &mut statements);

        if self.options.assert_single_leaf {
            aggregate::emit_single_leaf_assertion(&leaves, &mut statements);
        }

        let features = self.tree.features();
        let header = ProgramHeader {
            pragma_version: self.options.pragma_version.clone(),
            template_name: self.options.template_name.clone(),
            include_path: self.options.include_path.clone(),
            fingerprint: self.tree.fingerprint(),
            feature_names: features.iter().map(str::to_string).collect(),
            binary_inputs: features
                .iter()
                .filter(|name| self.options.binary_features.contains(name))
                .map(str::to_string)
                .collect(),
            multiplier: self.options.fixed_point.multiplier,
            offset: self.options.fixed_point.offset,
        };

        CircuitProgram {
            header,
            statements,
            leaves,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::eval::simulate;
    use crate::tree::{FeatureSet, TreeNode};

    /// Root f0 <= 0.5 → class 0; else f1 <= 1.2 → class 1, else class 0
    fn scenario_tree() -> DecisionTree {
        DecisionTree::new(
            vec![
                TreeNode::split(0, 0.5, 1, 2),
                TreeNode::leaf(vec![10, 0]),
                TreeNode::split(1, 1.2, 3, 4),
                TreeNode::leaf(vec![1, 6]),
                TreeNode::leaf(vec![7, 2]),
            ],
            FeatureSet::new(["sensor_a", "sensor_b"]),
        )
        .unwrap()
    }

    fn compiler(multiplier: u64) -> Compiler {
        Compiler::new(CompilerOptions {
            fixed_point: FixedPointConfig::new(multiplier, 32),
            ..CompilerOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let program = compiler(100).compile(&scenario_tree()).unwrap();

        let thresholds: Vec<i128> = program.comparators().map(|g| g.threshold.fixed).collect();
        assert_eq!(thresholds, vec![50, 120]);

        let classes: Vec<u64> = program.leaves.iter().map(|l| l.predicted_class).collect();
        assert_eq!(classes, vec![0, 1, 0]);

        let text = program.to_circom();
        assert_eq!(text.matches("_contribution <== ").count(), 3);
        assert!(text.contains("signal leaf1_contribution <== path_leaf1_active * 0;"));
        assert!(text.contains("signal leaf3_contribution <== path_leaf3_active * 1;"));
        assert!(text.contains("signal leaf4_contribution <== path_leaf4_active * 0;"));
        assert!(text.contains(
            "signal prediction_partial_sum_0 <== leaf1_contribution + leaf3_contribution;"
        ));
        assert!(text.contains(
            "signal prediction_partial_sum_1 <== prediction_partial_sum_0 + leaf4_contribution;"
        ));
        assert!(text.contains("    out_prediction <== prediction_partial_sum_1;"));
        assert!(text.contains(
            "signal leaf3_pathprod_step0 <== (1 - comp_node0_out) * comp_node2_out;"
        ));
    }

    #[test]
    fn test_scenario_simulation() {
        let program = compiler(100).compile(&scenario_tree()).unwrap();

        // (features, leaf, class)
        let cases = [
            ([50, 0], 1, 0),
            ([51, 120], 3, 1),
            ([51, 121], 4, 0),
            ([0, 999], 1, 0),
        ];
        for (inputs, leaf, class) in cases {
            let sim = simulate(&program, &inputs).unwrap();
            assert_eq!(sim.active_leaves, vec![leaf], "inputs {:?}", inputs);
            assert_eq!(sim.output, class, "inputs {:?}", inputs);
        }
    }

    #[test]
    fn test_deterministic_output() {
        let a = compiler(10_000).compile_to_circom(&scenario_tree()).unwrap();
        let b = compiler(10_000).compile_to_circom(&scenario_tree()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_root_leaf() {
        let tree =
            DecisionTree::new(vec![TreeNode::leaf(vec![2, 5])], FeatureSet::new(["x"])).unwrap();
        let program = compiler(100).compile(&tree).unwrap();
        let text = program.to_circom();

        assert!(text.contains("    signal path_leaf0_active <== 1;"));
        assert!(text.contains("    out_prediction <== leaf0_contribution;"));
        assert_eq!(simulate(&program, &[7]).unwrap().output, 1);
    }

    #[test]
    fn test_single_leaf_assertion() {
        let options = CompilerOptions {
            fixed_point: FixedPointConfig::new(100, 32),
            assert_single_leaf: true,
            ..CompilerOptions::default()
        };
        let program = Compiler::new(options).unwrap().compile(&scenario_tree()).unwrap();
        let text = program.to_circom();

        assert!(text.contains(
            "signal leaf_active_sum_0 <== path_leaf1_active + path_leaf3_active;"
        ));
        assert!(text.contains("    leaf_active_sum_1 === 1;"));
        assert!(simulate(&program, &[51, 3]).is_ok());
    }

    #[test]
    fn test_overflow_aborts() {
        let options = CompilerOptions {
            fixed_point: FixedPointConfig::new(10_000, 8),
            ..CompilerOptions::default()
        };
        let err = Compiler::new(options).unwrap().compile(&scenario_tree()).unwrap_err();
        assert!(matches!(err, CompileError::ThresholdOverflow { node: 0, resolved: 5000, .. }));
    }

    #[test]
    fn test_invalid_options() {
        let bad_name = CompilerOptions {
            template_name: "2Tree".into(),
            ..CompilerOptions::default()
        };
        assert!(matches!(Compiler::new(bad_name), Err(CompileError::InvalidConfig(_))));

        let bad_include = CompilerOptions {
            include_path: "a\"b".into(),
            ..CompilerOptions::default()
        };
        assert!(Compiler::new(bad_include).is_err());

        for reserved in ["signal", "component", "LessEqThan", "Num2Bits"] {
            let options = CompilerOptions {
                template_name: reserved.into(),
                ..CompilerOptions::default()
            };
            assert!(
                matches!(Compiler::new(options), Err(CompileError::InvalidConfig(_))),
                "{}",
                reserved
            );
        }
        let custom = CompilerOptions {
            template_name: "MaintenanceTree_v2".into(),
            ..CompilerOptions::default()
        };
        assert!(Compiler::new(custom).is_ok());

        let bad_epsilon = CompilerOptions {
            binary_features: BinaryFeatures::new(["Type_L"], 0.0),
            ..CompilerOptions::default()
        };
        assert!(Compiler::new(bad_epsilon).is_err());
    }

    #[test]
    fn test_degree_bound() {
        let text = compiler(100).compile_to_circom(&scenario_tree()).unwrap();
        for line in text.lines().filter(|l| l.contains("<==") || l.contains("===")) {
            assert!(line.matches('*').count() <= 1, "{}", line);
        }
    }
}
