//! ╔══════════════════════════════════════════════════════════════════╗
//! ║   DT-CIRCOM: DECISION TREES AS ARITHMETIC CIRCUITS               ║
//! ║                                                                  ║
//! ║   tree artifact → comparators → path products → one output       ║
//! ║   Every constraint stays at degree ≤ 2                           ║
//! ╚══════════════════════════════════════════════════════════════════╝
//!
//! A trained binary decision tree is compiled into a Circom template whose
//! single output equals the class the tree predicts for the private
//! `features` input. Thresholds are fixed-point integers; one-hot inputs
//! are compared against zero.

pub mod circuit;
pub mod compiler;
pub mod error;
pub mod fixed_point;
pub mod input;
pub mod rules;
pub mod tree;

pub use circuit::eval::{simulate, Simulation};
pub use circuit::CircuitProgram;
pub use compiler::{Compiler, CompilerOptions};
pub use error::{CompileError, Result};
pub use fixed_point::{BinaryFeatures, FixedPointConfig};
pub use input::CircuitInput;
pub use rules::ClassNames;
pub use tree::{DecisionTree, FeatureSet, TreeArtifact, TreeNode};
