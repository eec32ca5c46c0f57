//! Circuit program representation
//!
//! Statements are kept structured until [`emit::render`] turns them into
//! Circom text, so the simulator and the tests can inspect exactly what
//! will be constrained.

pub mod aggregate;
pub mod comparator;
pub mod emit;
pub mod eval;
pub mod paths;

use std::fmt;

use crate::fixed_point::{ResolvedThreshold, ThresholdKind};
use crate::tree::NodeId;

pub use aggregate::LeafOutput;
pub use comparator::ComparatorRegistry;
pub use paths::{Factor, LeafPath};

/// Name of the private input array
pub const INPUT_SIGNAL: &str = "features";
/// Name of the single output signal
pub const OUTPUT_SIGNAL: &str = "out_prediction";

/// An operand that is at most linear in one signal
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    Signal(String),
    /// `1 - x`, the complement of a boolean signal
    Complement(String),
    Constant(i128),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Signal(name) => write!(f, "{}", name),
            Term::Complement(name) => write!(f, "(1 - {})", name),
            Term::Constant(value) => write!(f, "{}", value),
        }
    }
}

/// Right-hand side of one constraint. Never more than one product.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Term(Term),
    Mul(Term, Term),
    Add(Term, Term),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Term(t) => write!(f, "{}", t),
            Expr::Mul(a, b) => write!(f, "{} * {}", a, b),
            Expr::Add(a, b) => write!(f, "{} + {}", a, b),
        }
    }
}

/// One `LessEqThan` instance for a split node
#[derive(Clone, Debug, PartialEq)]
pub struct ComparatorGadget {
    pub node: NodeId,
    pub feature_index: usize,
    pub feature_name: String,
    pub threshold: ResolvedThreshold,
    pub bits: u32,
}

impl ComparatorGadget {
    pub fn component(&self) -> String {
        format!("comp_node{}", self.node)
    }

    /// Boolean signal: 1 when the sample goes left
    pub fn output(&self) -> String {
        format!("comp_node{}_out", self.node)
    }

    pub fn describe(&self) -> String {
        match self.threshold.kind {
            ThresholdKind::Scaled => format!(
                "(Original Threshold: {:.4}, Fixed: {})",
                self.threshold.raw, self.threshold.fixed
            ),
            ThresholdKind::BinaryZero => format!(
                "(Original Threshold: {:.4} for binary {}, \
                 Effective Fixed Threshold for '==0' logic: {})",
                self.threshold.raw, self.feature_name, self.threshold.fixed
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Comment(String),
    Blank,
    Comparator(ComparatorGadget),
    /// `signal name <== expr;`
    Signal { name: String, expr: Expr },
    /// `target <== expr;` for an already declared signal
    Assign { target: String, expr: Expr },
    /// `lhs === rhs;`
    Constrain { lhs: Term, rhs: Term },
}

impl Statement {
    pub fn signal(name: impl Into<String>, expr: Expr) -> Self {
        Statement::Signal {
            name: name.into(),
            expr,
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Statement::Comment(text.into())
    }
}

/// Everything rendered outside the statement list
#[derive(Clone, Debug, PartialEq)]
pub struct ProgramHeader {
    pub pragma_version: String,
    pub template_name: String,
    pub include_path: String,
    pub fingerprint: String,
    pub feature_names: Vec<String>,
    /// Input features passed as raw 0/1
    pub binary_inputs: Vec<String>,
    pub multiplier: u64,
    pub offset: u64,
}

/// A compiled decision tree, ready to render
#[derive(Clone, Debug, PartialEq)]
pub struct CircuitProgram {
    pub header: ProgramHeader,
    pub statements: Vec<Statement>,
    /// One entry per leaf, left to right
    pub leaves: Vec<LeafOutput>,
}

impl CircuitProgram {
    pub fn feature_count(&self) -> usize {
        self.header.feature_names.len()
    }

    pub fn comparators(&self) -> impl Iterator<Item = &ComparatorGadget> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Comparator(gadget) => Some(gadget),
            _ => None,
        })
    }

    /// Render as Circom source
    pub fn to_circom(&self) -> String {
        emit::render(self)
    }
}
