//! Error types for the decision tree compiler

use thiserror::Error;

use crate::tree::NodeId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Empty tree: nothing to compile")]
    EmptyTree,

    #[error("Malformed tree at node {node}: {reason}")]
    MalformedTree { node: NodeId, reason: String },

    #[error(
        "Threshold overflow at node {node} ({feature}): raw threshold {raw}, \
         resolved {resolved} does not fit in {bits} bits"
    )]
    ThresholdOverflow {
        node: NodeId,
        feature: String,
        raw: f64,
        resolved: i128,
        bits: u32,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Circuit evaluation failed: {0}")]
    Evaluation(String),
}

impl CompileError {
    pub(crate) fn malformed(node: NodeId, reason: impl Into<String>) -> Self {
        CompileError::MalformedTree {
            node,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
