//! Output aggregation
//!
//! `out = sum(active_i * class_i)`. Leaf paths partition the input space, so
//! exactly one `active_i` is 1 and the sum is that leaf's class.

use super::{Expr, LeafPath, Statement, Term, OUTPUT_SIGNAL};
use crate::tree::NodeId;

/// Signals emitted for one leaf
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafOutput {
    pub leaf: NodeId,
    pub active: String,
    pub contribution: String,
    pub predicted_class: u64,
}

/// Emit the leaf's comment and `contribution <== active * class`.
pub fn emit_contribution(path: &LeafPath, active: String, out: &mut Vec<Statement>) -> LeafOutput {
    let contribution = format!("leaf{}_contribution", path.leaf);

    out.push(Statement::comment(format!(
        "Leaf {}: Prediction={}, PathSignal: {}",
        path.leaf, path.predicted_class, active
    )));
    out.push(Statement::signal(
        &contribution,
        Expr::Mul(
            Term::Signal(active.clone()),
            Term::Constant(path.predicted_class as i128),
        ),
    ));

    LeafOutput {
        leaf: path.leaf,
        active,
        contribution,
        predicted_class: path.predicted_class,
    }
}

/// Chain `terms` through pairwise additions named `{prefix}_{k}`.
///
/// Returns the term holding the total: the only term itself when there is
/// one, `0` when there are none.
pub fn emit_sum(terms: &[String], prefix: &str, out: &mut Vec<Statement>) -> Term {
    let Some((first, rest)) = terms.split_first() else {
        return Term::Constant(0);
    };

    let mut total = Term::Signal(first.clone());
    for (k, term) in rest.iter().enumerate() {
        let partial = format!("{}_{}", prefix, k);
        out.push(Statement::signal(
            &partial,
            Expr::Add(total, Term::Signal(term.clone())),
        ));
        total = Term::Signal(partial);
    }
    total
}

/// Sum every contribution into the output signal.
pub fn emit_output(leaves: &[LeafOutput], out: &mut Vec<Statement>) {
    let contributions: Vec<String> = leaves.iter().map(|l| l.contribution.clone()).collect();
    let total = emit_sum(&contributions, "prediction_partial_sum", out);
    out.push(Statement::Assign {
        target: OUTPUT_SIGNAL.to_string(),
        expr: Expr::Term(total),
    });
}

/// Constrain the leaf-active signals to sum to exactly 1.
///
/// Redundant for a well-formed tree; it turns a broken partition into an
/// unsatisfiable witness instead of a silently wrong output.
pub fn emit_single_leaf_assertion(leaves: &[LeafOutput], out: &mut Vec<Statement>) {
    out.push(Statement::comment("Exactly one leaf is reached"));
    let actives: Vec<String> = leaves.iter().map(|l| l.active.clone()).collect();
    let total = emit_sum(&actives, "leaf_active_sum", out);
    out.push(Statement::Constrain {
        lhs: total,
        rhs: Term::Constant(1),
    });
}
