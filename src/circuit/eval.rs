//! Witness simulation
//!
//! Evaluates a [`CircuitProgram`] over plain integers, the way the witness
//! generator would for small values. Every statement other than a comparator
//! is one addition or multiplication.
//!
//! Comparators here are stricter than circomlib's `LessEqThan`: an operand
//! outside `n` bits is an error, where the real gadget would accept it and
//! may output a wrong bit.

use std::collections::BTreeMap;

use tracing::debug;

use super::{CircuitProgram, Expr, Statement, Term, OUTPUT_SIGNAL};
use crate::error::{CompileError, Result};
use crate::fixed_point::fits_in_bits;
use crate::tree::NodeId;

/// Witness values of one evaluation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Simulation {
    pub output: i128,
    /// Leaves whose active signal is 1
    pub active_leaves: Vec<NodeId>,
    pub signals: BTreeMap<String, i128>,
}

/// Run `program` on encoded `inputs` (one integer per feature).
pub fn simulate(program: &CircuitProgram, inputs: &[i128]) -> Result<Simulation> {
    if inputs.len() != program.feature_count() {
        return Err(CompileError::InvalidInput(format!(
            "expected {} inputs, got {}",
            program.feature_count(),
            inputs.len()
        )));
    }

    let mut signals: BTreeMap<String, i128> = BTreeMap::new();

    for statement in &program.statements {
        match statement {
            Statement::Comment(_) | Statement::Blank => {}
            Statement::Comparator(gadget) => {
                let value = inputs[gadget.feature_index];
                let threshold = gadget.threshold.fixed;
                for operand in [value, threshold] {
                    if !fits_in_bits(operand, gadget.bits) {
                        return Err(CompileError::Evaluation(format!(
                            "{}: operand {} outside {} bits",
                            gadget.component(),
                            operand,
                            gadget.bits
                        )));
                    }
                }
                define(&mut signals, gadget.output(), (value <= threshold) as i128)?;
            }
            Statement::Signal { name, expr } => {
                let value = eval_expr(expr, &signals)?;
                define(&mut signals, name.clone(), value)?;
            }
            Statement::Assign { target, expr } => {
                let value = eval_expr(expr, &signals)?;
                define(&mut signals, target.clone(), value)?;
            }
            Statement::Constrain { lhs, rhs } => {
                let (l, r) = (eval_term(lhs, &signals)?, eval_term(rhs, &signals)?);
                if l != r {
                    return Err(CompileError::Evaluation(format!(
                        "constraint {} === {} failed ({} != {})",
                        lhs, rhs, l, r
                    )));
                }
            }
        }
    }

    let output = *signals
        .get(OUTPUT_SIGNAL)
        .ok_or_else(|| CompileError::Evaluation(format!("{} never assigned", OUTPUT_SIGNAL)))?;

    let active_leaves = program
        .leaves
        .iter()
        .filter(|leaf| signals.get(&leaf.active) == Some(&1))
        .map(|leaf| leaf.leaf)
        .collect();

    debug!(output = %output, "Simulated circuit");

    Ok(Simulation {
        output,
        active_leaves,
        signals,
    })
}

fn define(signals: &mut BTreeMap<String, i128>, name: String, value: i128) -> Result<()> {
    if signals.contains_key(&name) {
        return Err(CompileError::Evaluation(format!("signal {} assigned twice", name)));
    }
    signals.insert(name, value);
    Ok(())
}

fn eval_term(term: &Term, signals: &BTreeMap<String, i128>) -> Result<i128> {
    let lookup = |name: &str| {
        signals.get(name).copied().ok_or_else(|| {
            CompileError::Evaluation(format!("signal {} used before assignment", name))
        })
    };
    match term {
        Term::Signal(name) => lookup(name),
        Term::Complement(name) => Ok(1 - lookup(name)?),
        Term::Constant(value) => Ok(*value),
    }
}

fn eval_expr(expr: &Expr, signals: &BTreeMap<String, i128>) -> Result<i128> {
    let overflow = || CompileError::Evaluation(format!("overflow evaluating {}", expr));
    match expr {
        Expr::Term(t) => eval_term(t, signals),
        Expr::Mul(a, b) => eval_term(a, signals)?
            .checked_mul(eval_term(b, signals)?)
            .ok_or_else(overflow),
        Expr::Add(a, b) => eval_term(a, signals)?
            .checked_add(eval_term(b, signals)?)
            .ok_or_else(overflow),
    }
}
