//! Circom serializer
//!
//! Output depends only on the program, so identical trees and options
//! render byte-for-byte identical modules.

use super::{CircuitProgram, ComparatorGadget, Statement, INPUT_SIGNAL, OUTPUT_SIGNAL};

const INDENT: &str = "    ";

/// Render the full module.
pub fn render(program: &CircuitProgram) -> String {
    let header = &program.header;
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("pragma circom {};", header.pragma_version));
    lines.push(String::new());
    lines.push("// Decision tree circuit generated programmatically".to_string());
    lines.push(format!("// Model fingerprint: sha256:{}", header.fingerprint));
    lines.push(String::new());
    lines.push(format!("include \"{}\";", header.include_path));
    lines.push(String::new());

    lines.push(format!("template {}(numFeatures) {{", header.template_name));
    lines.push(comment("--- Inputs ---"));
    lines.push(comment(&format!("Expected order: {}", header.feature_names.join(", "))));
    lines.push(comment(&format!(
        "Values should be scaled and multiplied by {}",
        header.multiplier
    )));
    if header.offset != 0 {
        lines.push(comment(&format!("then shifted by {}", header.offset)));
    }
    if !header.binary_inputs.is_empty() {
        lines.push(comment(&format!(
            "Binary features are passed as raw 0/1: {}",
            header.binary_inputs.join(", ")
        )));
    }
    lines.push(format!("{}signal input {}[numFeatures];", INDENT, INPUT_SIGNAL));
    lines.push(String::new());
    lines.push(comment("--- Output ---"));
    lines.push(comment("Predicted class of the reached leaf"));
    lines.push(format!("{}signal output {};", INDENT, OUTPUT_SIGNAL));
    lines.push(String::new());

    for statement in &program.statements {
        render_statement(statement, &mut lines);
    }

    lines.push("}".to_string());
    lines.push(String::new());
    lines.push("// To use this, instantiate it in a main component".to_string());
    lines.push(format!(
        "// component main {{public [{}]}} = {}({});",
        INPUT_SIGNAL,
        header.template_name,
        program.feature_count()
    ));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn render_statement(statement: &Statement, lines: &mut Vec<String>) {
    match statement {
        Statement::Comment(text) => lines.push(comment(text)),
        Statement::Blank => lines.push(String::new()),
        Statement::Comparator(gadget) => render_comparator(gadget, lines),
        Statement::Signal { name, expr } => {
            lines.push(format!("{}signal {} <== {};", INDENT, name, expr))
        }
        Statement::Assign { target, expr } => {
            lines.push(format!("{}{} <== {};", INDENT, target, expr))
        }
        Statement::Constrain { lhs, rhs } => {
            lines.push(format!("{}{} === {};", INDENT, lhs, rhs))
        }
    }
}

fn render_comparator(gadget: &ComparatorGadget, lines: &mut Vec<String>) {
    let component = gadget.component();

    lines.push(comment(&format!(
        "Node {}: If {} ({}[{}]) <= ... {}",
        gadget.node,
        gadget.feature_name,
        INPUT_SIGNAL,
        gadget.feature_index,
        gadget.describe()
    )));

    lines.push(format!("{}component {} = LessEqThan({});", INDENT, component, gadget.bits));
    lines.push(format!(
        "{}{}.in[0] <== {}[{}];",
        INDENT, component, INPUT_SIGNAL, gadget.feature_index
    ));
    lines.push(format!("{}{}.in[1] <== {};", INDENT, component, gadget.threshold.fixed));
    lines.push(format!(
        "{}signal {} <== {}.out; // 1 if true (left), 0 if false (right)",
        INDENT,
        gadget.output(),
        component
    ));
    lines.push(String::new());
}

/// Indented single-line comment; newlines in names would end the comment
fn comment(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    format!("{}// {}", INDENT, flat)
}
