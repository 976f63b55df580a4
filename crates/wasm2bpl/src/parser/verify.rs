//! Label verification pass run over a fully built function body.
//!
//! A symbolic label may not be reused by a scope nested inside a scope that
//! already carries it: name-addressed branches would become ambiguous.

use crate::ast::WasmNode;
use crate::error::ParseError;

/// Fail on the first scope whose label shadows an enclosing scope's label.
pub fn verify_labels(body: &[WasmNode]) -> Result<(), ParseError> {
    let mut open = Vec::new();
    verify_seq(body, &mut open)
}

fn verify_seq<'a>(body: &'a [WasmNode], open: &mut Vec<Option<&'a str>>) -> Result<(), ParseError> {
    body.iter().try_for_each(|node| verify_node(node, open))
}

fn verify_node<'a>(node: &'a WasmNode, open: &mut Vec<Option<&'a str>>) -> Result<(), ParseError> {
    match node {
        WasmNode::Block { label, body } | WasmNode::Loop { label, body } => {
            enter(label.as_deref(), open)?;
            verify_seq(body, open)?;
            open.pop();
        }
        WasmNode::If {
            label,
            cond,
            then_body,
            else_body,
        } => {
            // the condition is evaluated outside the if scope
            verify_seq(cond, open)?;
            enter(label.as_deref(), open)?;
            verify_seq(then_body, open)?;
            if let Some(else_body) = else_body {
                verify_seq(else_body, open)?;
            }
            open.pop();
        }
        WasmNode::Structural { body, .. }
        | WasmNode::Call { args: body, .. }
        | WasmNode::Select { operands: body }
        | WasmNode::Br { operands: body, .. }
        | WasmNode::BrIf { operands: body, .. }
        | WasmNode::BrTable { operands: body, .. }
        | WasmNode::Return { operands: body } => verify_seq(body, open)?,
        WasmNode::LocalSet { value: child, .. }
        | WasmNode::LocalTee { value: child, .. }
        | WasmNode::UnaryOp { operand: child, .. } => {
            if let Some(child) = child {
                verify_node(child, open)?;
            }
        }
        WasmNode::BinaryOp { left, right, .. } => {
            for child in [left, right].into_iter().flatten() {
                verify_node(child, open)?;
            }
        }
        WasmNode::Const { .. }
        | WasmNode::LocalGet(_)
        | WasmNode::Nop
        | WasmNode::Unreachable
        | WasmNode::Raw(_) => {}
    }
    Ok(())
}

fn enter<'a>(label: Option<&'a str>, open: &mut Vec<Option<&'a str>>) -> Result<(), ParseError> {
    if let Some(label) = label {
        if open.iter().any(|l| *l == Some(label)) {
            return Err(ParseError::DuplicateLabel {
                label: label.to_string(),
                depth: open.len(),
            });
        }
    }
    open.push(label);
    Ok(())
}
