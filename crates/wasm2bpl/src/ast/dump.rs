//! Indented tree rendering of a parsed module, for `--dump-ast`.

use super::{LabelRef, WasmModule, WasmNode};
use std::fmt;

/// Every function of a module as an indented node tree.
pub struct AstDump<'a>(pub &'a WasmModule);

/// Render `module` for printing.
pub fn dump(module: &WasmModule) -> AstDump<'_> {
    AstDump(module)
}

impl fmt::Display for AstDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for import in &self.0.imports {
            writeln!(
                f,
                "Import #{} {}.{} (params: {}, results: {})",
                import.index, import.module, import.field, import.param_count, import.result_count
            )?;
        }
        for func in &self.0.functions {
            writeln!(
                f,
                "Function {} (params: {}, locals: {}, results: {})",
                func.display_name(),
                func.param_count,
                func.local_count,
                func.result_count
            )?;
            for node in &func.body {
                dump_node(f, node, 1)?;
            }
        }
        Ok(())
    }
}

fn dump_node(f: &mut fmt::Formatter<'_>, node: &WasmNode, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    let line = match node {
        WasmNode::Const { ty, literal } => format!("Const({ty}, {literal})"),
        WasmNode::LocalGet(slot) => format!("LocalGet({slot})"),
        WasmNode::LocalSet { slot, .. } => format!("LocalSet({slot})"),
        WasmNode::LocalTee { slot, .. } => format!("LocalTee({slot})"),
        WasmNode::Call { target, .. } => format!("Call({target})"),
        WasmNode::UnaryOp { op, .. } => format!("UnaryOp({op})"),
        WasmNode::BinaryOp { op, .. } => format!("BinaryOp({op})"),
        WasmNode::Select { .. } => "Select".to_string(),
        WasmNode::Block { label, .. } => format!("Block({})", label_text(label)),
        WasmNode::Loop { label, .. } => format!("Loop({})", label_text(label)),
        WasmNode::Structural { head, .. } => format!("Structural({head})"),
        WasmNode::If { label, .. } => format!("If({})", label_text(label)),
        WasmNode::Br { target, .. } => format!("Br({target})"),
        WasmNode::BrIf { target, .. } => format!("BrIf({target})"),
        WasmNode::BrTable {
            targets, default, ..
        } => {
            let targets: Vec<String> = targets.iter().map(LabelRef::to_string).collect();
            format!("BrTable([{}], default {default})", targets.join(", "))
        }
        WasmNode::Return { .. } => "Return".to_string(),
        WasmNode::Nop => "Nop".to_string(),
        WasmNode::Unreachable => "Unreachable".to_string(),
        WasmNode::Raw(name) => format!("Raw({name})"),
    };
    writeln!(f, "{pad}{line}")?;

    match node {
        WasmNode::LocalSet { value, .. } | WasmNode::LocalTee { value, .. } => {
            if let Some(value) = value {
                dump_node(f, value, depth + 1)?;
            }
        }
        WasmNode::UnaryOp { operand, .. } => {
            if let Some(operand) = operand {
                dump_node(f, operand, depth + 1)?;
            }
        }
        WasmNode::BinaryOp { left, right, .. } => {
            for child in [left, right].into_iter().flatten() {
                dump_node(f, child, depth + 1)?;
            }
        }
        WasmNode::Call { args: children, .. }
        | WasmNode::Select {
            operands: children,
        }
        | WasmNode::Block { body: children, .. }
        | WasmNode::Loop { body: children, .. }
        | WasmNode::Structural { body: children, .. }
        | WasmNode::Br {
            operands: children, ..
        }
        | WasmNode::BrIf {
            operands: children, ..
        }
        | WasmNode::BrTable {
            operands: children, ..
        }
        | WasmNode::Return { operands: children } => {
            for child in children {
                dump_node(f, child, depth + 1)?;
            }
        }
        WasmNode::If {
            cond,
            then_body,
            else_body,
            ..
        } => {
            for child in cond {
                dump_node(f, child, depth + 1)?;
            }
            writeln!(f, "{pad}  Then")?;
            for child in then_body {
                dump_node(f, child, depth + 2)?;
            }
            if let Some(else_body) = else_body {
                writeln!(f, "{pad}  Else")?;
                for child in else_body {
                    dump_node(f, child, depth + 2)?;
                }
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

fn label_text(label: &Option<String>) -> String {
    match label {
        Some(l) => format!("${l}"),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ImportedFunction, NumType, WasmFunction};
    use std::collections::HashMap;

    #[test]
    fn dump_nests_children() {
        let func = WasmFunction {
            name: Some("f".into()),
            index: 0,
            body: vec![WasmNode::Block {
                label: Some("b".into()),
                body: vec![WasmNode::BrIf {
                    target: LabelRef::Depth(0),
                    operands: vec![WasmNode::Const {
                        ty: NumType::I32,
                        literal: "1".into(),
                    }],
                }],
            }],
            param_count: 0,
            local_count: 0,
            result_count: 0,
            aliases: HashMap::new(),
        };
        let text = dump(&WasmModule::from_functions(vec![func])).to_string();
        assert_eq!(
            text,
            "Function $f (params: 0, locals: 0, results: 0)\n  Block($b)\n    BrIf(0)\n      Const(i32, 1)\n"
        );
    }

    #[test]
    fn dump_writes_through_a_formatter() {
        let func = WasmFunction {
            name: None,
            index: 1,
            body: vec![WasmNode::If {
                label: None,
                cond: vec![WasmNode::LocalGet(0)],
                then_body: vec![WasmNode::Nop],
                else_body: Some(vec![WasmNode::Unreachable]),
            }],
            param_count: 1,
            local_count: 0,
            result_count: 0,
            aliases: HashMap::new(),
        };
        let mut module = WasmModule::from_functions(vec![func]);
        module.imports.push(ImportedFunction {
            index: 0,
            module: "env".into(),
            field: "log".into(),
            name: None,
            param_count: 1,
            result_count: 0,
        });
        let mut out = String::new();
        fmt::write(&mut out, format_args!("{}", dump(&module))).unwrap();
        assert_eq!(
            out,
            "Import #0 env.log (params: 1, results: 0)\n\
             Function #1 (params: 1, locals: 0, results: 0)\n  \
             If(-)\n    LocalGet(0)\n    Then\n      Nop\n    Else\n      Unreachable\n"
        );
    }
}
