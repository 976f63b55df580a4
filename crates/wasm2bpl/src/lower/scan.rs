//! Label pre-scan: which scope labels does any branch actually target?
//!
//! Scopes (`block`, `loop`, `if`) are numbered in the order the lowering
//! pass enters them, operands before the instruction that consumes them, so
//! both passes agree on every scope's ordinal.

use crate::ast::{LabelRef, WasmNode};
use std::collections::HashSet;

/// Ordinals of scopes whose generated labels must be materialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelNeeds {
    pub loop_starts: HashSet<usize>,
    pub block_ends: HashSet<usize>,
}

struct OpenScope<'a> {
    ordinal: usize,
    label: Option<&'a str>,
    is_loop: bool,
}

struct Scanner<'a> {
    open: Vec<OpenScope<'a>>,
    next_ordinal: usize,
    needs: LabelNeeds,
}

/// Walk `body` and record every loop start and block end a branch resolves to.
pub fn scan(body: &[WasmNode]) -> LabelNeeds {
    let mut scanner = Scanner {
        open: Vec::new(),
        next_ordinal: 0,
        needs: LabelNeeds::default(),
    };
    scanner.seq(body);
    scanner.needs
}

impl<'a> Scanner<'a> {
    fn seq(&mut self, body: &'a [WasmNode]) {
        for node in body {
            self.node(node);
        }
    }

    fn scoped(&mut self, label: &'a Option<String>, is_loop: bool, bodies: &[&'a [WasmNode]]) {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.open.push(OpenScope {
            ordinal,
            label: label.as_deref(),
            is_loop,
        });
        for body in bodies {
            self.seq(body);
        }
        self.open.pop();
    }

    fn mark(&mut self, target: &LabelRef) {
        let found = match target {
            LabelRef::Depth(depth) => {
                let depth = *depth as usize;
                (depth < self.open.len()).then(|| self.open.len() - 1 - depth)
            }
            LabelRef::Name(name) => self
                .open
                .iter()
                .rposition(|s| s.label == Some(name.as_str())),
        };
        let Some(i) = found else {
            return;
        };
        let (ordinal, is_loop) = (self.open[i].ordinal, self.open[i].is_loop);
        if is_loop {
            self.needs.loop_starts.insert(ordinal);
        } else {
            self.needs.block_ends.insert(ordinal);
        }
    }

    fn node(&mut self, node: &'a WasmNode) {
        match node {
            WasmNode::Block { label, body } => self.scoped(label, false, &[body.as_slice()]),
            WasmNode::Loop { label, body } => self.scoped(label, true, &[body.as_slice()]),
            WasmNode::If {
                label,
                cond,
                then_body,
                else_body,
            } => {
                self.seq(cond);
                match else_body {
                    Some(else_body) => {
                        self.scoped(label, false, &[then_body.as_slice(), else_body.as_slice()])
                    }
                    None => self.scoped(label, false, &[then_body.as_slice()]),
                }
            }
            WasmNode::Br { target, operands } | WasmNode::BrIf { target, operands } => {
                self.seq(operands);
                self.mark(target);
            }
            WasmNode::BrTable {
                operands,
                targets,
                default,
            } => {
                self.seq(operands);
                for target in targets.iter().chain(std::iter::once(default)) {
                    self.mark(target);
                }
            }
            WasmNode::Structural { body, .. }
            | WasmNode::Call { args: body, .. }
            | WasmNode::Select { operands: body }
            | WasmNode::Return { operands: body } => self.seq(body),
            WasmNode::LocalSet { value: child, .. }
            | WasmNode::LocalTee { value: child, .. }
            | WasmNode::UnaryOp { operand: child, .. } => {
                if let Some(child) = child {
                    self.node(child);
                }
            }
            WasmNode::BinaryOp { left, right, .. } => {
                for child in [left, right].into_iter().flatten() {
                    self.node(child);
                }
            }
            WasmNode::Const { .. }
            | WasmNode::LocalGet(_)
            | WasmNode::Nop
            | WasmNode::Unreachable
            | WasmNode::Raw(_) => {}
        }
    }
}
