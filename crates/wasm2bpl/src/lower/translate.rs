//! Per-node lowering rules.
//!
//! Every rule follows the operand stack discipline of the source
//! instruction: operands are lowered first (each pushes), the rule pops what
//! it consumes into scratch temporaries and pushes its result.

use super::core::{FunctionLowerer, ScopeKind, IDX};
use super::prelude::{BOOL_TO_REAL, POP, POP_TO_TMP, PUSH, REAL_TO_BOOL, REAL_TO_INT, TMP};
use super::DiagnosticKind;
use crate::ast::ops::{classify, BinaryKind, OpClass, UnaryKind};
use crate::ast::{NumType, StructuralHead, WasmNode};
use crate::boogie::{BinOp, Expr, Stmt};

fn push(value: Expr) -> Stmt {
    Stmt::call(PUSH, vec![value])
}

/// `call popToTmpN();`, `n` in 1..=3.
fn pop_to(n: usize) -> Stmt {
    Stmt::call(POP_TO_TMP[n - 1], vec![])
}

fn tmp(n: usize) -> Expr {
    Expr::ident(TMP[n - 1])
}

fn to_real(cond: Expr) -> Expr {
    Expr::call(BOOL_TO_REAL, vec![cond])
}

fn tmp1_is_true() -> Expr {
    Expr::call(REAL_TO_BOOL, vec![tmp(1)])
}

fn goto_if(cond: Expr, label: String) -> Stmt {
    Stmt::If {
        cond,
        then_branch: vec![Stmt::goto(label)],
        else_branch: None,
    }
}

/// Leave a havocked value where the unsupported result would be.
fn push_unknown(out: &mut Vec<Stmt>) {
    out.push(Stmt::Havoc(vec![TMP[0].to_string()]));
    out.push(push(tmp(1)));
}

/// Raw fragments that carry no instruction: names, type annotations and
/// declaration heads inside structural forms.
fn is_structural_fragment(name: &str) -> bool {
    name.starts_with('$')
        || name.contains("=>")
        || StructuralHead::from_keyword(name).is_some()
        || matches!(
            name,
            "param" | "result" | "local" | "export" | "import" | "i32" | "i64" | "f32" | "f64"
        )
}

/// Exact real for an integer magnitude, e.g. `-16.0`.
fn integer_real(negative: bool, magnitude: u128) -> Expr {
    let sign = if negative && magnitude != 0 { "-" } else { "" };
    Expr::Decimal(format!("{sign}{magnitude}.0"))
}

/// Value of a numeric literal, `None` for anything the value domain cannot
/// represent (non-finite, hex floats, malformed). Integers stay exact; only
/// decimal float literals go through `f64`.
pub(super) fn literal_expr(ty: NumType, literal: &str) -> Option<Expr> {
    let cleaned: String = literal.chars().filter(|c| *c != '_').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    if let Some(hex) = digits.strip_prefix("0x") {
        if ty.is_float() && hex.contains(['.', 'p', 'P']) {
            return None;
        }
        return Some(integer_real(negative, u128::from_str_radix(hex, 16).ok()?));
    }
    if !ty.is_float() {
        return Some(integer_real(negative, digits.parse::<u128>().ok()?));
    }
    let magnitude = digits
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && !digits.starts_with(['i', 'n', 'I', 'N']))?;
    Some(Expr::Real(if negative { -magnitude } else { magnitude }))
}

impl FunctionLowerer<'_> {
    pub(super) fn lower_seq(&mut self, nodes: &[WasmNode], out: &mut Vec<Stmt>) {
        for node in nodes {
            self.lower_node(node, out);
        }
    }

    fn lower_opt(&mut self, node: &Option<Box<WasmNode>>, out: &mut Vec<Stmt>) {
        if let Some(node) = node {
            self.lower_node(node, out);
        }
    }

    pub(super) fn lower_node(&mut self, node: &WasmNode, out: &mut Vec<Stmt>) {
        match node {
            WasmNode::Const { ty, literal } => match literal_expr(*ty, literal) {
                Some(value) => out.push(push(value)),
                None => {
                    let message = format!("unsupported const value: {ty}.const {literal}");
                    out.push(Stmt::comment(message.clone()));
                    self.note(DiagnosticKind::UnsupportedConst, message);
                    push_unknown(out);
                }
            },
            WasmNode::LocalGet(slot) => out.push(push(Expr::ident(self.local(*slot)))),
            WasmNode::LocalSet { slot, value } => {
                self.lower_opt(value, out);
                self.pop_into_local(*slot, out);
            }
            WasmNode::LocalTee { slot, value } => {
                self.lower_opt(value, out);
                self.pop_into_local(*slot, out);
                out.push(push(Expr::ident(self.local(*slot))));
            }
            WasmNode::Call { target, args } => {
                self.lower_seq(args, out);
                let callee = self.callees.resolve(target);
                out.push(Stmt::call(callee, vec![]));
            }
            WasmNode::UnaryOp { op, operand } => {
                self.lower_opt(operand, out);
                self.lower_unary(op, out);
            }
            WasmNode::BinaryOp { op, left, right } => {
                self.lower_opt(left, out);
                self.lower_opt(right, out);
                self.lower_binary(op, out);
            }
            WasmNode::Select { operands } => {
                self.lower_seq(operands, out);
                out.push(pop_to(1));
                out.push(pop_to(2));
                out.push(pop_to(3));
                out.push(Stmt::If {
                    cond: tmp1_is_true(),
                    then_branch: vec![push(tmp(3))],
                    else_branch: Some(vec![push(tmp(2))]),
                });
            }
            WasmNode::Block { label, body } => {
                self.enter_scope(label.as_deref(), ScopeKind::Block);
                self.lower_seq(body, out);
                self.leave_scope(out);
            }
            WasmNode::Loop { label, body } => {
                if let Some(start) = self.enter_scope(label.as_deref(), ScopeKind::Loop) {
                    out.push(Stmt::Label(start));
                }
                self.lower_seq(body, out);
                self.leave_scope(out);
            }
            WasmNode::Structural { body, .. } => self.lower_seq(body, out),
            WasmNode::If {
                label,
                cond,
                then_body,
                else_body,
            } => {
                self.lower_seq(cond, out);
                out.push(pop_to(1));
                self.enter_scope(label.as_deref(), ScopeKind::If);
                let mut then_branch = Vec::new();
                self.lower_seq(then_body, &mut then_branch);
                let else_branch = else_body.as_ref().map(|body| {
                    let mut stmts = Vec::new();
                    self.lower_seq(body, &mut stmts);
                    stmts
                });
                out.push(Stmt::If {
                    cond: tmp1_is_true(),
                    then_branch,
                    else_branch,
                });
                self.leave_scope(out);
            }
            WasmNode::Br { target, operands } => {
                self.lower_seq(operands, out);
                let label = self.resolve_branch(target);
                out.push(Stmt::goto(label));
            }
            WasmNode::BrIf { target, operands } => {
                self.lower_seq(operands, out);
                out.push(pop_to(1));
                let label = self.resolve_branch(target);
                out.push(goto_if(tmp1_is_true(), label));
            }
            WasmNode::BrTable {
                operands,
                targets,
                default,
            } => {
                self.lower_seq(operands, out);
                out.push(pop_to(1));
                out.push(Stmt::assign(IDX, Expr::call(REAL_TO_INT, vec![tmp(1)])));
                let labels: Vec<String> = targets.iter().map(|t| self.resolve_branch(t)).collect();
                let default = self.resolve_branch(default);
                out.push(br_table_dispatch(&labels, default));
            }
            WasmNode::Return { operands } => {
                self.lower_seq(operands, out);
                let exit = self.exit_label();
                out.push(Stmt::goto(exit));
            }
            WasmNode::Nop => {}
            WasmNode::Unreachable => out.push(Stmt::Assume(Expr::Bool(false))),
            WasmNode::Raw(name) => {
                if !is_structural_fragment(name) {
                    let message = format!("unhandled raw instruction: {name}");
                    out.push(Stmt::comment(message.clone()));
                    self.note(DiagnosticKind::UnhandledInstruction, message);
                }
            }
        }
    }

    /// `call locN := popArgs1();`
    fn pop_into_local(&mut self, slot: u32, out: &mut Vec<Stmt>) {
        let helper = self.ensure_pop_args(1);
        out.push(Stmt::Call {
            callee: helper,
            args: vec![],
            outs: vec![self.local(slot).to_string()],
        });
    }

    fn lower_unary(&mut self, op: &str, out: &mut Vec<Stmt>) {
        let kind = match classify(op) {
            Some(OpClass::Unary(kind)) => kind,
            _ => UnaryKind::Unsupported,
        };
        let result = match kind {
            UnaryKind::Drop => {
                out.push(Stmt::call(POP, vec![]));
                return;
            }
            UnaryKind::Conversion => {
                out.push(Stmt::comment(format!("{op}: no-op under real semantics")));
                return;
            }
            UnaryKind::Unsupported => {
                let message = format!("unsupported unary op: {op}");
                out.push(Stmt::comment(message.clone()));
                self.note(DiagnosticKind::UnsupportedUnaryOp, message);
                out.push(pop_to(1));
                push_unknown(out);
                return;
            }
            UnaryKind::Eqz => to_real(Expr::binary(BinOp::Eq, tmp(1), Expr::Real(0.0))),
            UnaryKind::Neg => Expr::neg(tmp(1)),
            UnaryKind::Abs => Expr::ite(
                Expr::binary(BinOp::Lt, tmp(1), Expr::Real(0.0)),
                Expr::neg(tmp(1)),
                tmp(1),
            ),
        };
        out.push(pop_to(1));
        out.push(push(result));
    }

    /// `$tmp1` holds the right operand, `$tmp2` the left.
    fn lower_binary(&mut self, op: &str, out: &mut Vec<Stmt>) {
        let kind = match classify(op) {
            Some(OpClass::Binary(kind)) => kind,
            _ => BinaryKind::Unsupported,
        };
        if kind == BinaryKind::Unsupported {
            let message = format!("unsupported binary op: {op}");
            out.push(Stmt::comment(message.clone()));
            self.note(DiagnosticKind::UnsupportedBinaryOp, message);
        }
        out.push(pop_to(1));
        out.push(pop_to(2));

        let (lhs, rhs) = (tmp(2), tmp(1));
        let arith = |op| Expr::binary(op, lhs.clone(), rhs.clone());
        let compare = |op| to_real(Expr::binary(op, lhs.clone(), rhs.clone()));
        let result = match kind {
            BinaryKind::Add => arith(BinOp::Add),
            BinaryKind::Sub => arith(BinOp::Sub),
            BinaryKind::Mul => arith(BinOp::Mul),
            BinaryKind::Div => arith(BinOp::Div),
            BinaryKind::Eq => compare(BinOp::Eq),
            BinaryKind::Ne => compare(BinOp::Neq),
            BinaryKind::Lt => compare(BinOp::Lt),
            BinaryKind::Le => compare(BinOp::Le),
            BinaryKind::Gt => compare(BinOp::Gt),
            BinaryKind::Ge => compare(BinOp::Ge),
            BinaryKind::Min => Expr::ite(
                Expr::binary(BinOp::Le, lhs.clone(), rhs.clone()),
                lhs.clone(),
                rhs.clone(),
            ),
            BinaryKind::Max => Expr::ite(
                Expr::binary(BinOp::Ge, lhs.clone(), rhs.clone()),
                lhs.clone(),
                rhs.clone(),
            ),
            BinaryKind::Unsupported => {
                push_unknown(out);
                return;
            }
        };
        out.push(push(result));
    }
}

/// Bounds check against the default, then an equality chain over the
/// targets falling through to the default.
fn br_table_dispatch(targets: &[String], default: String) -> Stmt {
    if targets.is_empty() {
        return Stmt::goto(default);
    }
    let idx = || Expr::ident(IDX);
    let out_of_range = Expr::binary(
        BinOp::Or,
        Expr::binary(BinOp::Lt, idx(), Expr::Int(0)),
        Expr::binary(BinOp::Ge, idx(), Expr::Int(targets.len() as i64)),
    );
    let mut chain: Vec<Stmt> = targets
        .iter()
        .enumerate()
        .map(|(i, label)| {
            goto_if(
                Expr::binary(BinOp::Eq, idx(), Expr::Int(i as i64)),
                label.clone(),
            )
        })
        .collect();
    chain.push(Stmt::goto(default.clone()));
    Stmt::If {
        cond: out_of_range,
        then_branch: vec![Stmt::goto(default)],
        else_branch: Some(chain),
    }
}
