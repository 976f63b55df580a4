//! Recursive-descent AST builder.
//!
//! Folded forms are dispatched on their head token in a fixed priority order:
//! literals, local access, `call`, operators, structured control, branches,
//! `return`/`nop`/`unreachable`/`select`, structural wrappers, and finally a
//! `Raw` fallback that skips the form's children unread. Flat instructions
//! (`local.get 0`, `block ... end`) are accepted wherever a folded form is.

use crate::ast::ops::{classify, OpClass};
use crate::ast::{FunctionSignature, LabelRef, NumType, StructuralHead, WasmFunction, WasmNode};
use crate::error::{token_window, ParseError};
use log::debug;
use std::collections::HashMap;

/// Alias map and slot bound of the function being parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalTable {
    aliases: HashMap<String, u32>,
    slots: u32,
}

impl LocalTable {
    /// A table with `slots` anonymous slots.
    pub fn with_slots(slots: u32) -> Self {
        Self {
            aliases: HashMap::new(),
            slots,
        }
    }

    /// Allocate the next slot, optionally reachable as `$name`.
    pub fn declare(&mut self, name: Option<&str>) -> u32 {
        let slot = self.slots;
        if let Some(name) = name {
            self.aliases.insert(name.to_string(), slot);
        }
        self.slots += 1;
        slot
    }

    pub fn slots(&self) -> u32 {
        self.slots
    }

    pub fn alias(&self, name: &str) -> Option<u32> {
        self.aliases.get(name).copied()
    }

    pub fn into_aliases(self) -> HashMap<String, u32> {
        self.aliases
    }
}

/// What stopped an instruction sequence. Never consumed by `parse_instrs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Close,
    End,
    Else,
    Eof,
}

/// Cursor over the tokens of one function.
pub struct Parser<'t> {
    tokens: &'t [String],
    pos: usize,
    locals: LocalTable,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [String], locals: LocalTable) -> Self {
        Self {
            tokens,
            pos: 0,
            locals,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    // ── token helpers ──────────────────────────────────────────────────

    fn peek(&self) -> Option<&'t str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t str> {
        self.tokens.get(self.pos + offset).map(String::as_str)
    }

    fn eof(&self) -> ParseError {
        ParseError::UnexpectedEof {
            index: self.pos,
            window: token_window(self.tokens, self.pos),
        }
    }

    fn expected(&self, expected: &'static str) -> ParseError {
        match self.peek() {
            None => self.eof(),
            Some(found) => ParseError::Expected {
                expected,
                found: found.to_string(),
                index: self.pos,
                window: token_window(self.tokens, self.pos),
            },
        }
    }

    fn expected_at(&self, index: usize, expected: &'static str) -> ParseError {
        ParseError::Expected {
            expected,
            found: self.tokens.get(index).cloned().unwrap_or_default(),
            index,
            window: token_window(self.tokens, index),
        }
    }

    /// Consume a non-parenthesis token.
    fn next_atom(&mut self, what: &'static str) -> Result<&'t str, ParseError> {
        match self.peek() {
            None => Err(self.eof()),
            Some("(") | Some(")") => Err(self.expected(what)),
            Some(tok) => {
                self.pos += 1;
                Ok(tok)
            }
        }
    }

    fn expect_open(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Some("(") => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.expected("`(`")),
        }
    }

    fn expect_close(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Some(")") => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.expected("`)`")),
        }
    }

    /// Skip a whole parenthesized form starting at the current `(`.
    fn skip_form(&mut self) -> Result<(), ParseError> {
        self.expect_open()?;
        self.skip_rest_of_form()
    }

    /// Skip to just past the `)` closing the form we are inside.
    fn skip_rest_of_form(&mut self) -> Result<(), ParseError> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                None => return Err(self.eof()),
                Some("(") => depth += 1,
                Some(")") => depth -= 1,
                Some(_) => {}
            }
            self.pos += 1;
        }
        Ok(())
    }

    /// Optional `$label` after `block`/`loop`/`if`/`end`/`else`.
    fn take_label(&mut self) -> Option<String> {
        let tok = self.peek()?;
        let name = tok.strip_prefix('$')?;
        self.pos += 1;
        Some(name.to_string())
    }

    /// Skip `(result ..)`, `(param ..)` and `(type ..)` block annotations.
    fn skip_block_annotations(&mut self) -> Result<(), ParseError> {
        while self.peek() == Some("(")
            && matches!(self.peek_at(1), Some("result") | Some("param") | Some("type"))
        {
            self.skip_form()?;
        }
        Ok(())
    }

    // ── locals ─────────────────────────────────────────────────────────

    /// Resolve a numeric index or `$alias` to a slot, then bound-check it.
    fn resolve_local(&self, token: &str, index: usize) -> Result<u32, ParseError> {
        let unresolved = || ParseError::UnresolvedLocal {
            name: token.to_string(),
            index,
            window: token_window(self.tokens, index),
        };
        let slot: u64 = if is_digits(token) {
            token.parse().unwrap_or(u64::MAX)
        } else if let Some(name) = token.strip_prefix('$') {
            match self.locals.alias(name) {
                Some(slot) => u64::from(slot),
                None if is_digits(name) => name.parse().unwrap_or(u64::MAX),
                None => return Err(unresolved()),
            }
        } else {
            return Err(unresolved());
        };

        if slot >= u64::from(self.locals.slots()) {
            return Err(ParseError::LocalOutOfRange {
                slot,
                slots: self.locals.slots() as usize,
                window: token_window(self.tokens, index),
            });
        }
        Ok(slot as u32)
    }

    fn parse_local_ref(&mut self) -> Result<u32, ParseError> {
        let index = self.pos;
        let token = self.next_atom("local index or name")?;
        self.resolve_local(token, index)
    }

    // ── sequences ──────────────────────────────────────────────────────

    /// Parse instructions up to (not including) a terminator.
    fn parse_instrs(&mut self) -> Result<(Vec<WasmNode>, Terminator), ParseError> {
        let mut nodes = Vec::new();
        loop {
            let term = match self.peek() {
                None => Terminator::Eof,
                Some(")") => Terminator::Close,
                Some("end") => Terminator::End,
                Some("else") => Terminator::Else,
                Some(_) => {
                    nodes.push(self.parse_node()?);
                    continue;
                }
            };
            return Ok((nodes, term));
        }
    }

    /// Children of a folded form, consuming its closing `)`.
    fn parse_children(&mut self) -> Result<Vec<WasmNode>, ParseError> {
        let (nodes, term) = self.parse_instrs()?;
        match term {
            Terminator::Close => {
                self.pos += 1;
                Ok(nodes)
            }
            Terminator::Eof => Err(self.eof()),
            Terminator::End | Terminator::Else => Err(self.expected("`)`")),
        }
    }

    /// Body of a flat block, consuming `end` and its optional label.
    fn parse_flat_body(&mut self) -> Result<(Vec<WasmNode>, Terminator), ParseError> {
        let (nodes, term) = self.parse_instrs()?;
        match term {
            Terminator::End | Terminator::Else => {
                self.pos += 1;
                self.take_label();
                Ok((nodes, term))
            }
            Terminator::Eof => Err(self.eof()),
            Terminator::Close => Err(self.expected("`end`")),
        }
    }

    /// Instructions up to the closer of the enclosing form, which is left
    /// unconsumed. End of input also terminates the body.
    pub fn parse_function_body(&mut self) -> Result<Vec<WasmNode>, ParseError> {
        let (nodes, term) = self.parse_instrs()?;
        match term {
            Terminator::Close | Terminator::Eof => Ok(nodes),
            Terminator::End | Terminator::Else => Err(self.expected("instruction or `)`")),
        }
    }

    // ── nodes ──────────────────────────────────────────────────────────

    /// Parse one instruction, folded or flat.
    pub fn parse_node(&mut self) -> Result<WasmNode, ParseError> {
        match self.peek() {
            None => Err(self.eof()),
            Some("(") => self.parse_folded(),
            Some(")") => Err(ParseError::UnexpectedClose {
                index: self.pos,
                window: token_window(self.tokens, self.pos),
            }),
            Some(_) => self.parse_flat(),
        }
    }

    fn parse_folded(&mut self) -> Result<WasmNode, ParseError> {
        self.expect_open()?;
        let head_index = self.pos;
        let head = self.next_atom("instruction name")?;

        if let Some(ty) = const_type(head) {
            let literal = self.next_atom("literal")?.to_string();
            self.expect_close()?;
            return Ok(WasmNode::Const { ty, literal });
        }

        match head {
            "local.get" => {
                let slot = self.parse_local_ref()?;
                self.expect_close()?;
                return Ok(WasmNode::LocalGet(slot));
            }
            "local.set" | "local.tee" => {
                let slot = self.parse_local_ref()?;
                let value = at_most_one(self.parse_children()?)
                    .map_err(|_| self.expected_at(head_index, "at most one operand"))?;
                return Ok(if head == "local.set" {
                    WasmNode::LocalSet { slot, value }
                } else {
                    WasmNode::LocalTee { slot, value }
                });
            }
            "call" => {
                let target = self.next_atom("call target")?.to_string();
                let args = self.parse_children()?;
                return Ok(WasmNode::Call { target, args });
            }
            _ => {}
        }

        if let Some(class) = classify(head) {
            let mut operands = self.parse_children()?;
            let op = head.to_string();
            return match class {
                OpClass::Unary(_) => {
                    let operand = at_most_one(operands)
                        .map_err(|_| self.expected_at(head_index, "at most one operand"))?;
                    Ok(WasmNode::UnaryOp { op, operand })
                }
                OpClass::Binary(_) => {
                    if operands.len() > 2 {
                        return Err(self.expected_at(head_index, "at most two operands"));
                    }
                    let right = operands.pop().map(Box::new);
                    let left = operands.pop().map(Box::new);
                    Ok(WasmNode::BinaryOp { op, left, right })
                }
            };
        }

        match head {
            "block" | "loop" => {
                let label = self.take_label();
                self.skip_block_annotations()?;
                let body = self.parse_children()?;
                Ok(if head == "block" {
                    WasmNode::Block { label, body }
                } else {
                    WasmNode::Loop { label, body }
                })
            }
            "if" => self.parse_folded_if(),
            "br" | "br_if" => {
                let target = LabelRef::from_token(self.next_atom("branch target")?);
                let operands = self.parse_children()?;
                Ok(if head == "br" {
                    WasmNode::Br { target, operands }
                } else {
                    WasmNode::BrIf { target, operands }
                })
            }
            "br_table" => self.parse_folded_br_table(head_index),
            "return" => Ok(WasmNode::Return {
                operands: self.parse_children()?,
            }),
            "nop" | "unreachable" => {
                self.expect_close()?;
                Ok(if head == "nop" {
                    WasmNode::Nop
                } else {
                    WasmNode::Unreachable
                })
            }
            "select" => {
                self.skip_block_annotations()?;
                let operands = self.parse_children()?;
                if operands.len() > 3 {
                    return Err(self.expected_at(head_index, "at most three operands"));
                }
                Ok(WasmNode::Select { operands })
            }
            _ => {
                if let Some(head) = StructuralHead::from_keyword(head) {
                    let body = self.parse_children()?;
                    return Ok(WasmNode::Structural { head, body });
                }
                debug!("raw form `{head}` at token {head_index}, skipping its children");
                self.skip_rest_of_form()?;
                Ok(WasmNode::Raw(head.to_string()))
            }
        }
    }

    /// `(if $l? <annot>* cond* (then ..) (else ..)?)` or the single-form
    /// arm shape `(if C T E?)`.
    fn parse_folded_if(&mut self) -> Result<WasmNode, ParseError> {
        let start = self.pos;
        let label = self.take_label();
        self.skip_block_annotations()?;

        let mut cond = Vec::new();
        let mut then_body = None;
        let mut else_body = None;
        loop {
            match (self.peek(), self.peek_at(1)) {
                (None, _) => return Err(self.eof()),
                (Some(")"), _) => {
                    self.pos += 1;
                    break;
                }
                (Some("("), Some("then")) if then_body.is_none() => {
                    self.pos += 2;
                    then_body = Some(self.parse_children()?);
                }
                (Some("("), Some("else")) if else_body.is_none() => {
                    self.pos += 2;
                    else_body = Some(self.parse_children()?);
                }
                _ if then_body.is_some() => return Err(self.expected("`(else` or `)`")),
                _ => cond.push(self.parse_node()?),
            }
        }

        let then_body = match then_body {
            Some(body) => body,
            None => {
                if else_body.is_none() && cond.len() == 3 {
                    else_body = cond.pop().map(|node| vec![node]);
                }
                if cond.len() != 2 {
                    return Err(self.expected_at(start, "condition and then-arm"));
                }
                cond.pop().map(|node| vec![node]).unwrap_or_default()
            }
        };
        Ok(WasmNode::If {
            label,
            cond,
            then_body,
            else_body,
        })
    }

    /// Selector may come before or after the target atoms; the last target
    /// is the default.
    fn parse_folded_br_table(&mut self, head_index: usize) -> Result<WasmNode, ParseError> {
        let mut operands = Vec::new();
        let mut targets = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.eof()),
                Some(")") => {
                    self.pos += 1;
                    break;
                }
                Some("(") => operands.push(self.parse_folded()?),
                Some(tok) => {
                    targets.push(LabelRef::from_token(tok));
                    self.pos += 1;
                }
            }
        }
        if operands.is_empty() {
            return Err(ParseError::BrTableWithoutSelector {
                index: head_index,
                window: token_window(self.tokens, head_index),
            });
        }
        let Some(default) = targets.pop() else {
            return Err(ParseError::BrTableWithoutTargets {
                index: head_index,
                window: token_window(self.tokens, head_index),
            });
        };
        Ok(WasmNode::BrTable {
            operands,
            targets,
            default,
        })
    }

    /// A flat instruction; operands are already on the stack.
    fn parse_flat(&mut self) -> Result<WasmNode, ParseError> {
        let head_index = self.pos;
        let head = self.next_atom("instruction")?;

        if let Some(ty) = const_type(head) {
            let literal = self.next_atom("literal")?.to_string();
            return Ok(WasmNode::Const { ty, literal });
        }
        if let Some(class) = classify(head) {
            let op = head.to_string();
            return Ok(match class {
                OpClass::Unary(_) => WasmNode::UnaryOp { op, operand: None },
                OpClass::Binary(_) => WasmNode::BinaryOp {
                    op,
                    left: None,
                    right: None,
                },
            });
        }

        let node = match head {
            "local.get" => WasmNode::LocalGet(self.parse_local_ref()?),
            "local.set" => WasmNode::LocalSet {
                slot: self.parse_local_ref()?,
                value: None,
            },
            "local.tee" => WasmNode::LocalTee {
                slot: self.parse_local_ref()?,
                value: None,
            },
            "call" => WasmNode::Call {
                target: self.next_atom("call target")?.to_string(),
                args: Vec::new(),
            },
            "block" | "loop" => {
                let label = self.take_label();
                self.skip_block_annotations()?;
                let (body, term) = self.parse_flat_body()?;
                if term == Terminator::Else {
                    return Err(self.expected_at(self.pos - 1, "`end`"));
                }
                if head == "block" {
                    WasmNode::Block { label, body }
                } else {
                    WasmNode::Loop { label, body }
                }
            }
            "if" => {
                let label = self.take_label();
                self.skip_block_annotations()?;
                let (then_body, term) = self.parse_flat_body()?;
                let else_body = if term == Terminator::Else {
                    let (body, term) = self.parse_flat_body()?;
                    if term == Terminator::Else {
                        return Err(self.expected_at(self.pos - 1, "`end`"));
                    }
                    Some(body)
                } else {
                    None
                };
                WasmNode::If {
                    label,
                    cond: Vec::new(),
                    then_body,
                    else_body,
                }
            }
            "br" | "br_if" => {
                let target = LabelRef::from_token(self.next_atom("branch target")?);
                if head == "br" {
                    WasmNode::Br {
                        target,
                        operands: Vec::new(),
                    }
                } else {
                    WasmNode::BrIf {
                        target,
                        operands: Vec::new(),
                    }
                }
            }
            "br_table" => {
                let mut targets = Vec::new();
                while let Some(tok) = self.peek().filter(|t| is_label_token(t)) {
                    targets.push(LabelRef::from_token(tok));
                    self.pos += 1;
                }
                let Some(default) = targets.pop() else {
                    return Err(ParseError::BrTableWithoutTargets {
                        index: head_index,
                        window: token_window(self.tokens, head_index),
                    });
                };
                WasmNode::BrTable {
                    operands: Vec::new(),
                    targets,
                    default,
                }
            }
            "return" => WasmNode::Return {
                operands: Vec::new(),
            },
            "nop" => WasmNode::Nop,
            "unreachable" => WasmNode::Unreachable,
            "select" => {
                self.skip_block_annotations()?;
                WasmNode::Select {
                    operands: Vec::new(),
                }
            }
            _ => {
                while self.peek().is_some_and(is_immediate) {
                    self.pos += 1;
                }
                WasmNode::Raw(head.to_string())
            }
        };
        Ok(node)
    }

    // ── function form ──────────────────────────────────────────────────

    /// Parse a complete `(func ...)` form. Counts from `signature` win over
    /// the counts implied by the declarations.
    pub fn parse_function_form(
        &mut self,
        index: u32,
        signature: Option<&FunctionSignature>,
    ) -> Result<WasmFunction, ParseError> {
        self.expect_open()?;
        if self.peek() != Some("func") {
            return Err(self.expected("`func`"));
        }
        self.pos += 1;
        let name = self.take_label();

        let mut params = 0u32;
        let mut locals = 0u32;
        let mut results = 0u32;
        while self.peek() == Some("(") {
            match self.peek_at(1) {
                Some("export") | Some("import") | Some("type") => self.skip_form()?,
                Some("param") => {
                    self.pos += 2;
                    params += self.parse_slot_declaration()?;
                }
                Some("local") => {
                    // locals follow every parameter, named or only in the type
                    if let Some(sig) = signature {
                        while self.locals.slots() < sig.params {
                            self.locals.declare(None);
                        }
                    }
                    self.pos += 2;
                    locals += self.parse_slot_declaration()?;
                }
                Some("result") => {
                    self.pos += 2;
                    while self.peek() != Some(")") {
                        match self.peek() {
                            None => return Err(self.eof()),
                            Some("(") => self.skip_form()?,
                            Some(_) => self.pos += 1,
                        }
                        results += 1;
                    }
                    self.pos += 1;
                }
                _ => break,
            }
        }

        let (param_count, local_count, result_count) = match signature {
            Some(sig) => (sig.params, sig.locals, sig.results),
            None => (params, locals, results),
        };
        self.locals.slots = param_count + local_count;

        let body = self.parse_function_body()?;
        self.expect_close()?;
        if !self.is_at_end() {
            return Err(self.expected("end of function"));
        }

        let func = WasmFunction {
            name,
            index,
            body,
            param_count,
            local_count,
            result_count,
            aliases: std::mem::take(&mut self.locals).into_aliases(),
        };
        debug!(
            "parsed function {}: {} top-level nodes, {} params, {} locals, {} results",
            func.display_name(),
            func.body.len(),
            param_count,
            local_count,
            result_count
        );
        Ok(func)
    }

    /// Rest of a `(param ..)`/`(local ..)` declaration after its keyword.
    /// Returns the number of slots declared.
    fn parse_slot_declaration(&mut self) -> Result<u32, ParseError> {
        if let Some(name) = self.take_label() {
            self.locals.declare(Some(&name));
            self.skip_rest_of_form()?;
            return Ok(1);
        }
        let mut count = 0;
        loop {
            match self.peek() {
                None => return Err(self.eof()),
                Some(")") => {
                    self.pos += 1;
                    return Ok(count);
                }
                Some("(") => self.skip_form()?,
                Some(_) => self.pos += 1,
            }
            self.locals.declare(None);
            count += 1;
        }
    }
}

fn const_type(head: &str) -> Option<NumType> {
    head.strip_suffix(".const").and_then(NumType::from_prefix)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_label_token(tok: &str) -> bool {
    is_digits(tok) || (tok.starts_with('$') && tok.len() > 1)
}

/// Tokens that can only be immediates of a preceding instruction.
fn is_immediate(tok: &str) -> bool {
    tok.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '$' | '-' | '+'))
        || tok.contains('=')
}

fn at_most_one(mut nodes: Vec<WasmNode>) -> Result<Option<Box<WasmNode>>, ()> {
    match nodes.len() {
        0 => Ok(None),
        1 => Ok(nodes.pop().map(Box::new)),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenize;

    fn parse_one(text: &str, slots: u32) -> Result<WasmNode, ParseError> {
        let tokens = tokenize(text);
        let mut parser = Parser::new(&tokens, LocalTable::with_slots(slots));
        parser.parse_node()
    }

    fn i32c(v: &str) -> WasmNode {
        WasmNode::Const {
            ty: NumType::I32,
            literal: v.to_string(),
        }
    }

    #[test]
    fn folded_binary_operator() {
        let node = parse_one("(i32.add (local.get 0) (i32.const 1))", 1).unwrap();
        assert_eq!(
            node,
            WasmNode::BinaryOp {
                op: "i32.add".into(),
                left: Some(Box::new(WasmNode::LocalGet(0))),
                right: Some(Box::new(i32c("1"))),
            }
        );
    }

    #[test]
    fn single_operand_is_right_hand_side() {
        let node = parse_one("(i32.sub (i32.const 1))", 0).unwrap();
        assert_eq!(
            node,
            WasmNode::BinaryOp {
                op: "i32.sub".into(),
                left: None,
                right: Some(Box::new(i32c("1"))),
            }
        );
    }

    #[test]
    fn block_label_and_annotation() {
        let node = parse_one("(block $b (result i32) (i32.const 7) (br 0))", 0).unwrap();
        assert_eq!(
            node,
            WasmNode::Block {
                label: Some("b".into()),
                body: vec![
                    i32c("7"),
                    WasmNode::Br {
                        target: LabelRef::Depth(0),
                        operands: vec![]
                    }
                ],
            }
        );
    }

    #[test]
    fn if_single_form_arms() {
        let node = parse_one("(if (local.get 0) (nop) (unreachable))", 1).unwrap();
        assert_eq!(
            node,
            WasmNode::If {
                label: None,
                cond: vec![WasmNode::LocalGet(0)],
                then_body: vec![WasmNode::Nop],
                else_body: Some(vec![WasmNode::Unreachable]),
            }
        );
    }

    #[test]
    fn if_then_else_arms_take_all_children() {
        let node = parse_one(
            "(if (result i32) (local.get 0) (then (i32.const 1) (drop) (i32.const 2)) (else (i32.const 3)))",
            1,
        )
        .unwrap();
        let WasmNode::If {
            cond,
            then_body,
            else_body,
            ..
        } = node
        else {
            panic!("expected if");
        };
        assert_eq!(cond, vec![WasmNode::LocalGet(0)]);
        assert_eq!(then_body.len(), 3);
        assert_eq!(else_body, Some(vec![i32c("3")]));
    }

    #[test]
    fn if_without_then_arm_fails() {
        let err = parse_one("(if (local.get 0))", 1).unwrap_err();
        assert!(matches!(err, ParseError::Expected { .. }));
    }

    #[test]
    fn br_table_selector_first_or_last() {
        let first = parse_one("(br_table (local.get 0) 0 1 $out)", 1).unwrap();
        let last = parse_one("(br_table 0 1 $out (local.get 0))", 1).unwrap();
        let expected = WasmNode::BrTable {
            operands: vec![WasmNode::LocalGet(0)],
            targets: vec![LabelRef::Depth(0), LabelRef::Depth(1)],
            default: LabelRef::Name("out".into()),
        };
        assert_eq!(first, expected);
        assert_eq!(last, expected);
    }

    #[test]
    fn br_table_errors() {
        assert!(matches!(
            parse_one("(br_table 0 1)", 0),
            Err(ParseError::BrTableWithoutSelector { .. })
        ));
        assert!(matches!(
            parse_one("(br_table (i32.const 0))", 0),
            Err(ParseError::BrTableWithoutTargets { .. })
        ));
    }

    #[test]
    fn call_keeps_argument_order() {
        let node = parse_one("(call $f (i32.const 1) (i32.const 2))", 0).unwrap();
        assert_eq!(
            node,
            WasmNode::Call {
                target: "$f".into(),
                args: vec![i32c("1"), i32c("2")],
            }
        );
    }

    #[test]
    fn local_resolution() {
        let tokens = tokenize("(local.get $x) (local.get $1) (local.get $y)");
        let mut table = LocalTable::default();
        table.declare(Some("x"));
        table.declare(None);
        let mut parser = Parser::new(&tokens, table);
        assert_eq!(parser.parse_node().unwrap(), WasmNode::LocalGet(0));
        // `$<digits>` falls back to a direct index
        assert_eq!(parser.parse_node().unwrap(), WasmNode::LocalGet(1));
        assert!(matches!(
            parser.parse_node(),
            Err(ParseError::UnresolvedLocal { ref name, .. }) if name == "$y"
        ));
    }

    #[test]
    fn local_out_of_range() {
        assert!(matches!(
            parse_one("(local.get 2)", 2),
            Err(ParseError::LocalOutOfRange { slot: 2, slots: 2, .. })
        ));
    }

    #[test]
    fn unknown_form_is_raw_and_skipped() {
        let tokens = tokenize("(i32.store (local.get 0) (i32.const 1)) (nop)");
        let mut parser = Parser::new(&tokens, LocalTable::with_slots(1));
        assert_eq!(
            parser.parse_node().unwrap(),
            WasmNode::Raw("i32.store".into())
        );
        assert_eq!(parser.parse_node().unwrap(), WasmNode::Nop);
    }

    #[test]
    fn flat_instructions() {
        let tokens = tokenize(
            "block $b loop $l local.get 0 br_if $l global.get 0 drop end end $b i32.const 1",
        );
        let mut parser = Parser::new(&tokens, LocalTable::with_slots(1));
        let body = parser.parse_function_body().unwrap();
        assert_eq!(body.len(), 2);
        let WasmNode::Block { label, body: inner } = &body[0] else {
            panic!("expected block");
        };
        assert_eq!(label.as_deref(), Some("b"));
        let WasmNode::Loop { body: loop_body, .. } = &inner[0] else {
            panic!("expected loop");
        };
        assert_eq!(
            loop_body,
            &vec![
                WasmNode::LocalGet(0),
                WasmNode::BrIf {
                    target: LabelRef::Name("l".into()),
                    operands: vec![]
                },
                WasmNode::Raw("global.get".into()),
                WasmNode::UnaryOp {
                    op: "drop".into(),
                    operand: None
                },
            ]
        );
        assert_eq!(body[1], i32c("1"));
    }

    #[test]
    fn flat_if_else() {
        let tokens = tokenize("if (result i32) i32.const 1 else i32.const 2 end");
        let mut parser = Parser::new(&tokens, LocalTable::default());
        assert_eq!(
            parser.parse_node().unwrap(),
            WasmNode::If {
                label: None,
                cond: vec![],
                then_body: vec![i32c("1")],
                else_body: Some(vec![i32c("2")]),
            }
        );
    }

    #[test]
    fn missing_close_reports_window() {
        let err = parse_one("(block (nop)", 0).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { index: 5, .. }));
        let err = parse_one("(i32.const 1 2)", 0).unwrap_err();
        let ParseError::Expected {
            expected, found, ..
        } = err
        else {
            panic!("expected `Expected`");
        };
        assert_eq!(expected, "`)`");
        assert_eq!(found, "2");
    }

    #[test]
    fn function_form_declarations() {
        let tokens = tokenize(
            "(func $f (export \"f\") (param $a i32) (param i64 f32) (result i32) (local $t i32) (local.get $t))",
        );
        let mut parser = Parser::new(&tokens, LocalTable::default());
        let func = parser.parse_function_form(4, None).unwrap();
        assert_eq!(func.name.as_deref(), Some("f"));
        assert_eq!(func.index, 4);
        assert_eq!(func.param_count, 3);
        assert_eq!(func.local_count, 1);
        assert_eq!(func.result_count, 1);
        assert_eq!(func.aliases.get("a"), Some(&0));
        assert_eq!(func.aliases.get("t"), Some(&3));
        assert_eq!(func.body, vec![WasmNode::LocalGet(3)]);
    }

    #[test]
    fn signature_places_locals_after_type_params() {
        let tokens = tokenize("(func (type 0) (local $x i32) (local.get $x))");
        let sig = FunctionSignature {
            params: 2,
            results: 1,
            locals: 1,
        };
        let mut parser = Parser::new(&tokens, LocalTable::default());
        let func = parser.parse_function_form(0, Some(&sig)).unwrap();
        assert_eq!(func.param_count, 2);
        assert_eq!(func.result_count, 1);
        assert_eq!(func.body, vec![WasmNode::LocalGet(2)]);
    }
}
