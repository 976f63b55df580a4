//! Typed AST for WebAssembly text function bodies.
//!
//! The tree mirrors the folded (parenthesized) instruction syntax: a folded
//! form owns its operand sub-expressions, which are evaluated left to right
//! before the instruction itself. Operands written in flat style are already
//! on the operand stack, so every operand slot is optional.

mod dump;
pub mod ops;

pub use dump::{dump, AstDump};

use std::collections::HashMap;
use std::fmt;

/// Numeric type of a `<type>.const` literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumType {
    I32,
    I64,
    F32,
    F64,
}

impl NumType {
    /// Parse the prefix of a typed instruction name (`i32` in `i32.add`).
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "i32" => Some(NumType::I32),
            "i64" => Some(NumType::I64),
            "f32" => Some(NumType::F32),
            "f64" => Some(NumType::F64),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumType::F32 | NumType::F64)
    }
}

impl fmt::Display for NumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumType::I32 => write!(f, "i32"),
            NumType::I64 => write!(f, "i64"),
            NumType::F32 => write!(f, "f32"),
            NumType::F64 => write!(f, "f64"),
        }
    }
}

/// Target of a branch: a nesting depth counted outward from the innermost
/// open scope, or a symbolic label (stored without the `$` sigil).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LabelRef {
    Depth(u32),
    Name(String),
}

impl LabelRef {
    /// An all-digit token is a depth, anything else a name.
    pub fn from_token(token: &str) -> Self {
        match token.parse::<u32>() {
            Ok(depth) if token.bytes().all(|b| b.is_ascii_digit()) => LabelRef::Depth(depth),
            _ => LabelRef::Name(token.strip_prefix('$').unwrap_or(token).to_string()),
        }
    }
}

impl fmt::Display for LabelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelRef::Depth(d) => write!(f, "{d}"),
            LabelRef::Name(n) => write!(f, "${n}"),
        }
    }
}

/// Module-structure heads that are flattened into their children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralHead {
    Module,
    Type,
    Func,
}

impl StructuralHead {
    pub fn from_keyword(kw: &str) -> Option<Self> {
        match kw {
            "module" => Some(StructuralHead::Module),
            "type" => Some(StructuralHead::Type),
            "func" => Some(StructuralHead::Func),
            _ => None,
        }
    }
}

impl fmt::Display for StructuralHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralHead::Module => write!(f, "module"),
            StructuralHead::Type => write!(f, "type"),
            StructuralHead::Func => write!(f, "func"),
        }
    }
}

/// One instruction of a function body.
///
/// Children are owned exclusively; the tree is never mutated after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum WasmNode {
    /// `<type>.const <literal>`, literal kept as written.
    Const { ty: NumType, literal: String },
    LocalGet(u32),
    LocalSet {
        slot: u32,
        value: Option<Box<WasmNode>>,
    },
    LocalTee {
        slot: u32,
        value: Option<Box<WasmNode>>,
    },
    /// Target as written (`$f` or a function index).
    Call { target: String, args: Vec<WasmNode> },
    UnaryOp {
        op: String,
        operand: Option<Box<WasmNode>>,
    },
    /// A single folded operand is the right-hand side; the left is on the stack.
    BinaryOp {
        op: String,
        left: Option<Box<WasmNode>>,
        right: Option<Box<WasmNode>>,
    },
    /// Folded operands in order `v1 v2 cond`, possibly partial.
    Select { operands: Vec<WasmNode> },
    Block {
        label: Option<String>,
        body: Vec<WasmNode>,
    },
    Loop {
        label: Option<String>,
        body: Vec<WasmNode>,
    },
    /// `module`/`type`/`func` wrapper, transparent to lowering.
    Structural {
        head: StructuralHead,
        body: Vec<WasmNode>,
    },
    /// `cond` holds the folded condition expressions; empty means the
    /// condition is already on the stack.
    If {
        label: Option<String>,
        cond: Vec<WasmNode>,
        then_body: Vec<WasmNode>,
        else_body: Option<Vec<WasmNode>>,
    },
    /// Operands are branch values pushed before the jump.
    Br {
        target: LabelRef,
        operands: Vec<WasmNode>,
    },
    /// The last operand, when present, is the condition.
    BrIf {
        target: LabelRef,
        operands: Vec<WasmNode>,
    },
    /// The last operand, when present, is the selector.
    BrTable {
        operands: Vec<WasmNode>,
        targets: Vec<LabelRef>,
        default: LabelRef,
    },
    Return { operands: Vec<WasmNode> },
    Nop,
    Unreachable,
    /// Unrecognized instruction head; its children were skipped.
    Raw(String),
}

/// Parameter/result/local counts as seen by the host module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionSignature {
    pub params: u32,
    pub results: u32,
    pub locals: u32,
}

/// A parsed function body together with its local-slot layout.
///
/// Slots `0..param_count` are parameters, `param_count..param_count +
/// local_count` are declared locals.
#[derive(Debug, Clone, PartialEq)]
pub struct WasmFunction {
    /// Declared name, without the `$` sigil.
    pub name: Option<String>,
    /// Position in the module's function index space (imports first).
    pub index: u32,
    pub body: Vec<WasmNode>,
    pub param_count: u32,
    pub local_count: u32,
    pub result_count: u32,
    /// Textual alias (without `$`) to slot index.
    pub aliases: HashMap<String, u32>,
}

impl WasmFunction {
    /// Name used in log lines and errors.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("${name}"),
            None => format!("#{}", self.index),
        }
    }
}

/// An imported function, visible to callers but without a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedFunction {
    pub index: u32,
    pub module: String,
    pub field: String,
    /// Name from the `name` section, without `$`.
    pub name: Option<String>,
    pub param_count: u32,
    pub result_count: u32,
}

/// Ordered functions of one module; output order follows this order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WasmModule {
    pub imports: Vec<ImportedFunction>,
    pub functions: Vec<WasmFunction>,
}

impl WasmModule {
    pub fn from_functions(functions: Vec<WasmFunction>) -> Self {
        Self {
            imports: Vec::new(),
            functions,
        }
    }
}
