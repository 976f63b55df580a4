//! Fixed declarations every translated program starts with, plus the
//! arity-specific argument helpers and import stubs.
//!
//! The modeled operand stack grows upward: `push` writes `$stack[$sp]` and
//! increments `$sp`; every pop decrements `$sp` first and then reads.

use crate::boogie::{BinOp, Decl, Expr, Implementation, Procedure, Stmt, Type, Variable};

pub const STACK: &str = "$stack";
pub const SP: &str = "$sp";
pub const TMP: [&str; 3] = ["$tmp1", "$tmp2", "$tmp3"];

pub const PUSH: &str = "push";
pub const POP: &str = "pop";
pub const POP_TO_TMP: [&str; 3] = ["popToTmp1", "popToTmp2", "popToTmp3"];
pub const BOOL_TO_REAL: &str = "bool_to_real";
pub const REAL_TO_BOOL: &str = "real_to_bool";
pub const REAL_TO_INT: &str = "real_to_int";

/// Globals written by any translated function.
pub fn function_modifies() -> Vec<String> {
    TMP.iter()
        .chain([SP, STACK].iter())
        .map(|s| s.to_string())
        .collect()
}

pub fn pop_args_name(arity: u32) -> String {
    format!("popArgs{arity}")
}

fn sp() -> Expr {
    Expr::ident(SP)
}

fn stack_top() -> Expr {
    Expr::select(Expr::ident(STACK), sp())
}

fn decrement_sp() -> Stmt {
    Stmt::assign(SP, Expr::binary(BinOp::Sub, sp(), Expr::Int(1)))
}

fn stack_type() -> Type {
    Type::Map(Box::new(Type::Int), Box::new(Type::Real))
}

/// Globals, conversion functions and stack primitives.
pub fn prelude() -> Vec<Decl> {
    let mut decls = vec![
        Decl::Global(Variable::new(STACK, stack_type())),
        Decl::Global(Variable::new(SP, Type::Int)),
    ];
    decls.extend(TMP.iter().map(|t| Decl::Global(Variable::new(*t, Type::Real))));

    decls.push(Decl::Function {
        name: BOOL_TO_REAL.to_string(),
        params: vec![Variable::new("b", Type::Bool)],
        ret: Type::Real,
        body: Some(Expr::ite(Expr::ident("b"), Expr::Real(1.0), Expr::Real(0.0))),
    });
    decls.push(Decl::Function {
        name: REAL_TO_BOOL.to_string(),
        params: vec![Variable::new("r", Type::Real)],
        ret: Type::Bool,
        body: Some(Expr::ite(
            Expr::binary(BinOp::Eq, Expr::ident("r"), Expr::Real(0.0)),
            Expr::Bool(false),
            Expr::Bool(true),
        )),
    });
    decls.push(Decl::Function {
        name: REAL_TO_INT.to_string(),
        params: vec![Variable::new("r", Type::Real)],
        ret: Type::Int,
        body: Some(Expr::call("int", vec![Expr::ident("r")])),
    });

    // push(val)
    let mut push = Procedure::new(PUSH).inline();
    push.params.push(Variable::new("val", Type::Real));
    push.modifies = vec![SP.to_string(), STACK.to_string()];
    decls.push(Decl::Procedure(push));
    decls.push(Decl::Implementation(Implementation {
        name: PUSH.to_string(),
        params: vec![Variable::new("val", Type::Real)],
        returns: vec![],
        locals: vec![],
        body: vec![
            Stmt::Assign(stack_top(), Expr::ident("val")),
            Stmt::assign(SP, Expr::binary(BinOp::Add, sp(), Expr::Int(1))),
        ],
    }));

    for (name, tmp) in POP_TO_TMP.iter().zip(TMP) {
        let mut proc = Procedure::new(*name).inline();
        proc.modifies = vec![SP.to_string(), tmp.to_string()];
        decls.push(Decl::Procedure(proc));
        decls.push(Decl::Implementation(Implementation {
            name: name.to_string(),
            params: vec![],
            returns: vec![],
            locals: vec![],
            body: vec![
                Stmt::Assume(Expr::binary(BinOp::Gt, sp(), Expr::Int(0))),
                decrement_sp(),
                Stmt::assign(tmp, stack_top()),
            ],
        }));
    }

    let mut pop = Procedure::new(POP).inline();
    pop.modifies = vec![SP.to_string()];
    decls.push(Decl::Procedure(pop));
    decls.push(Decl::Implementation(Implementation {
        name: POP.to_string(),
        params: vec![],
        returns: vec![],
        locals: vec![],
        body: vec![
            Stmt::Assume(Expr::binary(BinOp::Gt, sp(), Expr::Int(0))),
            decrement_sp(),
        ],
    }));
    decls
}

/// `popArgsN`: pops N values, the top of stack landing in the last output.
pub fn pop_args_helper(arity: u32) -> [Decl; 2] {
    let name = pop_args_name(arity);
    let returns: Vec<Variable> = (1..=arity)
        .map(|i| Variable::new(format!("a{i}"), Type::Real))
        .collect();

    let mut proc = Procedure::new(name.clone()).inline();
    proc.returns = returns.clone();
    proc.modifies = vec![SP.to_string()];

    let mut body = vec![Stmt::Assume(Expr::binary(
        BinOp::Ge,
        sp(),
        Expr::Int(i64::from(arity)),
    ))];
    for i in (1..=arity).rev() {
        body.push(decrement_sp());
        body.push(Stmt::assign(format!("a{i}"), stack_top()));
    }

    [
        Decl::Procedure(proc),
        Decl::Implementation(Implementation {
            name,
            params: vec![],
            returns,
            locals: vec![],
            body,
        }),
    ]
}

/// Body-less procedure for an imported function: it pops its `params` and
/// leaves `results` values, nothing else is known about it.
pub fn import_procedure(name: &str, params: u32, results: u32) -> Decl {
    let mut proc = Procedure::new(name);
    proc.modifies = function_modifies();
    proc.ensures.push(stack_effect(Expr::old(sp()), params, results));
    Decl::Procedure(proc)
}

/// `$sp == base - params + results`
pub fn stack_effect(base: Expr, params: u32, results: u32) -> Expr {
    let delta = i64::from(results) - i64::from(params);
    Expr::binary(BinOp::Eq, sp(), Expr::offset(base, delta))
}

const RESERVED: &[&str] = &[
    PUSH,
    POP,
    BOOL_TO_REAL,
    REAL_TO_BOOL,
    REAL_TO_INT,
    "int",
    "real",
    "bool",
    "old",
    "var",
    "call",
    "goto",
    "if",
    "then",
    "else",
    "while",
    "break",
    "return",
    "returns",
    "havoc",
    "assume",
    "assert",
    "requires",
    "ensures",
    "modifies",
    "procedure",
    "implementation",
    "function",
    "axiom",
    "const",
    "type",
    "true",
    "false",
    "forall",
    "exists",
    "div",
    "mod",
];

/// Turn a WebAssembly name into a procedure identifier.
///
/// Non-identifier characters become `_`, an all-digit name is `func_<N>`, a
/// leading digit gets a `_` prefix, and names that clash with the prelude or
/// an IR keyword get a `wasm_` prefix.
pub fn sanitize(name: &str) -> String {
    let name = name.strip_prefix('$').unwrap_or(name);
    if name.is_empty() {
        return "_".to_string();
    }
    if name.bytes().all(|b| b.is_ascii_digit()) {
        return format!("func_{name}");
    }
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if is_reserved(&ident) {
        ident.insert_str(0, "wasm_");
    }
    ident
}

fn is_reserved(ident: &str) -> bool {
    RESERVED.contains(&ident)
        || POP_TO_TMP.contains(&ident)
        || ident
            .strip_prefix("popArgs")
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}
