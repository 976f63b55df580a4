//! Verification IR: a Boogie-style program of global variables, pure
//! functions, procedures with contracts, and implementations made of
//! structured statements plus labels and gotos.
//!
//! The types here are plain data; [`display`] serializes them one
//! declaration per line group, and [`pretty`] re-indents the result.

mod display;
pub mod pretty;

/// Value types of the IR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Real,
    Bool,
    /// `[domain]range`
    Map(Box<Type>, Box<Type>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Int(i64),
    Real(f64),
    /// Exact real literal in decimal text, e.g. `18446744073709551615.0`.
    Decimal(String),
    Bool(bool),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Application of a pure function.
    Call(String, Vec<Expr>),
    /// `map[index]`
    MapSelect(Box<Expr>, Box<Expr>),
    Ite(Box<Expr>, Box<Expr>, Box<Expr>),
    Old(Box<Expr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(name.into(), args)
    }

    pub fn select(map: Expr, index: Expr) -> Self {
        Expr::MapSelect(Box::new(map), Box::new(index))
    }

    pub fn ite(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Ite(Box::new(cond), Box::new(then), Box::new(otherwise))
    }

    pub fn old(inner: Expr) -> Self {
        Expr::Old(Box::new(inner))
    }

    pub fn neg(inner: Expr) -> Self {
        Expr::Neg(Box::new(inner))
    }

    /// `base + delta` with literal folding of a zero or negative delta.
    pub fn offset(base: Expr, delta: i64) -> Self {
        match delta {
            0 => base,
            d if d > 0 => Expr::binary(BinOp::Add, base, Expr::Int(d)),
            d => Expr::binary(BinOp::Sub, base, Expr::Int(-d)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `lhs := rhs;`, where `lhs` is an identifier or a map select.
    Assign(Expr, Expr),
    Call {
        callee: String,
        args: Vec<Expr>,
        outs: Vec<String>,
    },
    Havoc(Vec<String>),
    Assume(Expr),
    Assert(Expr),
    Goto(Vec<String>),
    Label(String),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    Comment(String),
}

impl Stmt {
    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign(Expr::Ident(name.into()), value)
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Self {
        Stmt::Call {
            callee: callee.into(),
            args,
            outs: Vec::new(),
        }
    }

    pub fn goto(label: impl Into<String>) -> Self {
        Stmt::Goto(vec![label.into()])
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Stmt::Comment(text.into())
    }
}

/// A typed name: a global, a formal, or an implementation local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// `{:key value}` attribute on a procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Procedure {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub params: Vec<Variable>,
    pub returns: Vec<Variable>,
    pub modifies: Vec<String>,
    pub ensures: Vec<Expr>,
}

impl Procedure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            params: Vec::new(),
            returns: Vec::new(),
            modifies: Vec::new(),
            ensures: Vec::new(),
        }
    }

    /// Mark for inlining at call sites (`{:inline 1}`).
    pub fn inline(mut self) -> Self {
        self.attributes.push(Attribute {
            key: "inline".to_string(),
            value: Some(Expr::Int(1)),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Implementation {
    pub name: String,
    pub params: Vec<Variable>,
    pub returns: Vec<Variable>,
    pub locals: Vec<Variable>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Comment(String),
    Global(Variable),
    /// Pure function; body-less functions are uninterpreted.
    Function {
        name: String,
        params: Vec<Variable>,
        ret: Type,
        body: Option<Expr>,
    },
    Procedure(Procedure),
    Implementation(Implementation),
}

/// Ordered declarations of one translated module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub decls: Vec<Decl>,
}

impl Program {
    pub fn push(&mut self, decl: Decl) {
        self.decls.push(decl);
    }

    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.decls.iter().find_map(|d| match d {
            Decl::Procedure(p) if p.name == name => Some(p),
            _ => None,
        })
    }

    pub fn implementation(&self, name: &str) -> Option<&Implementation> {
        self.decls.iter().find_map(|d| match d {
            Decl::Implementation(i) if i.name == name => Some(i),
            _ => None,
        })
    }

    pub fn function_body(&self, name: &str) -> Option<(&[Variable], &Expr)> {
        self.decls.iter().find_map(|d| match d {
            Decl::Function {
                name: n,
                params,
                body: Some(body),
                ..
            } if n == name => Some((params.as_slice(), body)),
            _ => None,
        })
    }

    pub fn globals(&self) -> impl Iterator<Item = &Variable> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Global(v) => Some(v),
            _ => None,
        })
    }

    /// Serialize, optionally through the pretty-printer.
    pub fn render(&self, pretty: bool) -> String {
        let flat = self.to_string();
        if pretty {
            pretty::indent_boogie(&flat)
        } else {
            flat
        }
    }
}
