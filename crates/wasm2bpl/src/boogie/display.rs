//! Textual serialization of the verification IR.
//!
//! Output is one statement per line with no indentation; nested binary
//! operands are always parenthesized so no precedence table is needed.

use super::{Attribute, BinOp, Decl, Expr, Implementation, Procedure, Program, Stmt, Type, Variable};
use std::fmt;

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Real => write!(f, "real"),
            Type::Bool => write!(f, "bool"),
            Type::Map(dom, range) => write!(f, "[{dom}]{range}"),
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        f.write_str(s)
    }
}

/// Real literal in decimal form, always with a fractional part.
pub(crate) fn real_literal(value: f64) -> String {
    let text = format!("{value}");
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

impl Expr {
    fn is_atomic(&self) -> bool {
        match self {
            Expr::Ident(_)
            | Expr::Bool(_)
            | Expr::Call(..)
            | Expr::MapSelect(..)
            | Expr::Old(_) => true,
            Expr::Int(v) => *v >= 0,
            Expr::Real(v) => v.is_sign_positive(),
            Expr::Decimal(text) => !text.starts_with('-'),
            Expr::Neg(_) | Expr::Binary(..) | Expr::Ite(..) => false,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_atomic() {
            write!(f, "{self}")
        } else {
            write!(f, "({self})")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(name) => f.write_str(name),
            Expr::Int(v) => write!(f, "{v}"),
            Expr::Real(v) => f.write_str(&real_literal(*v)),
            Expr::Decimal(text) => f.write_str(text),
            Expr::Bool(v) => write!(f, "{v}"),
            Expr::Neg(inner) => {
                f.write_str("-")?;
                inner.fmt_operand(f)
            }
            Expr::Binary(op, lhs, rhs) => {
                lhs.fmt_operand(f)?;
                write!(f, " {op} ")?;
                rhs.fmt_operand(f)
            }
            Expr::Call(name, args) => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::MapSelect(map, index) => {
                map.fmt_operand(f)?;
                write!(f, "[{index}]")
            }
            Expr::Ite(cond, then, otherwise) => {
                write!(f, "if {cond} then {then} else {otherwise}")
            }
            Expr::Old(inner) => write!(f, "old({inner})"),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{{:{} {value}}}", self.key),
            None => write!(f, "{{:{}}}", self.key),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assign(lhs, rhs) => write!(f, "{lhs} := {rhs};"),
            Stmt::Call { callee, args, outs } => {
                f.write_str("call ")?;
                if !outs.is_empty() {
                    write_list(f, outs)?;
                    f.write_str(" := ")?;
                }
                write!(f, "{callee}(")?;
                write_list(f, args)?;
                f.write_str(");")
            }
            Stmt::Havoc(names) => {
                f.write_str("havoc ")?;
                write_list(f, names)?;
                f.write_str(";")
            }
            Stmt::Assume(e) => write!(f, "assume {e};"),
            Stmt::Assert(e) => write!(f, "assert {e};"),
            Stmt::Goto(labels) => {
                f.write_str("goto ")?;
                write_list(f, labels)?;
                f.write_str(";")
            }
            Stmt::Label(name) => write!(f, "{name}:"),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                writeln!(f, "if ({cond}) {{")?;
                for stmt in then_branch {
                    writeln!(f, "{stmt}")?;
                }
                if let Some(else_branch) = else_branch {
                    writeln!(f, "}} else {{")?;
                    for stmt in else_branch {
                        writeln!(f, "{stmt}")?;
                    }
                }
                f.write_str("}")
            }
            Stmt::Comment(text) => write!(f, "// {text}"),
        }
    }
}

fn write_signature(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    params: &[Variable],
    returns: &[Variable],
) -> fmt::Result {
    write!(f, "{name}(")?;
    write_list(f, params)?;
    f.write_str(")")?;
    if !returns.is_empty() {
        f.write_str(" returns (")?;
        write_list(f, returns)?;
        f.write_str(")")?;
    }
    Ok(())
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("procedure ")?;
        for attr in &self.attributes {
            write!(f, "{attr} ")?;
        }
        write_signature(f, &self.name, &self.params, &self.returns)?;
        f.write_str(";")?;
        if !self.modifies.is_empty() {
            f.write_str("\nmodifies ")?;
            write_list(f, &self.modifies)?;
            f.write_str(";")?;
        }
        for e in &self.ensures {
            write!(f, "\nensures {e};")?;
        }
        Ok(())
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("implementation ")?;
        write_signature(f, &self.name, &self.params, &self.returns)?;
        f.write_str("\n{\n")?;
        for local in &self.locals {
            writeln!(f, "var {local};")?;
        }
        for stmt in &self.body {
            writeln!(f, "{stmt}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Display for Decl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decl::Comment(text) => write!(f, "// {text}"),
            Decl::Global(var) => write!(f, "var {var};"),
            Decl::Function {
                name,
                params,
                ret,
                body,
            } => {
                write!(f, "function {name}(")?;
                write_list(f, params)?;
                write!(f, "): {ret}")?;
                match body {
                    Some(body) => write!(f, " {{ {body} }}"),
                    None => f.write_str(";"),
                }
            }
            Decl::Procedure(p) => write!(f, "{p}"),
            Decl::Implementation(i) => write!(f, "{i}"),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prev_comment = false;
        for (i, decl) in self.decls.iter().enumerate() {
            let is_comment = matches!(decl, Decl::Comment(_));
            // keep comment runs and procedure/implementation pairs together
            let joined = matches!(decl, Decl::Implementation(_)) || (is_comment && prev_comment);
            if i > 0 && !joined {
                f.write_str("\n")?;
            }
            writeln!(f, "{decl}")?;
            prev_comment = is_comment;
        }
        Ok(())
    }
}
