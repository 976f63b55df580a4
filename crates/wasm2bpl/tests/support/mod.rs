//! A small interpreter for translated programs.
//!
//! Executes implementations statement by statement over concrete values so
//! integration tests can check what a translated function computes, not
//! just what its text looks like. Body-less procedures (imports) are
//! simulated through their `$sp == ...` postcondition.

#![allow(dead_code)]

use std::collections::HashMap;
use std::rc::Rc;
use wasm2bpl::boogie::{BinOp, Expr, Program, Stmt, Type};

const STEP_LIMIT: usize = 200_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Bool(bool),
}

impl Value {
    fn default_for(ty: &Type) -> Self {
        match ty {
            Type::Int => Value::Int(0),
            Type::Bool => Value::Bool(false),
            Type::Real | Type::Map(..) => Value::Real(0.0),
        }
    }
}

/// Why execution stopped early.
#[derive(Debug, Clone, PartialEq)]
pub enum Stop {
    /// An `assume` did not hold; the path is infeasible.
    Blocked,
    AssertFailed(String),
    StepLimit,
    Error(String),
}

fn error<T>(message: impl Into<String>) -> Result<T, Stop> {
    Err(Stop::Error(message.into()))
}

#[derive(Debug, Clone, Default)]
struct Globals {
    scalars: HashMap<String, Value>,
    stack: HashMap<i64, f64>,
}

struct Frame {
    locals: HashMap<String, Value>,
    /// Globals at procedure entry, for `old(...)`.
    old: Rc<Globals>,
}

enum Flow {
    Next,
    Goto(String),
}

pub struct Machine<'p> {
    program: &'p Program,
    globals: Globals,
    steps: usize,
    /// Value given to havocked variables.
    pub havoc: f64,
}

impl<'p> Machine<'p> {
    pub fn new(program: &'p Program) -> Self {
        let mut globals = Globals::default();
        for var in program.globals() {
            globals
                .scalars
                .insert(var.name.clone(), Value::default_for(&var.ty));
        }
        Self {
            program,
            globals,
            steps: 0,
            havoc: 0.0,
        }
    }

    pub fn sp(&self) -> i64 {
        match self.globals.scalars.get("$sp") {
            Some(Value::Int(sp)) => *sp,
            _ => 0,
        }
    }

    /// Values from the bottom of the stack up to `$sp`.
    pub fn stack(&self) -> Vec<f64> {
        (0..self.sp())
            .map(|i| self.globals.stack.get(&i).copied().unwrap_or(0.0))
            .collect()
    }

    /// Push `args`, call `procedure` and return the stack afterwards.
    pub fn run(&mut self, procedure: &str, args: &[f64]) -> Result<Vec<f64>, Stop> {
        for arg in args {
            let sp = self.sp();
            self.globals.stack.insert(sp, *arg);
            self.globals
                .scalars
                .insert("$sp".to_string(), Value::Int(sp + 1));
        }
        self.call(procedure, Vec::new())?;
        Ok(self.stack())
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Vec<Value>, Stop> {
        let program = self.program;
        let Some(proc) = program.procedure(name) else {
            return error(format!("no procedure {name}"));
        };
        let old = Rc::new(self.globals.clone());

        let Some(imp) = program.implementation(name) else {
            // body-less: scratch state is unknown, `$sp` follows the contract
            let frame = Frame {
                locals: HashMap::new(),
                old,
            };
            for var in &proc.modifies {
                if var.starts_with("$tmp") {
                    self.globals
                        .scalars
                        .insert(var.clone(), Value::Real(self.havoc));
                }
            }
            for ensures in &proc.ensures {
                if let Expr::Binary(BinOp::Eq, lhs, rhs) = ensures {
                    if let Expr::Ident(var) = lhs.as_ref() {
                        let value = self.eval(rhs, &frame, &self.globals)?;
                        self.globals.scalars.insert(var.clone(), value);
                    }
                }
            }
            return Ok(Vec::new());
        };

        let mut locals = HashMap::new();
        for (param, value) in imp.params.iter().zip(args) {
            locals.insert(param.name.clone(), value);
        }
        for var in imp.returns.iter().chain(&imp.locals) {
            locals.insert(var.name.clone(), Value::default_for(&var.ty));
        }
        let mut frame = Frame { locals, old };
        if let Flow::Goto(label) = self.exec_block(&imp.body, &mut frame)? {
            return error(format!("{name}: no label {label}"));
        }
        for ensures in &proc.ensures {
            if !self.truth(ensures, &frame)? {
                return Err(Stop::AssertFailed(format!("{name}: ensures {ensures}")));
            }
        }
        Ok(imp
            .returns
            .iter()
            .map(|v| frame.locals[&v.name])
            .collect())
    }

    fn exec_block(&mut self, stmts: &[Stmt], frame: &mut Frame) -> Result<Flow, Stop> {
        let mut pc = 0;
        while pc < stmts.len() {
            self.steps += 1;
            if self.steps > STEP_LIMIT {
                return Err(Stop::StepLimit);
            }
            match self.exec(&stmts[pc], frame)? {
                Flow::Next => pc += 1,
                Flow::Goto(label) => {
                    let target = stmts
                        .iter()
                        .position(|s| matches!(s, Stmt::Label(l) if *l == label));
                    match target {
                        Some(i) => pc = i + 1,
                        None => return Ok(Flow::Goto(label)),
                    }
                }
            }
        }
        Ok(Flow::Next)
    }

    fn exec(&mut self, stmt: &Stmt, frame: &mut Frame) -> Result<Flow, Stop> {
        match stmt {
            Stmt::Assign(lhs, rhs) => {
                let value = self.eval(rhs, frame, &self.globals)?;
                match lhs {
                    Expr::Ident(name) => self.set(name, value, frame),
                    Expr::MapSelect(_, index) => {
                        let Value::Int(index) = self.eval(index, frame, &self.globals)? else {
                            return error("non-int stack index");
                        };
                        let Value::Real(value) = value else {
                            return error("non-real stack value");
                        };
                        self.globals.stack.insert(index, value);
                    }
                    other => return error(format!("cannot assign to {other}")),
                }
            }
            Stmt::Call { callee, args, outs } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a, frame, &self.globals))
                    .collect::<Result<Vec<_>, _>>()?;
                let results = self.call(callee, args)?;
                for (name, value) in outs.iter().zip(results) {
                    self.set(name, value, frame);
                }
            }
            Stmt::Havoc(names) => {
                for name in names {
                    self.set(name, Value::Real(self.havoc), frame);
                }
            }
            Stmt::Assume(cond) => {
                if !self.truth(cond, frame)? {
                    return Err(Stop::Blocked);
                }
            }
            Stmt::Assert(cond) => {
                if !self.truth(cond, frame)? {
                    return Err(Stop::AssertFailed(cond.to_string()));
                }
            }
            Stmt::Goto(labels) => match labels.first() {
                Some(label) => return Ok(Flow::Goto(label.clone())),
                None => return error("goto without target"),
            },
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.truth(cond, frame)? {
                    return self.exec_block(then_branch, frame);
                }
                if let Some(else_branch) = else_branch {
                    return self.exec_block(else_branch, frame);
                }
            }
            Stmt::Label(_) | Stmt::Comment(_) => {}
        }
        Ok(Flow::Next)
    }

    fn set(&mut self, name: &str, value: Value, frame: &mut Frame) {
        if let Some(slot) = frame.locals.get_mut(name) {
            *slot = value;
        } else {
            self.globals.scalars.insert(name.to_string(), value);
        }
    }

    fn truth(&self, cond: &Expr, frame: &Frame) -> Result<bool, Stop> {
        match self.eval(cond, frame, &self.globals)? {
            Value::Bool(b) => Ok(b),
            other => error(format!("{cond} is not boolean: {other:?}")),
        }
    }

    fn eval(&self, expr: &Expr, frame: &Frame, globals: &Globals) -> Result<Value, Stop> {
        Ok(match expr {
            Expr::Ident(name) => match frame.locals.get(name).or(globals.scalars.get(name)) {
                Some(value) => *value,
                None => return error(format!("unbound {name}")),
            },
            Expr::Int(i) => Value::Int(*i),
            Expr::Real(r) => Value::Real(*r),
            Expr::Decimal(text) => match text.parse() {
                Ok(r) => Value::Real(r),
                Err(_) => return error(format!("bad decimal {text}")),
            },
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Neg(inner) => match self.eval(inner, frame, globals)? {
                Value::Int(i) => Value::Int(-i),
                Value::Real(r) => Value::Real(-r),
                Value::Bool(_) => return error("negated boolean"),
            },
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs, frame, globals)?;
                let rhs = self.eval(rhs, frame, globals)?;
                binary(*op, lhs, rhs)?
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a, frame, globals))
                    .collect::<Result<Vec<_>, _>>()?;
                if name == "int" {
                    return match args.as_slice() {
                        [Value::Real(r)] => Ok(Value::Int(r.floor() as i64)),
                        _ => error("int() takes one real"),
                    };
                }
                let Some((params, body)) = self.program.function_body(name) else {
                    return error(format!("no function {name}"));
                };
                let locals = params
                    .iter()
                    .map(|p| p.name.clone())
                    .zip(args)
                    .collect();
                let inner = Frame {
                    locals,
                    old: Rc::clone(&frame.old),
                };
                self.eval(body, &inner, globals)?
            }
            Expr::MapSelect(_, index) => match self.eval(index, frame, globals)? {
                Value::Int(i) => Value::Real(globals.stack.get(&i).copied().unwrap_or(0.0)),
                _ => return error("non-int stack index"),
            },
            Expr::Ite(cond, then, otherwise) => match self.eval(cond, frame, globals)? {
                Value::Bool(true) => self.eval(then, frame, globals)?,
                Value::Bool(false) => self.eval(otherwise, frame, globals)?,
                _ => return error("non-boolean ite condition"),
            },
            Expr::Old(inner) => self.eval(inner, frame, &frame.old)?,
        })
    }
}

fn binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, Stop> {
    use Value::*;
    Ok(match (op, lhs, rhs) {
        (BinOp::And, Bool(a), Bool(b)) => Bool(a && b),
        (BinOp::Or, Bool(a), Bool(b)) => Bool(a || b),
        (BinOp::Eq, a, b) => Bool(a == b),
        (BinOp::Neq, a, b) => Bool(a != b),
        (op, Int(a), Int(b)) => match op {
            BinOp::Add => Int(a + b),
            BinOp::Sub => Int(a - b),
            BinOp::Mul => Int(a * b),
            BinOp::Div => Int(a.div_euclid(b)),
            BinOp::Lt => Bool(a < b),
            BinOp::Le => Bool(a <= b),
            BinOp::Gt => Bool(a > b),
            BinOp::Ge => Bool(a >= b),
            _ => return error(format!("{op:?} on ints")),
        },
        (op, Real(a), Real(b)) => match op {
            BinOp::Add => Real(a + b),
            BinOp::Sub => Real(a - b),
            BinOp::Mul => Real(a * b),
            BinOp::Div => Real(a / b),
            BinOp::Lt => Bool(a < b),
            BinOp::Le => Bool(a <= b),
            BinOp::Gt => Bool(a > b),
            BinOp::Ge => Bool(a >= b),
            _ => return error(format!("{op:?} on reals")),
        },
        (op, a, b) => return error(format!("{op:?} on {a:?} and {b:?}")),
    })
}
