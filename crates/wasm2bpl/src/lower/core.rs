//! Per-function lowering state and the function-level frame.
//!
//! `FunctionLowerer` owns everything that is transient to one function: the
//! open scope stack, the label counter, the lazily created exit label and
//! the slot → variable table. It borrows the module-wide pieces (callee
//! names, the arity helper cache and the diagnostics sink).

use super::prelude::{self, SP, TMP};
use super::scan::{scan, LabelNeeds};
use super::{CalleeTable, Diagnostic, DiagnosticKind, HelperCache};
use crate::ast::{LabelRef, WasmFunction};
use crate::boogie::{BinOp, Expr, Implementation, Procedure, Stmt, Type, Variable};
use crate::TranslateOptions;
use log::{debug, warn};

pub(super) const ENTRY_SP: &str = "entry_sp";
pub(super) const IDX: &str = "idx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ScopeKind {
    Block,
    Loop,
    If,
}

/// One open `block`/`loop`/`if` scope.
#[derive(Debug, Clone)]
pub(super) struct LabelContext {
    /// Symbolic label from the source, without `$`.
    pub(super) wat_label: Option<String>,
    /// Entry order, shared with the pre-scan.
    pub(super) ordinal: usize,
    /// Loop re-entry target; loops only.
    pub(super) start_label: Option<String>,
    /// Exit target.
    pub(super) end_label: String,
    pub(super) kind: ScopeKind,
    /// Set when a branch resolves to this scope.
    pub(super) referenced: bool,
}

impl LabelContext {
    fn is_loop(&self) -> bool {
        self.kind == ScopeKind::Loop
    }

    /// Loops are entered again through their start, everything else is left
    /// through its end.
    fn branch_target(&self) -> &str {
        match &self.start_label {
            Some(start) if self.is_loop() => start,
            _ => &self.end_label,
        }
    }
}

pub(super) struct FunctionLowerer<'m> {
    pub(super) options: &'m TranslateOptions,
    pub(super) callees: &'m CalleeTable,
    helpers: &'m mut HelperCache,
    diagnostics: &'m mut Vec<Diagnostic>,
    /// Procedure name of the function being lowered.
    pub(super) function: String,
    needs: LabelNeeds,
    scopes: Vec<LabelContext>,
    next_label: u32,
    next_ordinal: usize,
    exit_label: Option<String>,
    /// Slot index → IR variable.
    locals: Vec<String>,
}

impl<'m> FunctionLowerer<'m> {
    pub(super) fn new(
        function: String,
        options: &'m TranslateOptions,
        callees: &'m CalleeTable,
        helpers: &'m mut HelperCache,
        diagnostics: &'m mut Vec<Diagnostic>,
    ) -> Self {
        Self {
            options,
            callees,
            helpers,
            diagnostics,
            function,
            needs: LabelNeeds::default(),
            scopes: Vec::new(),
            next_label: 0,
            next_ordinal: 0,
            exit_label: None,
            locals: Vec::new(),
        }
    }

    /// Lower one function into its procedure/implementation pair.
    pub(super) fn lower_function(mut self, func: &WasmFunction) -> (Procedure, Implementation) {
        let params = func.param_count;
        let results = func.result_count;
        self.needs = scan(&func.body);
        self.locals = (1..=params)
            .map(|i| format!("arg{i}"))
            .chain((1..=func.local_count).map(|i| format!("loc{i}")))
            .collect();

        let mut body = Vec::new();
        self.emit_prologue(params, &mut body);
        self.lower_seq(&func.body, &mut body);
        debug_assert!(self.scopes.is_empty(), "scope stack must be balanced");
        if let Some(exit) = self.exit_label.take() {
            body.push(Stmt::Label(exit));
        }
        body.push(self.footer(params, results));

        let mut locals: Vec<Variable> = self
            .locals
            .iter()
            .map(|name| Variable::new(name.clone(), Type::Real))
            .collect();
        locals.push(Variable::new(IDX, Type::Int));
        locals.push(Variable::new(ENTRY_SP, Type::Int));

        let mut proc = Procedure::new(self.function.clone());
        proc.modifies = prelude::function_modifies();
        if self.options.stack_assert {
            proc.ensures.push(prelude::stack_effect(
                Expr::old(Expr::ident(SP)),
                params,
                results,
            ));
        }

        debug!(
            "lowered {}: {} statements, {} labels generated",
            self.function,
            body.len(),
            self.next_label
        );
        let implementation = Implementation {
            name: self.function,
            params: vec![],
            returns: vec![],
            locals,
            body,
        };
        (proc, implementation)
    }

    /// Snapshot the stack pointer, zero scratch state, pop the arguments and
    /// zero the declared locals.
    fn emit_prologue(&mut self, params: u32, out: &mut Vec<Stmt>) {
        out.push(Stmt::assign(ENTRY_SP, Expr::ident(SP)));
        for tmp in TMP {
            out.push(Stmt::assign(tmp, Expr::Real(0.0)));
        }
        if params > 0 {
            out.push(Stmt::Assume(Expr::binary(
                BinOp::Ge,
                Expr::ident(SP),
                Expr::Int(i64::from(params)),
            )));
            let helper = self.ensure_pop_args(params);
            out.push(Stmt::Call {
                callee: helper,
                args: vec![],
                outs: self.locals[..params as usize].to_vec(),
            });
        }
        for local in &self.locals[params as usize..] {
            out.push(Stmt::assign(local.clone(), Expr::Real(0.0)));
        }
    }

    fn footer(&self, params: u32, results: u32) -> Stmt {
        if self.options.stack_assert {
            Stmt::Assert(prelude::stack_effect(
                Expr::ident(ENTRY_SP),
                params,
                results,
            ))
        } else {
            Stmt::comment("footer stack assert disabled")
        }
    }

    /// Name of the arity-`n` argument helper, registering it on first use.
    pub(super) fn ensure_pop_args(&mut self, arity: u32) -> String {
        if self.helpers.ensure(arity) {
            debug!("{}: first use of {}", self.function, prelude::pop_args_name(arity));
        }
        prelude::pop_args_name(arity)
    }

    pub(super) fn local(&self, slot: u32) -> &str {
        &self.locals[slot as usize]
    }

    // ── labels and scopes ──────────────────────────────────────────────

    fn fresh_label(&mut self, base: &str) -> String {
        self.next_label += 1;
        format!("{base}_{}", self.next_label)
    }

    /// Open a scope and return the loop start label to place, if any.
    pub(super) fn enter_scope(&mut self, wat_label: Option<&str>, kind: ScopeKind) -> Option<String> {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        let stem = wat_label.map(prelude::sanitize);
        let base = |suffix: &str, fallback: &str| match &stem {
            Some(stem) => format!("{stem}_{suffix}"),
            None => fallback.to_string(),
        };
        let start_label = match kind {
            ScopeKind::Loop => Some(self.fresh_label(&base("start", "loop_start"))),
            ScopeKind::Block | ScopeKind::If => None,
        };
        let end_base = match kind {
            ScopeKind::Block => base("end", "block_end"),
            ScopeKind::Loop => base("end", "loop_end"),
            ScopeKind::If => base("end", "if_end"),
        };
        let end_label = self.fresh_label(&end_base);

        let place_start = start_label
            .clone()
            .filter(|_| !self.options.prune_unused_labels || self.needs.loop_starts.contains(&ordinal));
        self.scopes.push(LabelContext {
            wat_label: wat_label.map(str::to_string),
            ordinal,
            start_label,
            end_label,
            kind,
            referenced: false,
        });
        place_start
    }

    /// Close the innermost scope, placing its end label when something can
    /// reach it.
    pub(super) fn leave_scope(&mut self, out: &mut Vec<Stmt>) {
        let Some(ctx) = self.scopes.pop() else {
            return;
        };
        let prune = self.options.prune_unused_labels;
        let needed = match ctx.kind {
            ScopeKind::Loop => !prune,
            ScopeKind::Block | ScopeKind::If => {
                !prune || ctx.referenced || self.needs.block_ends.contains(&ctx.ordinal)
            }
        };
        if needed {
            out.push(Stmt::Label(ctx.end_label));
        }
    }

    /// Function exit label, created on first use.
    pub(super) fn exit_label(&mut self) -> String {
        if let Some(exit) = &self.exit_label {
            return exit.clone();
        }
        let exit = self.fresh_label("func_exit");
        self.exit_label = Some(exit.clone());
        exit
    }

    /// Resolve a depth or name to a concrete jump label.
    ///
    /// Depths count outward from the innermost open scope; a depth equal to
    /// the number of open scopes is the function body itself. Anything that
    /// matches no scope falls back to the exit label.
    pub(super) fn resolve_branch(&mut self, target: &LabelRef) -> String {
        let open = self.scopes.len();
        let found = match target {
            LabelRef::Depth(depth) => {
                let depth = *depth as usize;
                if depth > open {
                    self.note(
                        DiagnosticKind::UnresolvedBranch,
                        format!("branch depth {depth} exceeds {open} open scopes, using function exit"),
                    );
                }
                (depth < open).then(|| open - 1 - depth)
            }
            LabelRef::Name(name) => {
                let found = self
                    .scopes
                    .iter()
                    .rposition(|s| s.wat_label.as_deref() == Some(name.as_str()));
                if found.is_none() {
                    self.note(
                        DiagnosticKind::UnresolvedBranch,
                        format!("no enclosing scope labeled ${name}, using function exit"),
                    );
                }
                found
            }
        };

        let label = match found {
            Some(i) => {
                let scope = &mut self.scopes[i];
                scope.referenced = true;
                scope.branch_target().to_string()
            }
            None => self.exit_label(),
        };
        debug!("{}: branch {target} -> {label}", self.function);
        label
    }

    /// Record a non-fatal problem.
    pub(super) fn note(&mut self, kind: DiagnosticKind, message: String) {
        warn!("{}: {message}", self.function);
        self.diagnostics.push(Diagnostic {
            function: self.function.clone(),
            kind,
            message,
        });
    }
}
