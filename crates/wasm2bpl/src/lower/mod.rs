//! # Lowering
//!
//! Translates a [`WasmModule`] into a verification-IR [`Program`].
//!
//! ## Pipeline overview
//!
//! ```text
//! WasmModule
//!      │
//!      ├─[callee table]── every function/import name ─► procedure name
//!      │
//!      └─ for each function:
//!           verify_labels()            (optional, fatal on duplicates)
//!           FunctionLowerer::lower_function()
//!             ├── scan()               ─► LabelNeeds
//!             ├── prologue             entry_sp, tmps, popArgsN, locals
//!             ├── lower_node()         per-node rules, scope stack
//!             └── exit label + footer  stack-balance assertion
//!           ─► (Procedure, Implementation)
//!
//! ◄─[assembly]── header, prelude, popArgsN helpers, import stubs, functions
//!      ─► Program + Vec<Diagnostic>
//! ```
//!
//! | Module        | Responsibility                                          |
//! |---------------|---------------------------------------------------------|
//! | [`scan`]      | which loop starts / block ends are branch targets        |
//! | `core`        | `FunctionLowerer` state, scopes, branch resolution       |
//! | `translate`   | node → statement rules                                   |
//! | [`prelude`]   | fixed globals, conversions, stack primitives, helpers    |
//!
//! Calling convention: callers push arguments left to right and never pop
//! them; each callee's prologue pops exactly its parameter count through a
//! shared `popArgsN` helper generated once per arity.

mod core;
pub mod prelude;
pub mod scan;
mod translate;

use crate::ast::WasmModule;
use crate::boogie::{Decl, Program};
use crate::error::TranslateError;
use crate::parser::verify_labels;
use crate::TranslateOptions;
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use self::core::FunctionLowerer;

/// Category of a non-fatal translation problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    UnsupportedConst,
    UnsupportedUnaryOp,
    UnsupportedBinaryOp,
    UnhandledInstruction,
    UnresolvedBranch,
}

/// A non-fatal problem, also visible as a comment or fallback in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Procedure name of the function it occurred in.
    pub function: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.function, self.message)
    }
}

/// Arities whose `popArgsN` helper has been requested.
#[derive(Debug, Default)]
pub struct HelperCache {
    arities: BTreeSet<u32>,
}

impl HelperCache {
    /// Register `arity`; true only the first time.
    pub fn ensure(&mut self, arity: u32) -> bool {
        self.arities.insert(arity)
    }

    pub fn arities(&self) -> impl Iterator<Item = u32> + '_ {
        self.arities.iter().copied()
    }
}

/// Maps call targets (`$name` or function index) to procedure names.
#[derive(Debug, Default)]
pub struct CalleeTable {
    by_index: HashMap<u32, String>,
    by_name: HashMap<String, String>,
}

impl CalleeTable {
    /// Build the table, failing when two functions map to one procedure.
    pub fn build(module: &WasmModule) -> Result<Self, TranslateError> {
        let mut table = CalleeTable::default();
        let mut owners: HashMap<String, u32> = HashMap::new();

        let entries = module
            .imports
            .iter()
            .map(|i| (i.index, i.name.as_deref(), import_procedure_name(i)))
            .chain(
                module
                    .functions
                    .iter()
                    .map(|f| (f.index, f.name.as_deref(), procedure_name(f.name.as_deref(), f.index))),
            );
        for (index, wat_name, proc_name) in entries {
            if let Some(&first) = owners.get(&proc_name) {
                return Err(TranslateError::DuplicateFunctionName {
                    name: proc_name,
                    first,
                    second: index,
                });
            }
            owners.insert(proc_name.clone(), index);
            if let Some(wat_name) = wat_name {
                table.by_name.insert(wat_name.to_string(), proc_name.clone());
            }
            table.by_index.insert(index, proc_name);
        }
        Ok(table)
    }

    /// Unknown numeric targets become `func_<N>`, unknown names are
    /// sanitized with their sigil stripped.
    pub fn resolve(&self, target: &str) -> String {
        if !target.is_empty() && target.bytes().all(|b| b.is_ascii_digit()) {
            return match target.parse::<u32>().ok().and_then(|i| self.by_index.get(&i)) {
                Some(name) => name.clone(),
                None => format!("func_{target}"),
            };
        }
        let name = target.strip_prefix('$').unwrap_or(target);
        self.by_name
            .get(name)
            .cloned()
            .unwrap_or_else(|| prelude::sanitize(name))
    }
}

/// Procedure name of a defined function.
pub fn procedure_name(name: Option<&str>, index: u32) -> String {
    match name {
        Some(name) => prelude::sanitize(name),
        None => format!("func_{index}"),
    }
}

fn import_procedure_name(import: &crate::ast::ImportedFunction) -> String {
    match import.name.as_deref() {
        Some(name) => prelude::sanitize(name),
        None => prelude::sanitize(&import.field),
    }
}

/// Result of lowering a module: the program and everything that was
/// approximated on the way.
#[derive(Debug, Clone)]
pub struct Translation {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

impl Translation {
    /// Serialized program text.
    pub fn text(&self, pretty: bool) -> String {
        self.program.render(pretty)
    }
}

/// Lower every function of `module`, in order, and assemble the program.
pub fn lower_module(
    module: &WasmModule,
    options: &TranslateOptions,
) -> Result<Translation, TranslateError> {
    let callees = CalleeTable::build(module)?;
    let mut helpers = HelperCache::default();
    let mut diagnostics = Vec::new();
    let mut functions = Vec::with_capacity(module.functions.len() * 2);

    for func in &module.functions {
        let name = procedure_name(func.name.as_deref(), func.index);
        if options.verify_labels {
            verify_labels(&func.body).map_err(|source| TranslateError::Parse {
                function: name.clone(),
                source,
            })?;
        }
        debug!("lowering {} as procedure {name}", func.display_name());
        let lowerer =
            FunctionLowerer::new(name, options, &callees, &mut helpers, &mut diagnostics);
        let (proc, implementation) = lowerer.lower_function(func);
        functions.push(Decl::Procedure(proc));
        functions.push(Decl::Implementation(implementation));
    }

    let mut program = Program::default();
    program.push(Decl::Comment("generated by wasm2bpl".to_string()));
    if let Some(contract) = &options.contract_name {
        program.push(Decl::Comment(format!("contract: {contract}")));
    }
    for decl in prelude::prelude() {
        program.push(decl);
    }
    for arity in helpers.arities() {
        for decl in prelude::pop_args_helper(arity) {
            program.push(decl);
        }
    }
    for import in &module.imports {
        program.push(prelude::import_procedure(
            &import_procedure_name(import),
            import.param_count,
            import.result_count,
        ));
    }
    program.decls.extend(functions);

    info!(
        "assembled program: {} functions, {} imports, {} popArgs helpers, {} diagnostics",
        module.functions.len(),
        module.imports.len(),
        helpers.arities().count(),
        diagnostics.len()
    );
    Ok(Translation {
        program,
        diagnostics,
    })
}
