//! wasm2bpl — WebAssembly text to verification IR translator.
//!
//! This crate turns a WebAssembly text module into a Boogie-style program
//! in which the operand stack is modeled explicitly (`$stack`/`$sp`), so a
//! verifier can check stack balance and branch structure of every function.

pub mod ast;
pub mod boogie;
pub mod error;
pub mod lower;
pub mod parser;
pub mod source;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
pub use lower::{Diagnostic, DiagnosticKind, Translation};

use ast::{WasmFunction, WasmModule};
use lower::lower_module;
use parser::parse_function;
use source::{load_module, ModuleSource};

/// Configuration options for translation
///
/// Label layout follows WebAssembly depth addressing: an `if` opens its own
/// label scope, so `br 0` inside an arm leaves the `if` and every enclosing
/// depth counts it. With `prune_unused_labels` set (the default), an end
/// label is only placed when some branch targets it; loop ends are never
/// targets. Set it to `false` to place every start and end label.
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Emit the stack-balance footer assertion and the `ensures` clause.
    pub stack_assert: bool,
    /// Only materialize labels that some branch targets.
    pub prune_unused_labels: bool,
    /// Reject functions whose nested scopes reuse a label name.
    pub verify_labels: bool,
    /// Indent the serialized program.
    pub pretty: bool,
    /// Emitted as a header comment when set.
    pub contract_name: Option<String>,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            stack_assert: true,
            prune_unused_labels: true,
            verify_labels: true,
            pretty: true,
            contract_name: None,
        }
    }
}

/// Translate a WebAssembly text module into verification-IR text.
///
/// This is the main entry point for the translation pipeline.
///
/// # Example
/// ```no_run
/// use wasm2bpl::{translate, TranslateOptions};
///
/// let wat = std::fs::read_to_string("input.wat").unwrap();
/// let program = translate(&wat, &TranslateOptions::default()).unwrap();
/// std::fs::write("output.bpl", program).unwrap();
/// ```
pub fn translate(wat_text: &str, options: &TranslateOptions) -> Result<String> {
    let translation = translate_wat(wat_text, options)?;
    Ok(translation.text(options.pretty))
}

/// Like [`translate`], but keeps the program structure and the diagnostics
/// collected for approximated constructs.
pub fn translate_wat(wat_text: &str, options: &TranslateOptions) -> Result<Translation> {
    let source = load_module(wat_text).context("failed to load WebAssembly module")?;
    translate_module(&source, options)
}

/// Translate an already loaded module.
pub fn translate_module(source: &ModuleSource, options: &TranslateOptions) -> Result<Translation> {
    let module = parse_module(source)?;
    let translation = lower_module(&module, options).context("failed to lower module")?;
    Ok(translation)
}

/// Build the AST of every defined function of `source`.
///
/// Signature counts and names from the binary win over what the function
/// text declares.
pub fn parse_module(source: &ModuleSource) -> Result<WasmModule> {
    let functions = source
        .functions
        .iter()
        .map(|f| {
            let parsed = parse_function(&f.text, f.index, Some(&f.signature))
                .with_context(|| format!("failed to parse function {}", f.index))?;
            Ok(WasmFunction {
                name: f.name.clone().or(parsed.name.clone()),
                ..parsed
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(WasmModule {
        imports: source.imports.clone(),
        functions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_small_module() {
        let out = translate(
            "(module (func $answer (result i32) (i32.const 42)))",
            &TranslateOptions::default(),
        )
        .unwrap();
        assert!(out.contains("procedure answer()"));
        assert!(out.contains("call push(42.0);"));
    }

    #[test]
    fn unnamed_function_keeps_its_index() {
        let source = load_module("(module (func (export \"f\") (nop)))").unwrap();
        let module = parse_module(&source).unwrap();
        assert_eq!(module.functions[0].name, None);
        assert_eq!(module.functions[0].index, 0);
    }

    #[test]
    fn contract_name_is_a_header_comment() {
        let options = TranslateOptions {
            contract_name: Some("Token".to_string()),
            ..TranslateOptions::default()
        };
        let out = translate("(module (func))", &options).unwrap();
        assert!(out.contains("// contract: Token"));
    }
}
