//! Module source extraction.
//!
//! Produces what the translator needs from a whole WebAssembly text module:
//! the text of every defined function plus its signature counts and name,
//! and the imported functions. The text is compiled with `wat` and the
//! binary is validated and walked with `wasmparser`; the function texts
//! themselves are cut out of the token stream.

use crate::ast::{FunctionSignature, ImportedFunction};
use crate::error::TranslateError;
use crate::parser::tokenize;
use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::HashMap;
use wasmparser::{CompositeInnerType, KnownCustom, Name, Parser, Payload, TypeRef, Validator};

/// One defined function, ready for the AST builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSource {
    /// Position in the function index space (imports first).
    pub index: u32,
    /// Name from the `name` section, without `$`.
    pub name: Option<String>,
    /// Text of the `(func ...)` form.
    pub text: String,
    pub signature: FunctionSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSource {
    pub imports: Vec<ImportedFunction>,
    pub functions: Vec<FunctionSource>,
}

/// Facts read from the binary form of the module.
#[derive(Debug, Default)]
struct BinaryInfo {
    /// (params, results) per type index.
    types: Vec<(u32, u32)>,
    imports: Vec<ImportedFunction>,
    /// Type index per defined function.
    func_types: Vec<u32>,
    /// Declared local count per defined function.
    locals: Vec<u32>,
    names: HashMap<u32, String>,
}

/// Compile, validate and split a WebAssembly text module.
pub fn load_module(wat_text: &str) -> Result<ModuleSource> {
    let bytes = wat::parse_str(wat_text).context("failed to compile WebAssembly text")?;
    Validator::new()
        .validate_all(&bytes)
        .context("WebAssembly module failed validation")?;
    let info = inspect_binary(&bytes)?;

    let texts = split_functions(wat_text);
    if texts.len() != info.func_types.len() {
        return Err(TranslateError::FunctionCountMismatch {
            text: texts.len(),
            binary: info.func_types.len(),
        }
        .into());
    }

    let first_index = info.imports.len() as u32;
    let mut functions = Vec::with_capacity(texts.len());
    for (i, text) in texts.into_iter().enumerate() {
        let index = first_index + i as u32;
        let type_idx = info.func_types[i] as usize;
        let &(params, results) = info
            .types
            .get(type_idx)
            .with_context(|| format!("function {index} refers to unknown type {type_idx}"))?;
        functions.push(FunctionSource {
            index,
            name: info.names.get(&index).cloned(),
            text,
            signature: FunctionSignature {
                params,
                results,
                locals: info.locals.get(i).copied().unwrap_or(0),
            },
        });
    }

    let mut imports = info.imports;
    for import in &mut imports {
        import.name = info.names.get(&import.index).cloned();
    }
    info!(
        "loaded module: {} functions, {} imported functions",
        functions.len(),
        imports.len()
    );
    Ok(ModuleSource { imports, functions })
}

fn inspect_binary(bytes: &[u8]) -> Result<BinaryInfo> {
    let mut info = BinaryInfo::default();

    for payload in Parser::new(0).parse_all(bytes) {
        let payload = payload.context("parsing wasm payload")?;
        match payload {
            Payload::TypeSection(reader) => {
                for rec_group in reader {
                    let rec_group = rec_group.context("reading rec group")?;
                    for sub_type in rec_group.types() {
                        // non-function types still take a type index
                        let counts = match &sub_type.composite_type.inner {
                            CompositeInnerType::Func(func_ty) => (
                                func_ty.params().len() as u32,
                                func_ty.results().len() as u32,
                            ),
                            _ => (0, 0),
                        };
                        info.types.push(counts);
                    }
                }
            }
            Payload::ImportSection(reader) => {
                let mut index = 0u32;
                for import in reader {
                    let import = import.context("reading import")?;
                    let TypeRef::Func(type_idx) = import.ty else {
                        continue;
                    };
                    let (params, results) =
                        info.types.get(type_idx as usize).copied().unwrap_or((0, 0));
                    info.imports.push(ImportedFunction {
                        index,
                        module: import.module.to_string(),
                        field: import.name.to_string(),
                        name: None,
                        param_count: params,
                        result_count: results,
                    });
                    index += 1;
                }
            }
            Payload::FunctionSection(reader) => {
                for type_idx in reader {
                    info.func_types
                        .push(type_idx.context("reading function type index")?);
                }
            }
            Payload::CodeSectionEntry(body) => {
                let mut count = 0u32;
                let locals = body.get_locals_reader().context("getting locals reader")?;
                for local in locals {
                    let (n, _ty) = local.context("reading local")?;
                    count += n;
                }
                info.locals.push(count);
            }
            Payload::CustomSection(reader) => {
                if let KnownCustom::Name(names) = reader.as_known() {
                    for name in names {
                        if let Name::Function(map) = name.context("reading name section")? {
                            for naming in map {
                                let naming = naming.context("reading function name")?;
                                info.names.insert(naming.index, naming.name.to_string());
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    debug!(
        "binary: {} types, {} imported functions, {} defined functions, {} names",
        info.types.len(),
        info.imports.len(),
        info.func_types.len(),
        info.names.len()
    );
    Ok(info)
}

/// Cut the text of every defined `(func ...)` form out of a module, in
/// order. Inline-import functions have no body and are skipped.
pub fn split_functions(wat_text: &str) -> Vec<String> {
    let tokens = tokenize(wat_text);
    // functions live at depth 1 inside `(module ...)`, or at depth 0 when
    // the module wrapper is omitted
    let top = usize::from(tokens.get(1).map(String::as_str) == Some("module"));

    let mut functions = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "(" => {
                if depth == top && tokens.get(i + 1).map(String::as_str) == Some("func") {
                    let end = matching_close(&tokens, i);
                    let form = &tokens[i..end];
                    if !is_inline_import(form) {
                        functions.push(form.join(" "));
                    }
                    i = end;
                    continue;
                }
                depth += 1;
            }
            ")" => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    functions
}

/// Index just past the `)` matching the `(` at `start`.
fn matching_close(tokens: &[String], start: usize) -> usize {
    let mut depth = 0usize;
    for (offset, tok) in tokens[start..].iter().enumerate() {
        match tok.as_str() {
            "(" => depth += 1,
            ")" => {
                depth -= 1;
                if depth == 0 {
                    return start + offset + 1;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

/// `(func $f (import "m" "n") ...)`: an `import` child among the leading
/// declarations.
fn is_inline_import(form: &[String]) -> bool {
    let mut i = 2;
    if form.get(i).is_some_and(|t| t.starts_with('$')) {
        i += 1;
    }
    while form.get(i).map(String::as_str) == Some("(") {
        match form.get(i + 1).map(String::as_str) {
            Some("import") => return true,
            Some("export") => i = matching_close(form, i),
            _ => return false,
        }
    }
    false
}
