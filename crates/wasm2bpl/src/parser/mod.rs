//! WebAssembly text → AST.
//!
//! Entry points work on the text of one function (`(func ...)`) or on a
//! bare instruction sequence; splitting a module into functions is the job
//! of [`crate::source`].

mod builder;
mod tokenizer;
mod verify;

pub use builder::{LocalTable, Parser};
pub use tokenizer::tokenize;
pub use verify::verify_labels;

use crate::ast::{FunctionSignature, WasmFunction, WasmNode};
use crate::error::{token_window, ParseError};

/// Parse the text of one `(func ...)` form.
///
/// When the host module supplies a `signature`, its counts are authoritative;
/// declarations in the text only contribute aliases.
pub fn parse_function(
    text: &str,
    index: u32,
    signature: Option<&FunctionSignature>,
) -> Result<WasmFunction, ParseError> {
    let tokens = tokenize(text);
    let mut parser = Parser::new(&tokens, LocalTable::default());
    parser.parse_function_form(index, signature)
}

/// Parse a bare instruction sequence over `slots` anonymous local slots.
pub fn parse_body(text: &str, slots: u32) -> Result<Vec<WasmNode>, ParseError> {
    let tokens = tokenize(text);
    let mut parser = Parser::new(&tokens, LocalTable::with_slots(slots));
    let body = parser.parse_function_body()?;
    if !parser.is_at_end() {
        let index = parser.position();
        return Err(ParseError::UnexpectedClose {
            index,
            window: token_window(&tokens, index),
        });
    }
    Ok(body)
}
