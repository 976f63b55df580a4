//! Error taxonomy for the translation pipeline.
//!
//! Parse errors and label verification failures are fatal for the function
//! being translated. Unsupported operators are not errors at all: they become
//! [`Diagnostic`](crate::lower::Diagnostic) values next to the emitted program.

use thiserror::Error;

/// Number of tokens shown on each side of the failing position.
const WINDOW_RADIUS: usize = 5;

/// Render the tokens surrounding `index` for error messages.
pub fn token_window(tokens: &[String], index: usize) -> String {
    let start = index.saturating_sub(WINDOW_RADIUS);
    let end = (index + WINDOW_RADIUS + 1).min(tokens.len());
    if start >= end {
        return String::from("<end of input>");
    }
    tokens[start..end].join(" ")
}

/// Fatal error raised while building the AST of one function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected end of input at token {index} (near `{window}`)")]
    UnexpectedEof { index: usize, window: String },

    #[error("unexpected closing parenthesis at token {index} (near `{window}`)")]
    UnexpectedClose { index: usize, window: String },

    #[error("expected {expected} at token {index}, found `{found}` (near `{window}`)")]
    Expected {
        expected: &'static str,
        found: String,
        index: usize,
        window: String,
    },

    #[error("unknown local index/name `{name}` at token {index} (near `{window}`)")]
    UnresolvedLocal {
        name: String,
        index: usize,
        window: String,
    },

    #[error("local slot {slot} out of range, function has {slots} slots (near `{window}`)")]
    LocalOutOfRange {
        slot: u64,
        slots: usize,
        window: String,
    },

    #[error("br_table without a selector expression at token {index} (near `{window}`)")]
    BrTableWithoutSelector { index: usize, window: String },

    #[error("br_table without targets at token {index} (near `{window}`)")]
    BrTableWithoutTargets { index: usize, window: String },

    #[error("duplicate label `${label}` in nested scope at depth {depth}")]
    DuplicateLabel { label: String, depth: usize },
}

/// Fatal error raised while turning a module into a verification program.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("failed to parse function `{function}`")]
    Parse {
        function: String,
        #[source]
        source: ParseError,
    },

    #[error("functions {first} and {second} both map to procedure name `{name}`")]
    DuplicateFunctionName { name: String, first: u32, second: u32 },

    #[error("module text has {text} function bodies but the binary defines {binary}")]
    FunctionCountMismatch { text: usize, binary: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn window_is_clamped_at_both_ends() {
        let tokens = toks("( a b c d e f g h i j k l )");
        assert_eq!(token_window(&tokens, 0), "( a b c d e");
        assert_eq!(token_window(&tokens, 13), "h i j k l )");
        assert_eq!(token_window(&tokens, 6), "a b c d e f g h i j k");
    }

    #[test]
    fn window_past_the_end() {
        let tokens = toks("( a )");
        assert_eq!(token_window(&tokens, 40), "<end of input>");
        assert_eq!(token_window(&[], 0), "<end of input>");
    }

    #[test]
    fn parse_error_messages_carry_context() {
        let err = ParseError::Expected {
            expected: "`)`",
            found: "(".to_string(),
            index: 4,
            window: "( i32.const 1 (".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("expected `)` at token 4"));
        assert!(msg.contains("near `( i32.const 1 (`"));
    }
}
