//! Splits WebAssembly text into atomic tokens.
//!
//! `(` and `)` are standalone tokens, whitespace separates atoms, `;;` line
//! comments and `(; ;)` block comments are dropped, and a quoted string is
//! kept whole (quotes included).

/// Tokenize `text`. Never fails; empty input yields no tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '(' if chars.peek() == Some(&';') => {
                flush(&mut current, &mut tokens);
                chars.next();
                skip_block_comment(&mut chars);
            }
            ';' if chars.peek() == Some(&';') => {
                flush(&mut current, &mut tokens);
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' | ')' => {
                flush(&mut current, &mut tokens);
                tokens.push(c.to_string());
            }
            '"' => {
                flush(&mut current, &mut tokens);
                let mut literal = String::from('"');
                while let Some(c) = chars.next() {
                    literal.push(c);
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                literal.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
                tokens.push(literal);
            }
            c if c.is_whitespace() => flush(&mut current, &mut tokens),
            c => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

/// Consume a block comment body after its opening `(;`; comments nest.
fn skip_block_comment(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    let mut depth = 1usize;
    while let Some(c) = chars.next() {
        match c {
            '(' if chars.peek() == Some(&';') => {
                chars.next();
                depth += 1;
            }
            ';' if chars.peek() == Some(&')') => {
                chars.next();
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parens_are_tokens() {
        assert_eq!(
            tokenize("(i32.add (local.get 0)(i32.const 1))"),
            vec!["(", "i32.add", "(", "local.get", "0", ")", "(", "i32.const", "1", ")", ")"]
        );
    }

    #[test]
    fn empty_and_blank_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \n\t ").is_empty());
    }

    #[test]
    fn comments_are_dropped() {
        let text = "(nop) ;; trailing (i32.const 9)\n(; block (; nested ;) ;) (drop)";
        assert_eq!(tokenize(text), vec!["(", "nop", ")", "(", "drop", ")"]);
    }

    #[test]
    fn quoted_strings_stay_whole() {
        assert_eq!(
            tokenize(r#"(import "env" "say \"hi\" (x)")"#),
            vec!["(", "import", "\"env\"", r#""say \"hi\" (x)""#, ")"]
        );
    }
}
