//! Cosmetic re-indentation of serialized IR text.

const INDENT: &str = "    ";

/// Re-indent by brace nesting: labels stay flush left, procedure contract
/// clauses get one level, and runs of blank lines collapse to one.
pub fn indent_boogie(code: &str) -> String {
    let mut out = String::with_capacity(code.len() + code.len() / 4);
    let mut level = 0usize;
    let mut prev_blank = false;

    for raw in code.lines() {
        let line = raw.trim();
        if line.is_empty() {
            if !prev_blank {
                out.push('\n');
            }
            prev_blank = true;
            continue;
        }
        prev_blank = false;

        if line.starts_with('}') {
            level = level.saturating_sub(1);
        }
        if is_label(line) {
            out.push_str(line);
        } else {
            let extra = usize::from(level == 0 && is_contract_clause(line));
            for _ in 0..level + extra {
                out.push_str(INDENT);
            }
            out.push_str(line);
        }
        out.push('\n');
        if line.ends_with('{') {
            level += 1;
        }
    }
    out
}

/// `name:` on a line of its own.
fn is_label(line: &str) -> bool {
    let Some(name) = line.strip_suffix(':') else {
        return false;
    };
    let name = name.trim_end();
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || matches!(c, '_' | '.' | '$'))
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$'))
}

fn is_contract_clause(line: &str) -> bool {
    ["modifies ", "ensures "]
        .iter()
        .any(|kw| line.starts_with(kw))
}
