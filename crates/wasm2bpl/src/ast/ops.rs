//! Operator classification shared by the parser and the lowering pass.
//!
//! Operators are recognized by their suffix after the type prefix, so
//! `i32.lt_s`, `i64.lt_u` and `f64.lt` all classify as [`BinaryKind::Lt`].

use super::NumType;

/// How a one-operand instruction is modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryKind {
    Drop,
    Eqz,
    Neg,
    Abs,
    /// Width and representation changes, identity on the value domain.
    Conversion,
    Unsupported,
}

/// How a two-operand instruction is modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Min,
    Max,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    Unary(UnaryKind),
    Binary(BinaryKind),
}

/// Classify an instruction name, or `None` if it is not an operator.
pub fn classify(op: &str) -> Option<OpClass> {
    if op == "drop" {
        return Some(OpClass::Unary(UnaryKind::Drop));
    }
    let (prefix, suffix) = op.split_once('.')?;
    NumType::from_prefix(prefix)?;

    let unary = match suffix {
        "eqz" => Some(UnaryKind::Eqz),
        "neg" => Some(UnaryKind::Neg),
        "abs" => Some(UnaryKind::Abs),
        "clz" | "ctz" | "popcnt" | "sqrt" | "ceil" | "floor" | "nearest" | "trunc" => {
            Some(UnaryKind::Unsupported)
        }
        s if is_conversion(s) => Some(UnaryKind::Conversion),
        _ => None,
    };
    if let Some(kind) = unary {
        return Some(OpClass::Unary(kind));
    }

    let binary = match suffix {
        "add" => BinaryKind::Add,
        "sub" => BinaryKind::Sub,
        "mul" => BinaryKind::Mul,
        "div" | "div_s" | "div_u" => BinaryKind::Div,
        "eq" => BinaryKind::Eq,
        "ne" => BinaryKind::Ne,
        "lt" | "lt_s" | "lt_u" => BinaryKind::Lt,
        "le" | "le_s" | "le_u" => BinaryKind::Le,
        "gt" | "gt_s" | "gt_u" => BinaryKind::Gt,
        "ge" | "ge_s" | "ge_u" => BinaryKind::Ge,
        "min" => BinaryKind::Min,
        "max" => BinaryKind::Max,
        "rem_s" | "rem_u" | "and" | "or" | "xor" | "shl" | "shr_s" | "shr_u" | "rotl"
        | "rotr" | "copysign" => BinaryKind::Unsupported,
        _ => return None,
    };
    Some(OpClass::Binary(binary))
}

fn is_conversion(suffix: &str) -> bool {
    const FAMILIES: [&str; 7] = [
        "wrap_",
        "extend",
        "trunc_",
        "convert_",
        "demote_",
        "promote_",
        "reinterpret_",
    ];
    FAMILIES.iter().any(|family| suffix.starts_with(family))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_and_comparisons() {
        assert_eq!(classify("i32.add"), Some(OpClass::Binary(BinaryKind::Add)));
        assert_eq!(classify("f64.div"), Some(OpClass::Binary(BinaryKind::Div)));
        assert_eq!(classify("i64.div_u"), Some(OpClass::Binary(BinaryKind::Div)));
        assert_eq!(classify("i32.lt_s"), Some(OpClass::Binary(BinaryKind::Lt)));
        assert_eq!(classify("f32.ge"), Some(OpClass::Binary(BinaryKind::Ge)));
        assert_eq!(classify("f32.min"), Some(OpClass::Binary(BinaryKind::Min)));
    }

    #[test]
    fn unary_families() {
        assert_eq!(classify("drop"), Some(OpClass::Unary(UnaryKind::Drop)));
        assert_eq!(classify("i64.eqz"), Some(OpClass::Unary(UnaryKind::Eqz)));
        assert_eq!(
            classify("i32.wrap_i64"),
            Some(OpClass::Unary(UnaryKind::Conversion))
        );
        assert_eq!(
            classify("i64.extend_i32_u"),
            Some(OpClass::Unary(UnaryKind::Conversion))
        );
        assert_eq!(
            classify("i32.trunc_sat_f64_s"),
            Some(OpClass::Unary(UnaryKind::Conversion))
        );
        // rounding trunc is not the conversion family
        assert_eq!(
            classify("f64.trunc"),
            Some(OpClass::Unary(UnaryKind::Unsupported))
        );
    }

    #[test]
    fn unsupported_and_unknown() {
        assert_eq!(
            classify("i32.rem_s"),
            Some(OpClass::Binary(BinaryKind::Unsupported))
        );
        assert_eq!(classify("i32.const"), None);
        assert_eq!(classify("i32.load"), None);
        assert_eq!(classify("v128.add"), None);
        assert_eq!(classify("local.get"), None);
        assert_eq!(classify("call"), None);
    }
}
