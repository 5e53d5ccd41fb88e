//! Convertibility probe
//!
//! Decides export strategy for a formula without a layout. Text that still
//! holds a run of three or more letters once function names and reference
//! keys are stripped is descriptive prose, not a formula.

use crate::error::ExcelError;
use crate::transpiler::check_expression;
use flowcast_formula::{is_blank_formula, parse_formula, registry};
use lazy_regex::{regex, regex_is_match};
use regex::Regex;
use std::sync::OnceLock;

/// Matches any registered function name as a whole word
fn function_names() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut names = registry().names();
        names.sort_by_key(|name| std::cmp::Reverse(name.len()));
        let alternation: Vec<String> = names.into_iter().map(regex::escape).collect();
        Regex::new(&format!(r"(?i)\b(?:{})\b", alternation.join("|")))
            .expect("function names are plain identifiers")
    })
}

/// Whether `formula` is free of prose after stripping names and keys
pub fn looks_like_formula(formula: &str) -> bool {
    let without_functions = function_names().replace_all(formula, " ");
    let stripped = regex!(r"\bT\.[A-Za-z]+\b|\b[VSCFILMRG]\d+(?:\.\d+)*(?:\.(?:Start|End))?\b")
        .replace_all(&without_functions, " ");
    !regex_is_match!(r"[A-Za-z]{3,}", &stripped)
}

/// Whether `formula` can be written as a spreadsheet formula at every column
///
/// Layout coverage is not checked; a key with no row still falls back to a
/// static value at conversion time.
///
/// # Example
/// ```rust
/// use flowcast_excel::can_convert;
///
/// assert!(can_convert("R4 + R7"));
/// assert!(!can_convert("Additions less disposals"));
/// assert!(!can_convert("CUMSUM_Y(R4)"));
/// ```
pub fn can_convert(formula: &str) -> bool {
    if is_blank_formula(formula) {
        return true;
    }

    looks_like_formula(formula)
        && parse_formula(formula)
            .map_err(ExcelError::from)
            .and_then(|expr| check_expression(&expr))
            .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptive_text_rejected() {
        assert!(!looks_like_formula("Additions less disposals"));
        assert!(!looks_like_formula("R4 + opening balance"));
        assert!(!can_convert("Additions less disposals"));
    }

    #[test]
    fn test_keys_and_functions_stripped() {
        assert!(looks_like_formula("R4 + R7"));
        assert!(looks_like_formula("CUMSUM(SHIFT(R4, 1)) * T.DiM"));
        assert!(looks_like_formula("F3.Start * L1.2.1 + C1.10"));
        assert!(looks_like_formula("cumprod_y(V1)"));
    }

    #[test]
    fn test_can_convert() {
        assert!(can_convert("R4 + R7"));
        assert!(can_convert(""));
        assert!(can_convert("CUMSUM(R4 * R7) + PREVSUM(V1)"));
        assert!(can_convert("SHIFT(CUMSUM(1), 3)"));
        assert!(can_convert("SHIFT(R4, 1)"));
        assert!(can_convert("SHIFT(R4, -12)"));
        assert!(can_convert("PREVVAL(R4)"));
        assert!(can_convert("R4 - PREVVAL(R4) * T.DiM"));
        assert!(!can_convert("CUMSUM_Y(R4)"));
        assert!(!can_convert("SHIFT(CUMPROD_Y(R4), 1)"));
        assert!(!can_convert("CUMSUM(R4"));
        assert!(!can_convert("R4 + foo"));
        assert!(!can_convert("1e400"));
    }
}
