//! Reference extraction
//!
//! Works on the token stream rather than the AST, so the references of a
//! formula that does not parse can still be listed.

use crate::parser::{Lexer, Token};
use flowcast_core::{CalculationId, ReferenceKey, ReferenceKind};
use std::collections::BTreeSet;

/// Distinct reference keys used by `formula`, in key order
///
/// # Example
/// ```rust
/// use flowcast_formula::scan_references;
///
/// let keys: Vec<String> = scan_references("R10 + R1 * CUMSUM(R10")
///     .iter()
///     .map(|k| k.to_string())
///     .collect();
/// assert_eq!(keys, vec!["R1", "R10"]);
/// ```
pub fn scan_references(formula: &str) -> Vec<ReferenceKey> {
    let keys: BTreeSet<ReferenceKey> = Lexer::new(formula)
        .filter_map(|token| match token {
            Token::Reference(key) => Some(key),
            _ => None,
        })
        .collect();
    keys.into_iter().collect()
}

/// Distinct reference keys of one family used by `formula`
pub fn references_of(formula: &str, kind: ReferenceKind) -> Vec<ReferenceKey> {
    scan_references(formula)
        .into_iter()
        .filter(|key| key.kind() == kind)
        .collect()
}

/// Calculations `formula` reads through `R` references
pub fn calculation_dependencies(formula: &str) -> Vec<CalculationId> {
    scan_references(formula)
        .iter()
        .filter_map(ReferenceKey::calculation_id)
        .map(CalculationId)
        .collect()
}
