//! Formula error types

use std::fmt;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Broad class of a formula error, as shown next to a calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed formula: unbalanced parentheses, unknown function or token
    Syntax,
    /// Formula names a key absent from the reference map
    Reference,
    /// Calculation participates in a reference cycle
    Dependency,
    /// Structurally degenerate input the evaluator cannot repair
    Runtime,
    /// No safe spreadsheet-native equivalent
    Conversion,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Syntax => "Syntax",
            ErrorKind::Reference => "Reference",
            ErrorKind::Dependency => "Dependency",
            ErrorKind::Runtime => "Runtime",
            ErrorKind::Conversion => "Conversion",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during formula parsing, evaluation or conversion
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Reference not bound in the reference map or results
    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    /// Circular reference between calculations
    #[error("Circular reference: {0}")]
    CircularReference(String),

    /// Degenerate input, e.g. a result array of the wrong length
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Formula has no spreadsheet-native equivalent
    #[error("Cannot convert: {0}")]
    Conversion(String),
}

impl FormulaError {
    /// The error class shown to users
    pub fn kind(&self) -> ErrorKind {
        match self {
            FormulaError::Syntax(_)
            | FormulaError::UnknownFunction(_)
            | FormulaError::ArgumentCount { .. } => ErrorKind::Syntax,
            FormulaError::UnknownReference(_) => ErrorKind::Reference,
            FormulaError::CircularReference(_) => ErrorKind::Dependency,
            FormulaError::Runtime(_) => ErrorKind::Runtime,
            FormulaError::Conversion(_) => ErrorKind::Conversion,
        }
    }
}
