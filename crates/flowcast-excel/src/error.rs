//! Error types for spreadsheet conversion

use flowcast_formula::{ErrorKind, FormulaError};
use thiserror::Error;

/// Result type for conversion and export
pub type ExcelResult<T> = std::result::Result<T, ExcelError>;

/// Why a formula could not be written as a spreadsheet formula
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExcelError {
    /// The formula does not parse
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// The formula reads like prose rather than a formula
    #[error("Descriptive text, not a formula: {0}")]
    DescriptiveText(String),

    /// Valid formula with no spreadsheet-native equivalent
    #[error("Cannot convert {function}: {reason}")]
    Unconvertible { function: String, reason: String },

    /// A referenced key has no row in the sheet layout
    #[error("No layout row for {0}")]
    MissingLayout(String),

    /// The calculation failed to evaluate, so only its values are exported
    #[error("Calculation {0} has an evaluation error")]
    BrokenCalculation(String),

    /// A calculation's values do not cover the exported periods
    #[error("{key} has {actual} values, export needs {expected}")]
    LengthMismatch {
        key: String,
        expected: usize,
        actual: usize,
    },
}

impl ExcelError {
    pub(crate) fn unconvertible(function: &str, reason: impl Into<String>) -> Self {
        ExcelError::Unconvertible {
            function: function.to_string(),
            reason: reason.into(),
        }
    }

    /// The error class shown next to a degraded cell
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExcelError::Formula(e) => e.kind(),
            _ => ErrorKind::Conversion,
        }
    }
}
