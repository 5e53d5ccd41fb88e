//! Error types for flowcast-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors raised while building or mutating a model.
///
/// These are never attached to a single calculation: they mean the model
/// itself is inconsistent and the mutating call is rejected.
#[derive(Debug, Error)]
pub enum Error {
    /// A bound array does not match the timeline length
    #[error("Array for {key} has length {actual}, timeline has {expected} periods")]
    LengthMismatch {
        key: String,
        expected: usize,
        actual: usize,
    },

    /// Malformed reference key
    #[error("Invalid reference key: {0}")]
    InvalidReference(String),

    /// Column number outside the addressable range
    #[error("Column {0} out of bounds (max: {1})")]
    ColumnOutOfBounds(u32, u32),

    /// Invalid column letters
    #[error("Invalid column letters: {0}")]
    InvalidColumn(String),

    /// Invalid timeline definition
    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),

    /// A calculation with this id already exists
    #[error("Calculation R{0} already exists")]
    DuplicateCalculation(u32),

    /// No calculation with this id
    #[error("Calculation R{0} not found")]
    CalculationNotFound(u32),

    /// Results were requested while a recompute is pending
    #[error("Results are stale: {0} calculation(s) awaiting recompute")]
    Stale(usize),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}
