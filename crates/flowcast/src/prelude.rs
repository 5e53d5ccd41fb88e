//! Prelude module - common imports for flowcast users
//!
//! ```rust
//! use flowcast::prelude::*;
//! ```

pub use crate::{
    // Export
    can_convert,
    // Calculations
    Calculation,
    CalculationId,
    CalculationStatus,
    CalculationType,

    CsvReader,
    CsvWriter,

    Diagnostic,
    // Error types
    Error,
    ErrorKind,
    FormulaError,
    Granularity,
    // Main types
    Model,
    // Extension traits
    ModelIoExt,
    ModelOptions,
    RecomputeStats,
    Result,

    SheetLayout,
    Timeline,
};
