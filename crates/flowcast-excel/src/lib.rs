//! # flowcast-excel
//!
//! Spreadsheet export for flowcast models.
//!
//! The transpiler rewrites a model formula into a spreadsheet-native formula
//! for one period column of a [`SheetLayout`](flowcast_core::SheetLayout).
//! Formulas it cannot express safely come back as `None`, and the export plan
//! writes the computed value for that cell instead.
//!
//! ## Example
//!
//! ```rust
//! use flowcast_core::{ReferenceKey, SheetLayout};
//! use flowcast_excel::{can_convert, convert};
//!
//! let key = |s: &str| ReferenceKey::parse(s).unwrap();
//! let mut layout = SheetLayout::new();
//! layout.insert(key("R4"), "Calcs", 10);
//! layout.insert(key("R7"), "Calcs", 13);
//! layout.insert(key("C1.10"), "Constants", 5);
//!
//! let conversion = convert("R4 + R7 * C1.10", &layout, 2, "Calcs");
//! assert_eq!(conversion.formula.as_deref(), Some("=G$10+G$13*'Constants'!G$5"));
//! assert!(can_convert("R4 + R7"));
//! ```

pub mod error;
pub mod export;
pub mod probe;
pub mod transpiler;

pub use error::{ExcelError, ExcelResult};
pub use export::{ExportCell, ExportPlan, ExportRow, ExportSource, ExportStats};
pub use probe::{can_convert, looks_like_formula};
pub use transpiler::{convert, transpile, Conversion};
