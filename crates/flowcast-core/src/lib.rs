//! # flowcast-core
//!
//! Core data structures for the flowcast financial model engine.
//!
//! This crate provides the fundamental types shared by the formula engine,
//! the spreadsheet exporter and the model facade:
//! - [`Timeline`] and [`PeriodGroup`] - The monthly period axis and display groupings
//! - [`ReferenceKey`] and [`ReferenceKind`] - Typed symbolic references (`V1`, `C1.10`, `R17`, ...)
//! - [`ReferenceMap`] - Symbolic key → time series, length-checked against the timeline
//! - [`Calculation`] - A formula-defined line item and its [`CalculationType`]
//! - [`aggregate`] - Flow/stock aggregation into display periods
//! - [`SheetLayout`] - Reference → spreadsheet row mapping for export
//!
//! ## Example
//!
//! ```rust
//! use flowcast_core::{ReferenceMap, Timeline};
//!
//! let timeline = Timeline::monthly(2025, 1, 12).unwrap();
//! let mut refs = ReferenceMap::for_timeline(&timeline);
//!
//! refs.insert_str("V1", vec![100.0; 12]).unwrap();
//! assert!(refs.insert_str("V2", vec![1.0; 3]).is_err());
//! ```

pub mod aggregate;
pub mod calculation;
pub mod error;
pub mod layout;
pub mod reference;
pub mod reference_map;
pub mod timeline;

// Re-exports for convenience
pub use aggregate::{aggregate, aggregate_period, calculate_total, AggregatedPeriod, Aggregation};
pub use calculation::{Calculation, CalculationId, CalculationType};
pub use error::{Error, Result};
pub use layout::{
    column_to_letters, letters_to_column, CellLocation, LayoutBuilder, SheetLayout,
    FIRST_DATA_COLUMN, MAX_COLUMN,
};
pub use reference::{FlagEdge, ReferenceKey, ReferenceKind};
pub use reference_map::ReferenceMap;
pub use timeline::{Granularity, Period, PeriodGroup, Timeline, TIME_CONSTANTS};
