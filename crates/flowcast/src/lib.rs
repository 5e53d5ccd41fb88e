//! # flowcast
//!
//! A formula engine for monthly financial models.
//!
//! A [`Model`] holds a [`Timeline`], bound input series and formula-defined
//! calculations. Calculations reference inputs and each other by symbolic
//! keys (`V1`, `C1.10`, `R17`, ...), evaluate over the whole timeline at
//! once, and can be exported as spreadsheet formulas.
//!
//! ## Features
//!
//! - Whole-timeline evaluation with temporal functions (`CUMSUM`, `SHIFT`, ...)
//! - Incremental recompute in dependency order, with memoized results
//! - Per-calculation errors; one broken formula never blocks the others
//! - Flow and stock aggregation into quarters and years
//! - Spreadsheet formula export with static-value fallback
//! - CSV input and export
//!
//! ## Example
//!
//! ```rust
//! use flowcast::prelude::*;
//!
//! let timeline = Timeline::monthly(2025, 1, 3).unwrap();
//! let mut model = Model::new(timeline);
//!
//! model.set_input("V1", vec![100.0, 110.0, 120.0]).unwrap();
//! model.set_input("C1.1", vec![0.5; 3]).unwrap();
//! model.add_calculation(Calculation::new(1, "Margin").with_formula("V1 * C1.1")).unwrap();
//! model.recompute_all();
//!
//! assert_eq!(model.values(CalculationId(1)).unwrap(), &[50.0, 55.0, 60.0]);
//! assert!(can_convert("V1 * C1.1"));
//! ```

pub mod model;
pub mod prelude;

// Re-export model types
pub use model::{CalculationStatus, Diagnostic, Model, ModelOptions, RecomputeStats};

// Re-export core types
pub use flowcast_core::{
    aggregate,
    // Aggregation
    AggregatedPeriod,
    Aggregation,
    // Calculations
    Calculation,
    CalculationId,
    CalculationType,
    CellLocation,
    // Error types
    Error,
    Granularity,
    // Layout
    LayoutBuilder,
    Period,
    PeriodGroup,
    // References
    ReferenceKey,
    ReferenceKind,
    ReferenceMap,
    Result,
    SheetLayout,
    // Timeline
    Timeline,
};

// Re-export formula types
pub use flowcast_formula::{
    evaluate_formula, is_blank_formula, parse_formula, references_of, scan_references, ErrorKind,
    Evaluation, EvaluationContext, FormulaError, FormulaExpr, FormulaResult,
};

// Re-export export types
pub use flowcast_excel::{
    can_convert, convert, looks_like_formula, Conversion, ExcelError, ExportCell, ExportPlan,
    ExportRow, ExportStats,
};

// Re-export I/O types
pub use flowcast_csv::{CsvError, CsvReadOptions, CsvReader, CsvWriteOptions, CsvWriter};

use std::fs::File;
use std::path::Path;

/// Extension trait for Model to add file I/O
pub trait ModelIoExt {
    /// Bind every series in an input CSV file, returning how many changed
    fn load_inputs<P: AsRef<Path>>(&mut self, path: P) -> Result<usize>;

    /// Write the spreadsheet export of the model to a CSV file
    fn save_export<P: AsRef<Path>>(&self, path: P, layout: &SheetLayout) -> Result<ExportStats>;

    /// Write every calculation's values to a CSV file
    fn save_results<P: AsRef<Path>>(&self, path: P) -> Result<()>;
}

impl ModelIoExt for Model {
    fn load_inputs<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let inputs =
            CsvReader::read_reference_map_file(path, self.timeline(), &CsvReadOptions::default())
                .map_err(|e| Error::other(e.to_string()))?;

        let mut changed = 0;
        for key in inputs.keys() {
            let Some(values) = inputs.get(key) else {
                continue;
            };
            if self.references().get(key) == Some(values) {
                continue;
            }
            self.set_input_key(key.clone(), values.to_vec())?;
            changed += 1;
        }

        Ok(changed)
    }

    fn save_export<P: AsRef<Path>>(&self, path: P, layout: &SheetLayout) -> Result<ExportStats> {
        let plan = self.export(layout)?;
        CsvWriter::write_export_file(
            &plan,
            &period_labels(self.timeline()),
            path,
            &CsvWriteOptions::default(),
        )
        .map_err(|e| Error::other(e.to_string()))?;

        Ok(plan.stats)
    }

    fn save_results<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut series = Vec::with_capacity(self.len());
        for calculation in self.calculations() {
            let values = self.values(calculation.id)?;
            series.push((calculation.id.to_string(), calculation.name.clone(), values));
        }

        let file = File::create(path).map_err(|e| Error::other(e.to_string()))?;
        CsvWriter::write_series(
            series,
            &period_labels(self.timeline()),
            file,
            &CsvWriteOptions::default(),
        )
        .map_err(|e| Error::other(e.to_string()))
    }
}

/// Column labels for a timeline, e.g. `Jan 2025`
pub fn period_labels(timeline: &Timeline) -> Vec<String> {
    timeline.periods().iter().map(|p| p.label()).collect()
}
