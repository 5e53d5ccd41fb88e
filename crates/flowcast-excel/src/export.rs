//! Export planning
//!
//! Walks every calculation row and period column, keeping a formula where the
//! transpiler can produce one and the computed value where it cannot.

use crate::error::{ExcelError, ExcelResult};
use crate::transpiler::transpile;
use flowcast_core::{Calculation, CalculationId, CellLocation, SheetLayout};
use tracing::{debug, warn};

/// Content of one exported cell
#[derive(Debug, Clone, PartialEq)]
pub enum ExportCell {
    Formula(String),
    Static(f64),
}

impl ExportCell {
    pub fn is_formula(&self) -> bool {
        matches!(self, ExportCell::Formula(_))
    }
}

/// A calculation and the values the engine computed for it
#[derive(Debug, Clone, Copy)]
pub struct ExportSource<'a> {
    pub calculation: &'a Calculation,
    pub values: &'a [f64],
    /// Broken calculations export their values only
    pub has_error: bool,
}

/// One calculation's exported row
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub id: CalculationId,
    pub name: String,
    pub location: CellLocation,
    pub cells: Vec<ExportCell>,
    /// Why at least one cell holds a static value
    pub degraded: Option<ExcelError>,
}

impl ExportRow {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Formula coverage of an export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub calculations: usize,
    pub formula_cells: usize,
    pub static_cells: usize,
    /// Calculations with at least one static cell
    pub degraded_calculations: usize,
}

impl ExportStats {
    /// Share of cells exported as formulas, `1.0` for an empty export
    pub fn formula_coverage(&self) -> f64 {
        let total = self.formula_cells + self.static_cells;
        if total == 0 {
            1.0
        } else {
            self.formula_cells as f64 / total as f64
        }
    }
}

/// Every calculation row of an export, ready to be written out
#[derive(Debug, Clone, Default)]
pub struct ExportPlan {
    pub periods: usize,
    pub rows: Vec<ExportRow>,
    pub stats: ExportStats,
}

impl ExportPlan {
    /// Plan the export of `sources` over `periods` columns
    ///
    /// Each calculation's own key must have a row in `layout`; that row's
    /// sheet is the home sheet its formulas are written for.
    pub fn build<'a>(
        sources: impl IntoIterator<Item = ExportSource<'a>>,
        layout: &SheetLayout,
        periods: usize,
    ) -> ExcelResult<Self> {
        let mut plan = ExportPlan {
            periods,
            ..Default::default()
        };

        for source in sources {
            let row = plan_row(source, layout, periods)?;

            plan.stats.calculations += 1;
            let formulas = row.cells.iter().filter(|c| c.is_formula()).count();
            plan.stats.formula_cells += formulas;
            plan.stats.static_cells += row.cells.len() - formulas;

            if let Some(reason) = &row.degraded {
                plan.stats.degraded_calculations += 1;
                warn!(calculation = %row.id, error = %reason, "exporting static values");
            }

            plan.rows.push(row);
        }

        debug!(
            calculations = plan.stats.calculations,
            formula_cells = plan.stats.formula_cells,
            static_cells = plan.stats.static_cells,
            "export planned"
        );

        Ok(plan)
    }
}

fn plan_row(source: ExportSource<'_>, layout: &SheetLayout, periods: usize) -> ExcelResult<ExportRow> {
    let calc = source.calculation;
    let key = calc.reference_key();
    let location = layout
        .get(&key)
        .cloned()
        .ok_or_else(|| ExcelError::MissingLayout(key.to_string()))?;

    if source.values.len() != periods {
        return Err(ExcelError::LengthMismatch {
            key: key.to_string(),
            expected: periods,
            actual: source.values.len(),
        });
    }

    let mut degraded = None;
    let cells = source
        .values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            if source.has_error {
                degraded.get_or_insert_with(|| ExcelError::BrokenCalculation(key.to_string()));
                return ExportCell::Static(value);
            }
            match transpile(&calc.formula, layout, i, &location.sheet) {
                Ok(formula) => ExportCell::Formula(formula),
                Err(error) => {
                    degraded.get_or_insert(error);
                    ExportCell::Static(value)
                }
            }
        })
        .collect();

    Ok(ExportRow {
        id: calc.id,
        name: calc.name.clone(),
        location,
        cells,
        degraded,
    })
}
