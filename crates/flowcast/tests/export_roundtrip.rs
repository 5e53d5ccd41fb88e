//! Spreadsheet export of a recomputed model

use flowcast::prelude::*;
use flowcast::{ExportCell, ReferenceKey};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn key(s: &str) -> ReferenceKey {
    ReferenceKey::parse(s).unwrap()
}

fn model() -> Model {
    let timeline = Timeline::monthly(2025, 1, 3).unwrap();
    let mut model = Model::new(timeline);
    model.set_input("C1.10", vec![2.0; 3]).unwrap();
    model
        .add_calculation(Calculation::new(4, "Base").with_formula("5"))
        .unwrap();
    model
        .add_calculation(Calculation::new(7, "Volume").with_formula("CUMSUM(R4)"))
        .unwrap();
    model
        .add_calculation(Calculation::new(8, "Total").with_formula("R4 + R7 * C1.10"))
        .unwrap();
    model
        .add_calculation(Calculation::new(9, "Annual").with_formula("CUMSUM_Y(R4)"))
        .unwrap();
    model.recompute_all();
    model
}

fn layout() -> SheetLayout {
    SheetLayout::builder()
        .start_row(10)
        .place(key("R4"), "Calcs")
        .place(key("R7"), "Calcs")
        .place(key("R8"), "Calcs")
        .place(key("R9"), "Calcs")
        .build()
}

fn with_constants(mut layout: SheetLayout) -> SheetLayout {
    layout.insert(key("C1.10"), "Constants", 5);
    layout
}

#[test]
fn test_export_plan() {
    let model = model();
    let plan = model.export(&with_constants(layout())).unwrap();

    let total = &plan.rows[2];
    assert_eq!(total.location.row, 12);
    assert_eq!(
        total.cells[2],
        ExportCell::Formula("=G$10+G$11*'Constants'!G$5".to_string())
    );

    let volume = &plan.rows[1];
    assert_eq!(
        volume.cells[2],
        ExportCell::Formula("=SUM($E$10:G$10)".to_string())
    );

    // No spreadsheet form: computed values instead
    let annual = &plan.rows[3];
    assert!(annual.is_degraded());
    assert_eq!(
        annual.cells,
        vec![
            ExportCell::Static(5.0),
            ExportCell::Static(10.0),
            ExportCell::Static(15.0),
        ]
    );

    assert_eq!(plan.stats.calculations, 4);
    assert_eq!(plan.stats.degraded_calculations, 1);
    assert_eq!(plan.stats.formula_cells, 9);
}

#[test]
fn test_missing_reference_row_falls_back_to_values() {
    let model = model();
    let plan = model.export(&layout()).unwrap();

    let total = &plan.rows[2];
    assert!(total.is_degraded());
    assert_eq!(total.cells[0], ExportCell::Static(15.0));
}

#[test]
fn test_export_requires_fresh_results() {
    let mut model = model();
    model.update_formula(CalculationId(4), "6").unwrap();
    assert!(matches!(
        model.export(&layout()),
        Err(Error::Stale(_))
    ));
}

#[test]
fn test_save_export_and_results() {
    let dir = TempDir::new().unwrap();
    let model = model();

    let export_path = dir.path().join("export.csv");
    let stats = model
        .save_export(&export_path, &with_constants(layout()))
        .unwrap();
    assert_eq!(stats.static_cells, 3);

    let content = fs::read_to_string(&export_path).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("key,name,Jan 2025,Feb 2025,Mar 2025"));
    assert_eq!(lines.next(), Some("R4,Base,=5,=5,=5"));

    let results_path = dir.path().join("results.csv");
    model.save_results(&results_path).unwrap();
    let content = fs::read_to_string(&results_path).unwrap();
    assert!(content.contains("R7,Volume,5,10,15"));
}

#[test]
fn test_load_inputs_from_csv() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inputs.csv");
    fs::write(&path, "V1,1,2,3\nC1.10,4,4,4\n").unwrap();

    let mut model = model();
    model
        .add_calculation(Calculation::new(10, "Scaled").with_formula("V1 * C1.10"))
        .unwrap();

    // C1.10 changed from 2 to 4; V1 is new
    assert_eq!(model.load_inputs(&path).unwrap(), 2);
    model.recompute(&[]).unwrap();

    assert_eq!(model.values(CalculationId(10)).unwrap(), &[4.0, 8.0, 12.0]);
    assert_eq!(model.values(CalculationId(8)).unwrap(), &[25.0, 45.0, 65.0]);
}
