//! End-to-end model scenarios: inputs, calculations, recompute, read back

use flowcast::prelude::*;
use flowcast::{ReferenceKey, ReferenceMap};
use pretty_assertions::assert_eq;

fn timeline(months: usize) -> Timeline {
    Timeline::monthly(2025, 1, months).unwrap()
}

#[test]
fn test_revenue_build_up() {
    let mut model = Model::new(timeline(6));
    model.set_input("V1", vec![100.0; 6]).unwrap();
    model.set_input("C1.10", vec![1.1; 6]).unwrap();

    model
        .add_calculation(Calculation::new(1, "Units").with_formula("CUMSUM(V1)"))
        .unwrap();
    model
        .add_calculation(Calculation::new(2, "Price").with_formula("10 * C1.10"))
        .unwrap();
    model
        .add_calculation(
            Calculation::new(3, "Revenue")
                .with_formula("R1 * R2")
                .with_type(CalculationType::Flow),
        )
        .unwrap();
    model
        .add_calculation(
            Calculation::new(4, "Opening units")
                .with_formula("PREVVAL(R1)")
                .with_type(CalculationType::StockStart),
        )
        .unwrap();

    let stats = model.recompute_all();
    assert_eq!(stats.calculations, 4);
    assert_eq!(stats.errors, 0);

    assert_eq!(
        model.values(CalculationId(1)).unwrap(),
        &[100.0, 200.0, 300.0, 400.0, 500.0, 600.0]
    );
    assert_eq!(
        model.values(CalculationId(4)).unwrap(),
        &[0.0, 100.0, 200.0, 300.0, 400.0, 500.0]
    );

    let revenue = model.values(CalculationId(3)).unwrap();
    assert!((revenue[2] - 3300.0).abs() < 1e-9);

    let quarters = model.timeline().groupings(Granularity::Quarterly);
    let opening = model.aggregate(CalculationId(4), &quarters).unwrap();
    assert_eq!(opening.values(), vec![0.0, 300.0]);
}

#[test]
fn test_division_and_comparison_semantics() {
    let mut model = Model::new(timeline(3));
    model.set_input("V1", vec![10.0, 0.0, -5.0]).unwrap();
    model.set_input("V2", vec![2.0, 0.0, 0.0]).unwrap();
    model
        .add_calculation(Calculation::new(1, "Ratio").with_formula("V1 / V2"))
        .unwrap();
    model
        .add_calculation(Calculation::new(2, "Positive").with_formula("V1 > 0"))
        .unwrap();
    model
        .add_calculation(Calculation::new(3, "Floor").with_formula("MAX(V1, 0) - ABS(V1)"))
        .unwrap();
    model.recompute(&[]).unwrap();

    assert_eq!(model.values(CalculationId(1)).unwrap(), &[5.0, 0.0, 0.0]);
    assert_eq!(model.values(CalculationId(2)).unwrap(), &[1.0, 0.0, 0.0]);
    assert_eq!(model.values(CalculationId(3)).unwrap(), &[0.0, 0.0, -5.0]);
}

#[test]
fn test_cycle_does_not_block_other_calculations() {
    let mut model = Model::new(timeline(3));
    model.set_input("V1", vec![1.0, 2.0, 3.0]).unwrap();
    model
        .add_calculation(Calculation::new(1, "A").with_formula("R2"))
        .unwrap();
    model
        .add_calculation(Calculation::new(2, "B").with_formula("R1"))
        .unwrap();
    model
        .add_calculation(Calculation::new(3, "C").with_formula("V1 * 2"))
        .unwrap();

    let stats = model.recompute(&[]).unwrap();
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.errors, 2);
    assert_eq!(model.values(CalculationId(3)).unwrap(), &[2.0, 4.0, 6.0]);

    let diagnostics = model.diagnostics().unwrap();
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics.iter().all(|d| d.kind == ErrorKind::Dependency));

    // Breaking the cycle clears both errors
    model.update_formula(CalculationId(2), "V1").unwrap();
    model.recompute(&[]).unwrap();
    assert!(model.diagnostics().unwrap().is_empty());
    assert_eq!(model.values(CalculationId(1)).unwrap(), &[1.0, 2.0, 3.0]);
}

#[test]
fn test_input_change_propagates_downstream_only() {
    let mut model = Model::new(timeline(2));
    model.set_input("V1", vec![1.0, 1.0]).unwrap();
    model.set_input("V2", vec![5.0, 5.0]).unwrap();
    model
        .add_calculation(Calculation::new(1, "A").with_formula("V1"))
        .unwrap();
    model
        .add_calculation(Calculation::new(2, "B").with_formula("R1 + 1"))
        .unwrap();
    model
        .add_calculation(Calculation::new(3, "C").with_formula("V2"))
        .unwrap();
    model.recompute_all();

    model.set_input("V1", vec![2.0, 2.0]).unwrap();
    assert_eq!(model.pending(), 2);
    assert!(matches!(model.values(CalculationId(3)), Err(Error::Stale(2))));

    let stats = model.recompute(&[]).unwrap();
    assert_eq!(stats.evaluated, 2);
    assert_eq!(model.values(CalculationId(2)).unwrap(), &[3.0, 3.0]);

    // Setting identical values is not a change
    model.set_input("V1", vec![2.0, 2.0]).unwrap();
    assert!(!model.is_stale());
}

#[test]
fn test_unbound_reference_reported_on_calculation() {
    let mut model = Model::new(timeline(2));
    model
        .add_calculation(Calculation::new(1, "Broken").with_formula("V3 + 1"))
        .unwrap();
    model
        .add_calculation(Calculation::new(2, "Fine").with_formula("T.DiM"))
        .unwrap();
    model.recompute(&[]).unwrap();

    let status = model.status(CalculationId(1)).unwrap();
    assert_eq!(status.values(), &[0.0, 0.0]);
    assert_eq!(status.error().map(FormulaError::kind), Some(ErrorKind::Reference));
    assert_eq!(model.values(CalculationId(2)).unwrap(), &[31.0, 28.0]);

    model.set_input("V3", vec![1.0, 2.0]).unwrap();
    model.recompute(&[]).unwrap();
    assert_eq!(model.values(CalculationId(1)).unwrap(), &[2.0, 3.0]);
}

#[test]
fn test_model_from_existing_references() {
    let timeline = timeline(3);
    let mut references = ReferenceMap::new(3);
    references.insert_str("V1", vec![1.0, 2.0, 3.0]).unwrap();
    references.insert(ReferenceKey::parse("F2").unwrap(), vec![0.0, 1.0, 1.0]).unwrap();

    let mut model = Model::from_parts(timeline, references, ModelOptions::default()).unwrap();
    model
        .add_calculation(Calculation::new(1, "Gated").with_formula("V1 * F2 + T.MiY"))
        .unwrap();
    model.recompute(&[]).unwrap();

    assert_eq!(model.values(CalculationId(1)).unwrap(), &[12.0, 14.0, 15.0]);
}
