//! Calculation model
//!
//! Owns the timeline, the reference map and an arena of calculation nodes
//! indexed by id. Mutations only mark the affected calculations as pending;
//! [`Model::recompute`] re-evaluates the pending set in dependency order.
//! Results cannot be read while anything is pending.
//!
//! # Example
//!
//! ```rust
//! use flowcast::prelude::*;
//!
//! let timeline = Timeline::monthly(2025, 1, 3).unwrap();
//! let mut model = Model::new(timeline);
//! model.set_input("V1", vec![10.0, 20.0, 30.0]).unwrap();
//! model.add_calculation(Calculation::new(1, "Revenue").with_formula("V1 * 2")).unwrap();
//! model.add_calculation(Calculation::new(2, "Cumulative").with_formula("CUMSUM(R1)")).unwrap();
//!
//! let stats = model.recompute_all();
//! assert_eq!(stats.evaluated, 2);
//! assert_eq!(model.values(CalculationId(2)).unwrap(), &[20.0, 60.0, 120.0]);
//! ```

use crate::{Error, Result};
use ahash::AHashMap;
use flowcast_core::{
    aggregate, Aggregation, Calculation, CalculationId, CalculationType, PeriodGroup,
    ReferenceKey, ReferenceMap, SheetLayout, Timeline,
};
use flowcast_excel::{ExportPlan, ExportSource};
use flowcast_formula::{
    calculation_dependencies, evaluate_formula, scan_references, CalculationResults,
    DependencyGraph, ErrorKind, Evaluation, EvaluationContext, FormulaError, Series,
};
use std::collections::BTreeSet;
use tracing::{debug, trace, warn};

/// Options for model recomputation
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Skip calculations whose formula and inputs are unchanged (default: true)
    pub memoize: bool,
    /// Re-evaluate every calculation on each recompute (default: false)
    pub force_full_recompute: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            memoize: true,
            force_full_recompute: false,
        }
    }
}

/// Result state of one calculation
#[derive(Debug, Clone, PartialEq)]
pub enum CalculationStatus {
    Ok(Series),
    /// Failed; downstream calculations read `values`, which are all zero
    Error { error: FormulaError, values: Series },
}

impl CalculationStatus {
    pub fn values(&self) -> &[f64] {
        match self {
            CalculationStatus::Ok(values) | CalculationStatus::Error { values, .. } => values,
        }
    }

    pub fn error(&self) -> Option<&FormulaError> {
        match self {
            CalculationStatus::Ok(_) => None,
            CalculationStatus::Error { error, .. } => Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CalculationStatus::Ok(_))
    }
}

impl From<Evaluation> for CalculationStatus {
    fn from(evaluation: Evaluation) -> Self {
        match evaluation.error {
            None => CalculationStatus::Ok(evaluation.values),
            Some(error) => CalculationStatus::Error {
                error,
                values: evaluation.values,
            },
        }
    }
}

/// A broken calculation, as shown next to it in the authoring view
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub id: CalculationId,
    /// External reference label, e.g. `R17`
    pub label: String,
    pub name: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Statistics from a recompute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeStats {
    /// Calculations in the model
    pub calculations: usize,
    /// Calculations whose formula was evaluated
    pub evaluated: usize,
    /// Pending calculations whose memoized result was still valid
    pub reused: usize,
    /// Calculations left in an error state by this recompute
    pub errors: usize,
    /// Reference cycles found among the recomputed calculations
    pub cycles: usize,
}

/// What a memoized result was computed from
#[derive(Debug, Clone, PartialEq, Eq)]
struct MemoKey {
    formula: String,
    /// Revision of each referenced key; `None` when unbound
    revisions: Vec<(ReferenceKey, Option<u64>)>,
}

#[derive(Debug, Clone)]
struct Node {
    calculation: Calculation,
    references: Vec<ReferenceKey>,
    status: CalculationStatus,
    /// Advances whenever `status` changes
    revision: u64,
    memo: Option<MemoKey>,
}

/// A financial model: inputs, calculations and their results
#[derive(Debug, Clone)]
pub struct Model {
    timeline: Timeline,
    references: ReferenceMap,
    options: ModelOptions,
    nodes: Vec<Node>,
    index: AHashMap<CalculationId, usize>,
    graph: DependencyGraph,
    input_revisions: AHashMap<ReferenceKey, u64>,
    clock: u64,
    pending: BTreeSet<CalculationId>,
}

impl Model {
    /// Create an empty model over `timeline` with default options
    pub fn new(timeline: Timeline) -> Self {
        Self::with_options(timeline, ModelOptions::default())
    }

    pub fn with_options(timeline: Timeline, options: ModelOptions) -> Self {
        let references = ReferenceMap::for_timeline(&timeline);
        Self {
            timeline,
            references,
            options,
            nodes: Vec::new(),
            index: AHashMap::new(),
            graph: DependencyGraph::new(),
            input_revisions: AHashMap::new(),
            clock: 0,
            pending: BTreeSet::new(),
        }
    }

    /// Create a model over an existing reference map
    pub fn from_parts(
        timeline: Timeline,
        references: ReferenceMap,
        options: ModelOptions,
    ) -> Result<Self> {
        let references = references.with_time_constants(&timeline)?;
        let mut model = Self::with_options(timeline, options);
        model.references = references;
        Ok(model)
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn references(&self) -> &ReferenceMap {
        &self.references
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: ModelOptions) {
        self.options = options;
    }

    // === Inputs ===

    /// Bind an input series; calculations reading it become pending
    pub fn set_input(&mut self, key: &str, values: Vec<f64>) -> Result<()> {
        self.set_input_key(ReferenceKey::parse(key)?, values)
    }

    pub fn set_input_key(&mut self, key: ReferenceKey, values: Vec<f64>) -> Result<()> {
        if self.references.get(&key) == Some(values.as_slice()) {
            return Ok(());
        }
        self.references.insert(key.clone(), values)?;
        self.input_changed(key);
        Ok(())
    }

    /// Unbind an input series, returning its values
    pub fn remove_input(&mut self, key: &str) -> Result<Option<Vec<f64>>> {
        let key = ReferenceKey::parse(key)?;
        let removed = self.references.remove(&key);
        if removed.is_some() {
            self.input_changed(key);
        }
        Ok(removed)
    }

    fn input_changed(&mut self, key: ReferenceKey) {
        self.clock += 1;
        self.input_revisions.insert(key.clone(), self.clock);

        let readers: Vec<CalculationId> = self
            .nodes
            .iter()
            .filter(|node| node.references.contains(&key))
            .map(|node| node.calculation.id)
            .collect();
        self.mark_pending(&readers);
    }

    // === Calculations ===

    /// Add a calculation; it and anything already referencing it become pending
    pub fn add_calculation(&mut self, calculation: Calculation) -> Result<()> {
        let id = calculation.id;
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateCalculation(id.0));
        }

        let references = scan_references(&calculation.formula);
        self.graph.add_node(id);
        self.graph
            .set_precedents(id, calculation_dependencies(&calculation.formula));

        self.index.insert(id, self.nodes.len());
        self.nodes.push(Node {
            status: CalculationStatus::Ok(vec![0.0; self.timeline.len()]),
            calculation,
            references,
            revision: 0,
            memo: None,
        });

        self.mark_pending(&[id]);
        Ok(())
    }

    /// Commit a new formula for `id`
    pub fn update_formula(&mut self, id: CalculationId, formula: impl Into<String>) -> Result<()> {
        let formula = formula.into();
        let position = self.position(id)?;

        self.graph
            .set_precedents(id, calculation_dependencies(&formula));
        let node = &mut self.nodes[position];
        node.references = scan_references(&formula);
        node.calculation.formula = formula;

        self.mark_pending(&[id]);
        Ok(())
    }

    /// Change how a calculation aggregates; its values are unaffected
    pub fn set_calculation_type(&mut self, id: CalculationId, calc_type: CalculationType) -> Result<()> {
        let position = self.position(id)?;
        self.nodes[position].calculation.calc_type = calc_type;
        Ok(())
    }

    /// Remove a calculation
    ///
    /// Formulas that reference it are left as they are and report a
    /// reference error at the next recompute.
    pub fn remove_calculation(&mut self, id: CalculationId) -> Result<Calculation> {
        let position = self.position(id)?;
        let node = self.nodes.remove(position);

        self.index.remove(&id);
        for index in self.index.values_mut() {
            if *index > position {
                *index -= 1;
            }
        }

        self.mark_pending(&[id]);
        self.pending.remove(&id);
        self.graph.remove_node(id);

        Ok(node.calculation)
    }

    pub fn calculation(&self, id: CalculationId) -> Option<&Calculation> {
        self.index.get(&id).map(|&i| &self.nodes[i].calculation)
    }

    /// Calculations in insertion order
    pub fn calculations(&self) -> impl Iterator<Item = &Calculation> + '_ {
        self.nodes.iter().map(|node| &node.calculation)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn position(&self, id: CalculationId) -> Result<usize> {
        self.index
            .get(&id)
            .copied()
            .ok_or(Error::CalculationNotFound(id.0))
    }

    fn mark_pending(&mut self, changed: &[CalculationId]) {
        let affected = self.graph.transitive_dependents(changed);
        self.pending
            .extend(affected.into_iter().filter(|id| self.index.contains_key(id)));
    }

    // === Recompute ===

    /// Whether results are out of date
    pub fn is_stale(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Calculations awaiting recompute
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Mark `changed` and everything downstream of it pending, then recompute
    pub fn recompute(&mut self, changed: &[CalculationId]) -> Result<RecomputeStats> {
        for &id in changed {
            self.position(id)?;
        }
        self.mark_pending(changed);

        if self.options.force_full_recompute {
            return Ok(self.recompute_all());
        }
        Ok(self.run(self.options.memoize))
    }

    /// Re-evaluate every calculation, ignoring memoized results
    pub fn recompute_all(&mut self) -> RecomputeStats {
        let all: Vec<CalculationId> = self.nodes.iter().map(|n| n.calculation.id).collect();
        self.pending.extend(all);
        self.run(false)
    }

    fn run(&mut self, memoize: bool) -> RecomputeStats {
        let order = self.graph.evaluation_order();
        let mut stats = RecomputeStats {
            calculations: self.nodes.len(),
            ..Default::default()
        };

        for cycle in &order.cycles {
            if cycle.iter().any(|id| self.pending.contains(id)) {
                stats.cycles += 1;
                let labels: Vec<String> = cycle.iter().map(ToString::to_string).collect();
                warn!(cycle = %labels.join(" -> "), "circular reference");
            }
        }

        for &id in &order.order {
            if !self.pending.contains(&id) {
                continue;
            }
            let Some(&position) = self.index.get(&id) else {
                continue;
            };

            if let Some(cycle) = order.cycle_of(id) {
                let labels: Vec<String> = cycle.iter().map(ToString::to_string).collect();
                let error = FormulaError::CircularReference(labels.join(" -> "));
                self.store(position, None, CalculationStatus::Error {
                    error,
                    values: vec![0.0; self.timeline.len()],
                });
                stats.errors += 1;
                continue;
            }

            let key = self.memo_key(position);
            if memoize && self.nodes[position].memo.as_ref() == Some(&key) {
                trace!(calculation = %id, "reused memoized result");
                stats.reused += 1;
                if !self.nodes[position].status.is_ok() {
                    stats.errors += 1;
                }
                continue;
            }

            let evaluation = {
                let results = NodeResults(self);
                let ctx = EvaluationContext::new(&self.timeline, &self.references)
                    .with_results(&results);
                evaluate_formula(&self.nodes[position].calculation.formula, &ctx)
            };
            trace!(calculation = %id, ok = evaluation.is_ok(), "evaluated");

            stats.evaluated += 1;
            if !evaluation.is_ok() {
                stats.errors += 1;
            }
            self.store(position, Some(key), evaluation.into());
        }

        self.pending.clear();
        debug!(
            calculations = stats.calculations,
            evaluated = stats.evaluated,
            reused = stats.reused,
            errors = stats.errors,
            cycles = stats.cycles,
            "recompute finished"
        );
        stats
    }

    fn memo_key(&self, position: usize) -> MemoKey {
        let node = &self.nodes[position];
        let revisions = node
            .references
            .iter()
            .map(|key| {
                let revision = match key.calculation_id() {
                    Some(id) => self
                        .index
                        .get(&CalculationId(id))
                        .map(|&i| self.nodes[i].revision),
                    None => self.input_revisions.get(key).copied(),
                };
                (key.clone(), revision)
            })
            .collect();

        MemoKey {
            formula: node.calculation.formula.clone(),
            revisions,
        }
    }

    fn store(&mut self, position: usize, memo: Option<MemoKey>, status: CalculationStatus) {
        if self.nodes[position].status != status {
            self.clock += 1;
            self.nodes[position].revision = self.clock;
            self.nodes[position].status = status;
        }
        self.nodes[position].memo = memo;
    }

    // === Results ===

    fn ensure_fresh(&self) -> Result<()> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(Error::Stale(self.pending.len()))
        }
    }

    /// The result state of `id`
    pub fn status(&self, id: CalculationId) -> Result<&CalculationStatus> {
        let position = self.position(id)?;
        self.ensure_fresh()?;
        Ok(&self.nodes[position].status)
    }

    /// The values of `id`; all zeros if it is in an error state
    pub fn values(&self, id: CalculationId) -> Result<&[f64]> {
        self.status(id).map(CalculationStatus::values)
    }

    /// Every calculation in an error state
    pub fn diagnostics(&self) -> Result<Vec<Diagnostic>> {
        self.ensure_fresh()?;
        Ok(self
            .nodes
            .iter()
            .filter_map(|node| {
                let error = node.status.error()?;
                Some(Diagnostic {
                    id: node.calculation.id,
                    label: node.calculation.id.to_string(),
                    name: node.calculation.name.clone(),
                    kind: error.kind(),
                    message: error.to_string(),
                })
            })
            .collect())
    }

    /// Aggregate `id` into display periods according to its type
    pub fn aggregate(&self, id: CalculationId, groups: &[PeriodGroup]) -> Result<Aggregation> {
        let values = self.values(id)?;
        let calc_type = self.nodes[self.position(id)?].calculation.calc_type;
        Ok(aggregate(values, groups, calc_type))
    }

    /// Evaluate an uncommitted formula for `id` without touching the model
    ///
    /// A formula that would make `id` depend on itself comes back as a
    /// circular reference error.
    pub fn preview(&self, id: CalculationId, formula: &str) -> Result<Evaluation> {
        self.ensure_fresh()?;

        let dependencies = calculation_dependencies(formula);
        if self.graph.would_create_cycle(id, &dependencies) {
            return Ok(Evaluation {
                values: vec![0.0; self.timeline.len()],
                error: Some(FormulaError::CircularReference(format!(
                    "{} would depend on itself",
                    id
                ))),
            });
        }

        let results = NodeResults(self);
        let ctx = EvaluationContext::new(&self.timeline, &self.references).with_results(&results);
        Ok(evaluate_formula(formula, &ctx))
    }

    /// Plan a spreadsheet export of every calculation
    pub fn export(&self, layout: &SheetLayout) -> Result<ExportPlan> {
        self.ensure_fresh()?;

        let sources = self.nodes.iter().map(|node| ExportSource {
            calculation: &node.calculation,
            values: node.status.values(),
            has_error: !node.status.is_ok(),
        });
        ExportPlan::build(sources, layout, self.timeline.len()).map_err(|e| Error::other(e.to_string()))
    }
}

/// Calculation results as read by `R` references
struct NodeResults<'a>(&'a Model);

impl CalculationResults for NodeResults<'_> {
    fn result(&self, id: CalculationId) -> Option<&[f64]> {
        let model = self.0;
        model
            .index
            .get(&id)
            .map(|&i| model.nodes[i].status.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcast_core::Granularity;
    use pretty_assertions::assert_eq;

    fn id(n: u32) -> CalculationId {
        CalculationId(n)
    }

    fn model() -> Model {
        let timeline = Timeline::monthly(2025, 1, 4).unwrap();
        let mut model = Model::new(timeline);
        model.set_input("V1", vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        model.set_input("C1.1", vec![10.0; 4]).unwrap();
        model
    }

    fn add(model: &mut Model, n: u32, formula: &str) {
        model
            .add_calculation(Calculation::new(n, format!("Line {}", n)).with_formula(formula))
            .unwrap();
    }

    #[test]
    fn test_dependency_order_independent_of_insertion() {
        let mut model = model();
        add(&mut model, 3, "R2 + R1");
        add(&mut model, 2, "R1 * 2");
        add(&mut model, 1, "V1 * C1.1");

        let stats = model.recompute_all();
        assert_eq!(stats.evaluated, 3);
        assert_eq!(stats.errors, 0);
        assert_eq!(model.values(id(3)).unwrap(), &[30.0, 60.0, 90.0, 120.0]);
    }

    #[test]
    fn test_stale_reads_rejected() {
        let mut model = model();
        add(&mut model, 1, "V1");
        assert!(matches!(model.values(id(1)), Err(Error::Stale(1))));

        model.recompute(&[]).unwrap();
        assert!(model.values(id(1)).is_ok());

        model.set_input("V1", vec![0.0; 4]).unwrap();
        assert!(model.is_stale());
        assert!(model.diagnostics().is_err());
    }

    #[test]
    fn test_cycle_is_partial_failure() {
        let mut model = model();
        add(&mut model, 1, "R2");
        add(&mut model, 2, "R1");
        add(&mut model, 3, "V1 + 1");
        add(&mut model, 4, "R1 + 5");

        let stats = model.recompute_all();
        assert_eq!(stats.cycles, 1);

        for n in [1, 2] {
            let status = model.status(id(n)).unwrap();
            assert_eq!(status.error().map(FormulaError::kind), Some(ErrorKind::Dependency));
            assert_eq!(status.values(), &[0.0; 4]);
        }
        assert_eq!(model.values(id(3)).unwrap(), &[2.0, 3.0, 4.0, 5.0]);
        // Downstream of the cycle sees its zeros
        assert_eq!(model.values(id(4)).unwrap(), &[5.0; 4]);

        let diagnostics = model.diagnostics().unwrap();
        let labels: Vec<&str> = diagnostics.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["R1", "R2"]);
    }

    #[test]
    fn test_incremental_recompute_reuses_results() {
        let mut model = model();
        add(&mut model, 1, "V1");
        add(&mut model, 2, "R1 * 2");
        add(&mut model, 3, "C1.1");
        model.recompute_all();

        model.update_formula(id(1), "V1 + 0").unwrap();
        let stats = model.recompute(&[]).unwrap();
        // R1's values did not change, so R2 is reused; R3 is untouched
        assert_eq!(stats.evaluated, 1);
        assert_eq!(stats.reused, 1);

        model.set_input("V1", vec![5.0; 4]).unwrap();
        let stats = model.recompute(&[]).unwrap();
        assert_eq!(stats.evaluated, 2);
        assert_eq!(model.values(id(2)).unwrap(), &[10.0; 4]);
    }

    #[test]
    fn test_forced_recompute_evaluates_everything() {
        let mut model = model();
        add(&mut model, 1, "V1");
        add(&mut model, 2, "R1");
        model.recompute_all();

        model.set_options(ModelOptions {
            force_full_recompute: true,
            ..Default::default()
        });
        let stats = model.recompute(&[id(2)]).unwrap();
        assert_eq!(stats.evaluated, 2);
        assert!(model.recompute(&[id(9)]).is_err());
    }

    #[test]
    fn test_remove_leaves_dangling_reference() {
        let mut model = model();
        add(&mut model, 1, "V1");
        add(&mut model, 2, "R1 + 1");
        model.recompute_all();

        let removed = model.remove_calculation(id(1)).unwrap();
        assert_eq!(removed.formula, "V1");
        model.recompute(&[]).unwrap();

        let status = model.status(id(2)).unwrap();
        assert_eq!(
            status.error(),
            Some(&FormulaError::UnknownReference("R1".into()))
        );
        assert_eq!(model.calculation(id(2)).unwrap().formula, "R1 + 1");

        add(&mut model, 1, "V1 * 3");
        model.recompute(&[]).unwrap();
        assert_eq!(model.values(id(2)).unwrap(), &[4.0, 7.0, 10.0, 13.0]);
    }

    #[test]
    fn test_preview_does_not_commit() {
        let mut model = model();
        add(&mut model, 1, "V1");
        add(&mut model, 2, "R1");
        model.recompute_all();

        let preview = model.preview(id(2), "CUMSUM(R1)").unwrap();
        assert_eq!(preview.values, vec![1.0, 3.0, 6.0, 10.0]);
        assert_eq!(model.calculation(id(2)).unwrap().formula, "R1");
        assert!(!model.is_stale());

        let preview = model.preview(id(1), "R2 + 1").unwrap();
        assert_eq!(preview.error.map(|e| e.kind()), Some(ErrorKind::Dependency));
    }

    #[test]
    fn test_errors_attached_to_calculation() {
        let mut model = model();
        add(&mut model, 1, "V1 + V9");
        add(&mut model, 2, "CUMSUM(V1");
        add(&mut model, 3, "");
        model.recompute_all();

        let kinds: Vec<(String, ErrorKind)> = model
            .diagnostics()
            .unwrap()
            .into_iter()
            .map(|d| (d.label, d.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("R1".to_string(), ErrorKind::Reference),
                ("R2".to_string(), ErrorKind::Syntax),
            ]
        );
        assert_eq!(model.values(id(3)).unwrap(), &[0.0; 4]);
    }

    #[test]
    fn test_aggregate_by_type() {
        let timeline = Timeline::monthly(2025, 1, 6).unwrap();
        let mut model = Model::new(timeline);
        model.set_input("V1", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        add(&mut model, 1, "V1");
        model.recompute_all();
        let quarters = model.timeline().groupings(Granularity::Quarterly);

        assert_eq!(model.aggregate(id(1), &quarters).unwrap().total, 21.0);

        model.set_calculation_type(id(1), CalculationType::Stock).unwrap();
        let agg = model.aggregate(id(1), &quarters).unwrap();
        assert_eq!(agg.values(), vec![3.0, 6.0]);
        assert_eq!(agg.total, 6.0);
    }

    #[test]
    fn test_configuration_errors() {
        let mut model = model();
        add(&mut model, 1, "V1");

        assert!(matches!(
            model.add_calculation(Calculation::new(1, "Again")),
            Err(Error::DuplicateCalculation(1))
        ));
        assert!(matches!(
            model.set_input("V2", vec![1.0; 3]),
            Err(Error::LengthMismatch { .. })
        ));
        assert!(matches!(
            model.update_formula(id(7), "V1"),
            Err(Error::CalculationNotFound(7))
        ));
    }
}
