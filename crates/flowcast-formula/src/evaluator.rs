//! Formula evaluator
//!
//! Evaluates formula ASTs over a whole timeline at once. Every value is a
//! [`Series`] holding one number per period; literals broadcast to every
//! period.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{registry, FunctionImpl};
use crate::parser::parse_formula;
use ahash::AHashMap;
use flowcast_core::{CalculationId, ReferenceKey, ReferenceKind, ReferenceMap, Timeline};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// One value per timeline period
pub type Series = Vec<f64>;

/// Already-computed calculation results, consumed by `R` references
pub trait CalculationResults {
    fn result(&self, id: CalculationId) -> Option<&[f64]>;
}

impl<S: BuildHasher> CalculationResults for HashMap<CalculationId, Series, S> {
    fn result(&self, id: CalculationId) -> Option<&[f64]> {
        self.get(&id).map(Vec::as_slice)
    }
}

impl CalculationResults for AHashMap<CalculationId, Series> {
    fn result(&self, id: CalculationId) -> Option<&[f64]> {
        self.get(&id).map(Vec::as_slice)
    }
}

impl CalculationResults for BTreeMap<CalculationId, Series> {
    fn result(&self, id: CalculationId) -> Option<&[f64]> {
        self.get(&id).map(Vec::as_slice)
    }
}

/// Context for formula evaluation
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    timeline: &'a Timeline,
    references: &'a ReferenceMap,
    results: Option<&'a dyn CalculationResults>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context with no calculation results; `R` keys then resolve
    /// only through the reference map
    pub fn new(timeline: &'a Timeline, references: &'a ReferenceMap) -> Self {
        Self {
            timeline,
            references,
            results: None,
        }
    }

    /// Attach the results `R` references are read from
    pub fn with_results(mut self, results: &'a dyn CalculationResults) -> Self {
        self.results = Some(results);
        self
    }

    pub fn timeline(&self) -> &'a Timeline {
        self.timeline
    }

    pub fn references(&self) -> &'a ReferenceMap {
        self.references
    }

    /// Number of periods every series must have
    pub fn periods(&self) -> usize {
        self.timeline.len()
    }

    /// Look up the series bound to `key`
    ///
    /// Calculation keys are read from the attached results first. Time
    /// constants the map does not bind are derived from the timeline.
    pub fn resolve(&self, key: &ReferenceKey) -> FormulaResult<Series> {
        let found = match (key.calculation_id(), self.results) {
            (Some(id), Some(results)) => results.result(CalculationId(id)),
            _ => None,
        }
        .or_else(|| self.references.get(key));

        let values = match found {
            Some(values) => values.to_vec(),
            None => match (key.kind(), key.name()) {
                (ReferenceKind::TimeConstant, Some(name)) => self
                    .timeline
                    .time_constant(name)
                    .ok_or_else(|| FormulaError::UnknownReference(key.to_string()))?,
                _ => return Err(FormulaError::UnknownReference(key.to_string())),
            },
        };

        self.check_length(&key.to_string(), values)
    }

    fn check_length(&self, what: &str, values: Series) -> FormulaResult<Series> {
        if values.len() == self.periods() {
            Ok(values)
        } else {
            Err(FormulaError::Runtime(format!(
                "{} has {} periods, expected {}",
                what,
                values.len(),
                self.periods()
            )))
        }
    }
}

/// Evaluate a formula expression to one value per period
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<Series> {
    match expr {
        FormulaExpr::Number(n) => Ok(vec![*n; ctx.periods()]),

        FormulaExpr::Reference(key) => ctx.resolve(key),

        FormulaExpr::BinaryOp { op, left, right } => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            Ok(left
                .iter()
                .zip(&right)
                .map(|(&l, &r)| apply_binary_op(*op, l, r))
                .collect())
        }

        FormulaExpr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => Ok(evaluate(operand, ctx)?.into_iter().map(|v| -v).collect()),

        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),
    }
}

/// Apply a binary operator to one period's operands
///
/// Division by zero yields `0`; comparisons yield `1` or `0`.
pub fn apply_binary_op(op: BinaryOperator, l: f64, r: f64) -> f64 {
    let truth = |b: bool| if b { 1.0 } else { 0.0 };
    match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => {
            if r == 0.0 {
                0.0
            } else {
                l / r
            }
        }
        BinaryOperator::Power => l.powf(r),
        BinaryOperator::Equal => truth(l == r),
        BinaryOperator::LessThan => truth(l < r),
        BinaryOperator::LessEqual => truth(l <= r),
        BinaryOperator::GreaterThan => truth(l > r),
        BinaryOperator::GreaterEqual => truth(l >= r),
    }
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<Series> {
    let func = registry()
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    func.check_arity(args.len())?;

    // Evaluate arguments
    let mut evaluated_args = Vec::with_capacity(args.len());
    for arg in args {
        evaluated_args.push(evaluate(arg, ctx)?);
    }

    let result = match func.implementation {
        FunctionImpl::Elementwise(f) => {
            let mut period_args = vec![0.0; evaluated_args.len()];
            (0..ctx.periods())
                .map(|i| {
                    for (slot, arg) in period_args.iter_mut().zip(&evaluated_args) {
                        *slot = arg[i];
                    }
                    f(&period_args)
                })
                .collect()
        }
        FunctionImpl::Temporal(f) => f(&evaluated_args, ctx)?,
    };

    ctx.check_length(func.name, result)
}

/// Outcome of evaluating a formula string; never a failure
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// One value per period; all zeros when `error` is set
    pub values: Series,
    pub error: Option<FormulaError>,
}

impl Evaluation {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn failed(periods: usize, error: FormulaError) -> Self {
        Self {
            values: vec![0.0; periods],
            error: Some(error),
        }
    }
}

/// Whether a formula string is "no formula"
pub fn is_blank_formula(formula: &str) -> bool {
    let formula = formula.trim();
    formula.strip_prefix('=').unwrap_or(formula).trim().is_empty()
}

/// Parse and evaluate `formula`
///
/// An empty formula evaluates to zeros without error. Parse and evaluation
/// failures come back as zeros plus the error.
///
/// # Example
/// ```rust
/// use flowcast_core::{ReferenceMap, Timeline};
/// use flowcast_formula::{evaluate_formula, EvaluationContext};
///
/// let timeline = Timeline::monthly(2025, 1, 3).unwrap();
/// let mut refs = ReferenceMap::for_timeline(&timeline);
/// refs.insert_str("V1", vec![1.0, 2.0, 3.0]).unwrap();
///
/// let ctx = EvaluationContext::new(&timeline, &refs);
/// assert_eq!(evaluate_formula("CUMSUM(V1)", &ctx).values, vec![1.0, 3.0, 6.0]);
/// assert!(evaluate_formula("V1 / V9", &ctx).error.is_some());
/// ```
pub fn evaluate_formula(formula: &str, ctx: &EvaluationContext) -> Evaluation {
    if is_blank_formula(formula) {
        return Evaluation {
            values: vec![0.0; ctx.periods()],
            error: None,
        };
    }

    match parse_formula(formula).and_then(|expr| evaluate(&expr, ctx)) {
        Ok(values) => Evaluation {
            values,
            error: None,
        },
        Err(error) => {
            tracing::trace!(formula, %error, "formula evaluation failed");
            Evaluation::failed(ctx.periods(), error)
        }
    }
}
