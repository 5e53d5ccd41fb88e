//! Aggregation of monthly results into display periods
//!
//! This is the single place where calculation types are interpreted; every
//! view that shows or totals a time series goes through it.

use crate::calculation::CalculationType;
use crate::timeline::PeriodGroup;

/// One aggregated display period
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedPeriod {
    pub label: String,
    pub value: f64,
}

/// Aggregated values for a whole series
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub periods: Vec<AggregatedPeriod>,
    pub total: f64,
}

impl Aggregation {
    /// Aggregated values without labels
    pub fn values(&self) -> Vec<f64> {
        self.periods.iter().map(|p| p.value).collect()
    }
}

/// Aggregate the months at `indices` according to `calc_type`
///
/// Indices past the end of `values` read as `0`.
pub fn aggregate_period(values: &[f64], indices: &[usize], calc_type: CalculationType) -> f64 {
    let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
    match calc_type {
        CalculationType::Flow => indices.iter().map(|&i| at(i)).sum(),
        CalculationType::Stock => indices.last().map_or(0.0, |&i| at(i)),
        CalculationType::StockStart => indices.first().map_or(0.0, |&i| at(i)),
    }
}

/// Total of already-aggregated period values
///
/// Flows sum; stocks take the last period; opening stocks take the first.
pub fn calculate_total(period_values: &[f64], calc_type: CalculationType) -> f64 {
    match calc_type {
        CalculationType::Flow => period_values.iter().sum(),
        CalculationType::Stock => period_values.last().copied().unwrap_or(0.0),
        CalculationType::StockStart => period_values.first().copied().unwrap_or(0.0),
    }
}

/// Aggregate a monthly series into `groups` and a total
///
/// # Examples
/// ```
/// use flowcast_core::{aggregate, CalculationType, PeriodGroup};
///
/// let groups = vec![
///     PeriodGroup::new("H1", vec![0, 1]),
///     PeriodGroup::new("H2", vec![2, 3]),
/// ];
/// let values = [1.0, 2.0, 3.0, 4.0];
///
/// assert_eq!(aggregate(&values, &groups, CalculationType::Flow).total, 10.0);
/// assert_eq!(aggregate(&values, &groups, CalculationType::Stock).values(), vec![2.0, 4.0]);
/// assert_eq!(aggregate(&values, &groups, CalculationType::StockStart).total, 1.0);
/// ```
pub fn aggregate(values: &[f64], groups: &[PeriodGroup], calc_type: CalculationType) -> Aggregation {
    let periods: Vec<AggregatedPeriod> = groups
        .iter()
        .map(|group| AggregatedPeriod {
            label: group.label.clone(),
            value: aggregate_period(values, &group.indices, calc_type),
        })
        .collect();
    let period_values: Vec<f64> = periods.iter().map(|p| p.value).collect();
    let total = calculate_total(&period_values, calc_type);

    Aggregation { periods, total }
}
