//! Temporal functions
//!
//! These see the whole argument array. Every result has the same length as
//! its first argument, which the evaluator guarantees is the timeline length.

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvaluationContext, Series};

fn first(args: &[Series]) -> &[f64] {
    args.first().map(Vec::as_slice).unwrap_or(&[])
}

/// Running fold that restarts at the periods where `reset` is true
fn running(values: &[f64], init: f64, op: fn(f64, f64) -> f64, reset: impl Fn(usize) -> bool) -> Series {
    let mut acc = init;
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if reset(i) {
                acc = init;
            }
            acc = op(acc, v);
            acc
        })
        .collect()
}

/// `values[i - offset]`, or `0` when that index falls outside the array
pub fn shift(values: &[f64], offset: i64) -> Series {
    (0..values.len())
        .map(|i| {
            (i as i64)
                .checked_sub(offset)
                .and_then(|source| usize::try_from(source).ok())
                .and_then(|source| values.get(source).copied())
                .unwrap_or(0.0)
        })
        .collect()
}

/// CUMSUM: running sum from the first period through period i
pub fn fn_cumsum(args: &[Series], _ctx: &EvaluationContext) -> FormulaResult<Series> {
    Ok(running(first(args), 0.0, |a, b| a + b, |_| false))
}

/// CUMPROD: running product from the first period through period i
pub fn fn_cumprod(args: &[Series], _ctx: &EvaluationContext) -> FormulaResult<Series> {
    Ok(running(first(args), 1.0, |a, b| a * b, |_| false))
}

/// CUMSUM_Y: running sum that restarts at each year boundary
pub fn fn_cumsum_y(args: &[Series], ctx: &EvaluationContext) -> FormulaResult<Series> {
    let timeline = ctx.timeline();
    Ok(running(first(args), 0.0, |a, b| a + b, |i| {
        timeline.is_year_start(i)
    }))
}

/// CUMPROD_Y: running product that restarts at each year boundary
pub fn fn_cumprod_y(args: &[Series], ctx: &EvaluationContext) -> FormulaResult<Series> {
    let timeline = ctx.timeline();
    Ok(running(first(args), 1.0, |a, b| a * b, |i| {
        timeline.is_year_start(i)
    }))
}

/// SHIFT(expr, n): the value n periods earlier, `0` before the first period
///
/// `n` must be the same whole number in every period.
pub fn fn_shift(args: &[Series], _ctx: &EvaluationContext) -> FormulaResult<Series> {
    let offsets = args.get(1).map(Vec::as_slice).unwrap_or(&[]);
    let offset = match offsets.first() {
        Some(&n) => n,
        None => return Ok(first(args).to_vec()),
    };

    if offset.fract() != 0.0 || offsets.iter().any(|&n| n != offset) {
        return Err(FormulaError::Syntax(
            "SHIFT offset must be a constant whole number".into(),
        ));
    }

    Ok(shift(first(args), offset as i64))
}

/// PREVVAL: the previous period's value, `0` at the first period
pub fn fn_prevval(args: &[Series], _ctx: &EvaluationContext) -> FormulaResult<Series> {
    Ok(shift(first(args), 1))
}

/// PREVSUM: sum of all periods strictly before period i
pub fn fn_prevsum(args: &[Series], _ctx: &EvaluationContext) -> FormulaResult<Series> {
    let cumulative = running(first(args), 0.0, |a, b| a + b, |_| false);
    Ok(shift(&cumulative, 1))
}

/// COUNT: number of non-zero periods from the first period through period i
pub fn fn_count(args: &[Series], _ctx: &EvaluationContext) -> FormulaResult<Series> {
    Ok(running(
        first(args),
        0.0,
        |acc, v| if v != 0.0 { acc + 1.0 } else { acc },
        |_| false,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcast_core::{ReferenceMap, Timeline};

    fn call(
        f: fn(&[Series], &EvaluationContext) -> FormulaResult<Series>,
        args: &[Series],
        timeline: &Timeline,
    ) -> Series {
        let refs = ReferenceMap::new(timeline.len());
        let ctx = EvaluationContext::new(timeline, &refs);
        f(args, &ctx).unwrap()
    }

    #[test]
    fn test_cumulative() {
        let timeline = Timeline::monthly(2025, 1, 4).unwrap();
        let x = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(call(fn_cumsum, &[x.clone()], &timeline), vec![1.0, 3.0, 6.0, 10.0]);
        assert_eq!(call(fn_cumprod, &[x.clone()], &timeline), vec![1.0, 2.0, 6.0, 24.0]);
        assert_eq!(call(fn_prevsum, &[x.clone()], &timeline), vec![0.0, 1.0, 3.0, 6.0]);
        assert_eq!(call(fn_prevval, &[x], &timeline), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_year_accumulators_reset() {
        // Nov, Dec, Jan, Feb
        let timeline = Timeline::monthly(2024, 11, 4).unwrap();
        let x = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(call(fn_cumsum_y, &[x], &timeline), vec![1.0, 3.0, 3.0, 7.0]);

        let growth = vec![1.1, 1.1, 2.0, 3.0];
        let result = call(fn_cumprod_y, &[growth], &timeline);
        assert!((result[1] - 1.21).abs() < 1e-12);
        assert_eq!(result[2], 2.0);
        assert_eq!(result[3], 6.0);
    }

    #[test]
    fn test_shift() {
        let timeline = Timeline::monthly(2025, 1, 4).unwrap();
        let x = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(call(fn_shift, &[x.clone(), vec![2.0; 4]], &timeline), vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(call(fn_shift, &[x.clone(), vec![0.0; 4]], &timeline), x);
        assert_eq!(call(fn_shift, &[x.clone(), vec![-1.0; 4]], &timeline), vec![2.0, 3.0, 4.0, 0.0]);
        assert_eq!(call(fn_shift, &[x.clone(), vec![10.0; 4]], &timeline), vec![0.0; 4]);
        assert_eq!(shift(&x, i64::MIN), vec![0.0; 4]);
        assert_eq!(shift(&x, i64::MAX), vec![0.0; 4]);

        let refs = ReferenceMap::new(4);
        let ctx = EvaluationContext::new(&timeline, &refs);
        assert!(fn_shift(&[x.clone(), vec![1.5; 4]], &ctx).is_err());
        assert!(fn_shift(&[x, vec![1.0, 2.0, 1.0, 1.0]], &ctx).is_err());
    }

    #[test]
    fn test_count() {
        let timeline = Timeline::monthly(2025, 1, 5).unwrap();
        let x = vec![0.0, 5.0, 0.0, -1.0, 2.0];
        assert_eq!(call(fn_count, &[x], &timeline), vec![0.0, 1.0, 1.0, 2.0, 3.0]);
    }
}
