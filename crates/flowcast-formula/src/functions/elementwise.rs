//! Elementwise functions
//!
//! Each implementation receives the arguments' values at a single period.

/// MIN function
pub fn fn_min(args: &[f64]) -> f64 {
    args.iter().copied().fold(f64::INFINITY, f64::min)
}

/// MAX function
pub fn fn_max(args: &[f64]) -> f64 {
    args.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// ABS function
pub fn fn_abs(args: &[f64]) -> f64 {
    args.first().copied().unwrap_or(0.0).abs()
}
