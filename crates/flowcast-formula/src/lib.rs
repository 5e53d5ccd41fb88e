//! # flowcast-formula
//!
//! Formula parser, evaluator and dependency resolver for flowcast.
//!
//! This crate provides:
//! - Formula parsing (text → AST)
//! - Whole-timeline evaluation (AST → one value per period)
//! - Elementwise and temporal built-in functions
//! - Reference extraction and calculation dependency ordering
//!
//! ## Example
//!
//! ```rust
//! use flowcast_core::{ReferenceMap, Timeline};
//! use flowcast_formula::{evaluate, parse_formula, EvaluationContext};
//!
//! let timeline = Timeline::monthly(2025, 1, 3).unwrap();
//! let mut refs = ReferenceMap::for_timeline(&timeline);
//! refs.insert_str("V1", vec![10.0, 20.0, 30.0]).unwrap();
//!
//! let ast = parse_formula("PREVVAL(V1) / 2").unwrap();
//! let ctx = EvaluationContext::new(&timeline, &refs);
//! assert_eq!(evaluate(&ast, &ctx).unwrap(), vec![0.0, 5.0, 10.0]);
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod references;

pub use ast::{BinaryOperator, FormulaExpr, UnaryOperator};
pub use dependency::{DependencyGraph, EvaluationOrder};
pub use error::{ErrorKind, FormulaError, FormulaResult};
pub use evaluator::{
    apply_binary_op, evaluate, evaluate_formula, is_blank_formula, CalculationResults,
    Evaluation, EvaluationContext, Series,
};
pub use functions::{registry, FunctionDef, FunctionImpl, FunctionRegistry};
pub use parser::parse_formula;
pub use references::{calculation_dependencies, references_of, scan_references};
