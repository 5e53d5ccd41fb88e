//! Built-in formula functions
//!
//! Two families exist. Elementwise functions (`MIN`, `MAX`, `ABS`) see one
//! period at a time. Temporal functions (`CUMSUM`, `SHIFT`, ...) need the
//! whole argument array and are evaluated once per calculation.

pub mod elementwise;
pub mod temporal;

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvaluationContext, Series};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The shared registry of built-in functions
pub fn registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Function implementation
#[derive(Clone, Copy)]
pub enum FunctionImpl {
    /// Applied independently at each period to the arguments' values there
    Elementwise(fn(&[f64]) -> f64),
    /// Consumes whole argument arrays
    Temporal(fn(&[Series], &EvaluationContext) -> FormulaResult<Series>),
}

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Whether the function needs whole arrays rather than single periods
    pub fn is_temporal(&self) -> bool {
        matches!(self.implementation, FunctionImpl::Temporal(_))
    }

    /// Check an argument count against this function's bounds
    pub fn check_arity(&self, actual: usize) -> FormulaResult<()> {
        if actual < self.min_args {
            return Err(FormulaError::ArgumentCount {
                function: self.name.to_string(),
                expected: format!("at least {}", self.min_args),
                actual,
            });
        }

        if let Some(max) = self.max_args {
            if actual > max {
                return Err(FormulaError::ArgumentCount {
                    function: self.name.to_string(),
                    expected: format!("at most {}", max),
                    actual,
                });
            }
        }

        Ok(())
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionDef>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_elementwise_functions();
        registry.register_temporal_functions();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Names of all registered functions, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.functions.values().map(|def| def.name).collect();
        names.sort_unstable();
        names
    }

    fn register_elementwise_functions(&mut self) {
        self.register(FunctionDef {
            name: "MIN",
            min_args: 1,
            max_args: None,
            implementation: FunctionImpl::Elementwise(elementwise::fn_min),
        });

        self.register(FunctionDef {
            name: "MAX",
            min_args: 1,
            max_args: None,
            implementation: FunctionImpl::Elementwise(elementwise::fn_max),
        });

        self.register(FunctionDef {
            name: "ABS",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Elementwise(elementwise::fn_abs),
        });
    }

    fn register_temporal_functions(&mut self) {
        let unary: [(&'static str, fn(&[Series], &EvaluationContext) -> FormulaResult<Series>); 7] = [
            ("CUMSUM", temporal::fn_cumsum),
            ("CUMPROD", temporal::fn_cumprod),
            ("CUMSUM_Y", temporal::fn_cumsum_y),
            ("CUMPROD_Y", temporal::fn_cumprod_y),
            ("PREVSUM", temporal::fn_prevsum),
            ("PREVVAL", temporal::fn_prevval),
            ("COUNT", temporal::fn_count),
        ];
        for (name, implementation) in unary {
            self.register(FunctionDef {
                name,
                min_args: 1,
                max_args: Some(1),
                implementation: FunctionImpl::Temporal(implementation),
            });
        }

        self.register(FunctionDef {
            name: "SHIFT",
            min_args: 2,
            max_args: Some(2),
            implementation: FunctionImpl::Temporal(temporal::fn_shift),
        });
    }
}
