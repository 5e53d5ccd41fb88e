//! Formula Abstract Syntax Tree types

use flowcast_core::ReferenceKey;

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    /// Numeric literal
    Number(f64),

    /// Typed reference to a time series (`V1`, `C1.10`, `R17`, ...)
    Reference(ReferenceKey),

    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },

    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    /// Function call; `name` is uppercase
    Function { name: String, args: Vec<FormulaExpr> },
}

impl FormulaExpr {
    /// The reference key if this is a bare reference
    pub fn as_reference(&self) -> Option<&ReferenceKey> {
        match self {
            FormulaExpr::Reference(key) => Some(key),
            _ => None,
        }
    }

    /// The value if this is a numeric literal, including a negated one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaExpr::Number(n) => Some(*n),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } => operand.as_number().map(|n| -n),
            _ => None,
        }
    }

    /// Every reference in the expression, in source order (duplicates kept)
    pub fn references(&self) -> Vec<&ReferenceKey> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a ReferenceKey>) {
        match self {
            FormulaExpr::Reference(key) => refs.push(key),
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.collect_references(refs);
                right.collect_references(refs);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.collect_references(refs),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(refs);
                }
            }
            FormulaExpr::Number(_) => {}
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl BinaryOperator {
    /// Binding strength; higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Equal
            | BinaryOperator::LessThan
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterEqual => 1,
            BinaryOperator::Add | BinaryOperator::Subtract => 2,
            BinaryOperator::Multiply | BinaryOperator::Divide => 3,
            BinaryOperator::Power => 4,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 1
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
}
