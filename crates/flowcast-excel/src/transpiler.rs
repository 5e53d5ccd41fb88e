//! Formula → spreadsheet formula transpiler
//!
//! Rewrites a formula for a single period column of a frozen [`SheetLayout`].
//! References become row-absolute, column-relative cells (`G$10`); temporal
//! functions become running ranges anchored at the first data column
//! (`SUM($E$10:G$10)`), so the emitted formula recomputes to the evaluator's
//! value for that column.

use crate::error::{ExcelError, ExcelResult};
use crate::probe::looks_like_formula;
use flowcast_core::{column_to_letters, ReferenceKey, SheetLayout, FIRST_DATA_COLUMN, MAX_COLUMN};
use flowcast_formula::{
    is_blank_formula, parse_formula, BinaryOperator, FormulaExpr, UnaryOperator,
};

/// Outcome of converting one formula for one column
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// Spreadsheet formula, or `None` when the cell must hold a static value
    pub formula: Option<String>,
    /// Why there is no formula
    pub error: Option<ExcelError>,
}

impl Conversion {
    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }
}

impl From<ExcelResult<String>> for Conversion {
    fn from(result: ExcelResult<String>) -> Self {
        match result {
            Ok(formula) => Conversion {
                formula: Some(formula),
                error: None,
            },
            Err(error) => Conversion {
                formula: None,
                error: Some(error),
            },
        }
    }
}

/// Convert `formula` for period `period_index` of a row on `home_sheet`
///
/// A `None` formula means the caller must write a static value instead.
///
/// # Example
/// ```rust
/// use flowcast_core::{ReferenceKey, SheetLayout};
/// use flowcast_excel::convert;
///
/// let mut layout = SheetLayout::new();
/// layout.insert(ReferenceKey::parse("R4").unwrap(), "Calcs", 10);
///
/// let conversion = convert("CUMSUM(R4)", &layout, 2, "Calcs");
/// assert_eq!(conversion.formula.as_deref(), Some("=SUM($E$10:G$10)"));
/// assert!(convert("CUMSUM_Y(R4)", &layout, 2, "Calcs").formula.is_none());
/// ```
pub fn convert(
    formula: &str,
    layout: &SheetLayout,
    period_index: usize,
    home_sheet: &str,
) -> Conversion {
    transpile(formula, layout, period_index, home_sheet).into()
}

/// Like [`convert`], but reporting why conversion failed
pub fn transpile(
    formula: &str,
    layout: &SheetLayout,
    period_index: usize,
    home_sheet: &str,
) -> ExcelResult<String> {
    if is_blank_formula(formula) {
        return Ok("=0".to_string());
    }
    if !looks_like_formula(formula) {
        return Err(ExcelError::DescriptiveText(formula.trim().to_string()));
    }

    let expr = parse_formula(formula)?;
    let column = period_index as i64;
    let transpiler = Transpiler {
        target: Target::Layout { layout, home_sheet },
        home_column: column,
    };
    let fragment = transpiler.emit(&expr, column)?;

    Ok(format!("={}", fragment.text))
}

/// Check that `expr` converts at every column, without a layout
pub(crate) fn check_expression(expr: &FormulaExpr) -> ExcelResult<()> {
    // Far enough right that no realistic SHIFT collapses to a literal 0
    let column = 1 << 20;
    let transpiler = Transpiler {
        target: Target::Symbolic,
        home_column: column,
    };
    transpiler.emit(expr, column).map(|_| ())
}

// Binding strengths of emitted text
const ADDITIVE: u8 = 2;
const MULTIPLICATIVE: u8 = 3;
const POWER: u8 = 4;
const NEGATION: u8 = 5;
const ATOM: u8 = 10;

/// Emitted formula text with the binding strength of its outermost operator
struct Fragment {
    text: String,
    precedence: u8,
}

impl Fragment {
    fn atom(text: String) -> Self {
        Self {
            text,
            precedence: ATOM,
        }
    }

    fn new(text: String, precedence: u8) -> Self {
        Self { text, precedence }
    }

    /// The text, parenthesised if it binds looser than `min`
    fn at_least(self, min: u8) -> String {
        if self.precedence < min {
            format!("({})", self.text)
        } else {
            self.text
        }
    }
}

enum Target<'a> {
    Layout {
        layout: &'a SheetLayout,
        home_sheet: &'a str,
    },
    /// Render keys by name; used to check convertibility
    Symbolic,
}

struct Transpiler<'a> {
    target: Target<'a>,
    /// Period index of the cell being written
    home_column: i64,
}

impl Transpiler<'_> {
    /// Emit `expr` as evaluated at period `column`
    fn emit(&self, expr: &FormulaExpr, column: i64) -> ExcelResult<Fragment> {
        match expr {
            FormulaExpr::Number(n) => number(*n),

            FormulaExpr::Reference(key) => Ok(Fragment::atom(self.cell(key, column)?)),

            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } => {
                let operand = self.emit(operand, column)?;
                Ok(Fragment::new(
                    format!("-{}", operand.at_least(NEGATION)),
                    NEGATION,
                ))
            }

            FormulaExpr::BinaryOp { op, left, right } => {
                let left = self.emit(left, column)?;
                let right = self.emit(right, column)?;
                Ok(binary(*op, left, right))
            }

            FormulaExpr::Function { name, args } => self.emit_function(name, args, column),
        }
    }

    fn emit_function(
        &self,
        name: &str,
        args: &[FormulaExpr],
        column: i64,
    ) -> ExcelResult<Fragment> {
        match name {
            "MIN" | "MAX" | "ABS" => {
                let args = args
                    .iter()
                    .map(|arg| self.emit(arg, column).map(|f| f.text))
                    .collect::<ExcelResult<Vec<_>>>()?;
                Ok(Fragment::atom(format!("{}({})", name, args.join(","))))
            }
            "CUMSUM" => self.cumsum(first_arg(name, args)?, column),
            "CUMPROD" => {
                let key = first_arg(name, args)?.as_reference().ok_or_else(|| {
                    ExcelError::unconvertible(name, "argument must be a single reference")
                })?;
                Ok(Fragment::atom(format!("PRODUCT({})", self.range(key, column)?)))
            }
            "CUMSUM_Y" | "CUMPROD_Y" => Err(ExcelError::unconvertible(
                name,
                "year-boundary resets have no closed form",
            )),
            "SHIFT" => {
                let offset = args
                    .get(1)
                    .and_then(FormulaExpr::as_number)
                    .filter(|n| n.fract() == 0.0)
                    .ok_or_else(|| {
                        ExcelError::unconvertible(name, "offset must be a whole-number literal")
                    })?;
                self.shifted(first_arg(name, args)?, column, offset as i64)
            }
            "PREVVAL" => self.shifted(first_arg(name, args)?, column, 1),
            "PREVSUM" => {
                let arg = first_arg(name, args)?;
                if column == 0 {
                    number(0.0)
                } else {
                    self.cumsum(arg, column - 1)
                }
            }
            "COUNT" => {
                let key = first_arg(name, args)?.as_reference().ok_or_else(|| {
                    ExcelError::unconvertible(name, "argument must be a single reference")
                })?;
                Ok(Fragment::atom(format!(
                    "COUNTIF({},\"<>0\")",
                    self.range(key, column)?
                )))
            }
            _ => Err(ExcelError::unconvertible(name, "unknown function")),
        }
    }

    fn cumsum(&self, arg: &FormulaExpr, column: i64) -> ExcelResult<Fragment> {
        if let Some(key) = arg.as_reference() {
            return Ok(Fragment::atom(format!("SUM({})", self.range(key, column)?)));
        }

        if let Some(k) = arg.as_number() {
            // Periods elapsed through `column`, counted from the cell's own column
            let offset = self.first_column() - 1 + (self.home_column - column);
            let count = format!("(COLUMN()-{})", offset);
            return Ok(if k == 1.0 {
                Fragment::atom(count)
            } else {
                Fragment::new(format!("{}*{}", number(k)?.text, count), MULTIPLICATIVE)
            });
        }

        if let FormulaExpr::BinaryOp { op, left, right } = arg {
            if let (Some(a), Some(b)) = (left.as_reference(), right.as_reference()) {
                match op {
                    BinaryOperator::Multiply => {
                        return Ok(Fragment::atom(format!(
                            "SUMPRODUCT({},{})",
                            self.range(a, column)?,
                            self.range(b, column)?
                        )));
                    }
                    BinaryOperator::Add => {
                        return Ok(Fragment::new(
                            format!(
                                "SUM({})+SUM({})",
                                self.range(a, column)?,
                                self.range(b, column)?
                            ),
                            ADDITIVE,
                        ));
                    }
                    _ => {}
                }
            }
        }

        Err(ExcelError::unconvertible(
            "CUMSUM",
            "argument must be a reference, a number, or a product or sum of two references",
        ))
    }

    /// `expr` as evaluated `offset` periods before `column`
    fn shifted(&self, expr: &FormulaExpr, column: i64, offset: i64) -> ExcelResult<Fragment> {
        let target = column.saturating_sub(offset);
        if target < 0 {
            return number(0.0);
        }
        if let Target::Layout { layout, .. } = self.target {
            let sheet_column = (layout.first_data_column() as i64).saturating_add(target);
            if sheet_column > MAX_COLUMN as i64 {
                return Err(ExcelError::unconvertible(
                    "SHIFT",
                    "offset reaches past the last spreadsheet column",
                ));
            }
        }
        self.emit(expr, target)
    }

    fn first_column(&self) -> i64 {
        match self.target {
            Target::Layout { layout, .. } => layout.first_data_column() as i64,
            Target::Symbolic => FIRST_DATA_COLUMN as i64,
        }
    }

    fn column_letters(&self, layout: &SheetLayout, column: i64) -> String {
        column_to_letters(layout.period_column(column as usize))
    }

    /// Single cell of `key` at `column`, e.g. `G$10`
    fn cell(&self, key: &ReferenceKey, column: i64) -> ExcelResult<String> {
        match self.target {
            Target::Symbolic => Ok(key.to_string()),
            Target::Layout { layout, home_sheet } => {
                let location = layout
                    .get(key)
                    .ok_or_else(|| ExcelError::MissingLayout(key.to_string()))?;
                Ok(format!(
                    "{}{}${}",
                    sheet_qualifier(&location.sheet, home_sheet),
                    self.column_letters(layout, column),
                    location.row
                ))
            }
        }
    }

    /// Running range of `key` from the first period through `column`,
    /// e.g. `$E$10:G$10`
    fn range(&self, key: &ReferenceKey, column: i64) -> ExcelResult<String> {
        match self.target {
            Target::Symbolic => Ok(key.to_string()),
            Target::Layout { layout, home_sheet } => {
                let location = layout
                    .get(key)
                    .ok_or_else(|| ExcelError::MissingLayout(key.to_string()))?;
                Ok(format!(
                    "{}${}${}:{}${}",
                    sheet_qualifier(&location.sheet, home_sheet),
                    self.column_letters(layout, 0),
                    location.row,
                    self.column_letters(layout, column),
                    location.row
                ))
            }
        }
    }
}

fn first_arg<'e>(name: &str, args: &'e [FormulaExpr]) -> ExcelResult<&'e FormulaExpr> {
    args.first()
        .ok_or_else(|| ExcelError::unconvertible(name, "missing argument"))
}

fn binary(op: BinaryOperator, left: Fragment, right: Fragment) -> Fragment {
    let comparison = match op {
        BinaryOperator::Equal => Some("="),
        BinaryOperator::LessThan => Some("<"),
        BinaryOperator::LessEqual => Some("<="),
        BinaryOperator::GreaterThan => Some(">"),
        BinaryOperator::GreaterEqual => Some(">="),
        _ => None,
    };
    if let Some(symbol) = comparison {
        // `*1` keeps the cell numeric
        return Fragment::new(
            format!(
                "({}{}{})*1",
                left.at_least(ADDITIVE),
                symbol,
                right.at_least(ADDITIVE)
            ),
            MULTIPLICATIVE,
        );
    }

    match op {
        BinaryOperator::Divide => Fragment::atom(format!(
            "IFERROR({}/{},0)",
            left.at_least(MULTIPLICATIVE),
            right.at_least(POWER)
        )),
        BinaryOperator::Power => Fragment::new(
            format!("{}^{}", left.at_least(NEGATION), right.at_least(NEGATION)),
            POWER,
        ),
        BinaryOperator::Multiply => Fragment::new(
            format!(
                "{}*{}",
                left.at_least(MULTIPLICATIVE),
                right.at_least(POWER)
            ),
            MULTIPLICATIVE,
        ),
        BinaryOperator::Subtract => Fragment::new(
            format!("{}-{}", left.at_least(ADDITIVE), right.at_least(MULTIPLICATIVE)),
            ADDITIVE,
        ),
        _ => Fragment::new(
            format!("{}+{}", left.at_least(ADDITIVE), right.at_least(MULTIPLICATIVE)),
            ADDITIVE,
        ),
    }
}

fn number(n: f64) -> ExcelResult<Fragment> {
    if !n.is_finite() {
        return Err(ExcelError::unconvertible(
            "number",
            "literal is outside the spreadsheet's numeric range",
        ));
    }
    let text = if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    };
    let precedence = if n < 0.0 { NEGATION } else { ATOM };
    Ok(Fragment::new(text, precedence))
}

fn sheet_qualifier(sheet: &str, home_sheet: &str) -> String {
    if sheet == home_sheet {
        String::new()
    } else {
        format!("'{}'!", sheet.replace('\'', "''"))
    }
}
