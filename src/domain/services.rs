//! Formula evaluation services for the spreadsheet engine.
//!
//! Wraps the expression parser into the cell-level contract: a raw cell
//! input either evaluates to a number, falls back to literal display, or
//! yields the error sentinel. Evaluation is pure and reads only the
//! already-computed display values of referenced cells; keeping those
//! current is the recalculator's job (see [`crate::domain::recalc`]).

use super::errors::DomainResult;
use super::models::Spreadsheet;
use super::parser::{ExpressionEvaluator, FunctionRegistry, Parser};

/// Display text for a formula that cannot be evaluated safely.
pub const ERROR_SENTINEL: &str = "#ERROR";

/// Display text for a formula caught in a reference cycle.
pub const CYCLE_SENTINEL: &str = "#CYCLE";

/// Outcome of evaluating a raw cell input.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// The input evaluated to a number.
    Number(f64),
    /// The input is not something the engine evaluates (no leading `=`,
    /// unknown function, bare words). Displayed unchanged; not an error.
    Literal(String),
    /// Malformed arithmetic or division by zero; displayed as `#ERROR`.
    Error,
}

/// A formula evaluation engine that processes spreadsheet expressions.
///
/// The evaluator uses a recursive descent parser restricted to the
/// arithmetic grammar plus `SUM`; see [`crate::domain::parser`] for the
/// grammar and for why no general-purpose evaluator is involved.
///
/// # Examples
///
/// ```
/// use desksheets::domain::{Spreadsheet, FormulaEvaluator, Evaluation};
///
/// let sheet = Spreadsheet::default();
/// let evaluator = FormulaEvaluator::new(&sheet);
///
/// assert_eq!(evaluator.evaluate_formula("=2+3*4"), Evaluation::Number(14.0));
/// assert_eq!(evaluator.evaluate_formula("=1/0"), Evaluation::Error);
/// assert_eq!(
///     evaluator.evaluate_formula("hello"),
///     Evaluation::Literal("hello".to_string())
/// );
/// ```
pub struct FormulaEvaluator<'a> {
    /// Reference to the spreadsheet for cell lookups
    spreadsheet: &'a Spreadsheet,
}

impl<'a> FormulaEvaluator<'a> {
    /// Creates a new formula evaluator for the given spreadsheet.
    pub fn new(spreadsheet: &'a Spreadsheet) -> Self {
        Self { spreadsheet }
    }

    /// Evaluates a raw cell input.
    ///
    /// Inputs without a leading `=` pass through as literals. For
    /// formulas, the text after `=` is parsed and evaluated against the
    /// current display values of the grid. Unrecognized input (stray
    /// characters, bare words, unknown functions, bare ranges) is the
    /// defined literal fallback and returns the original text unchanged;
    /// malformed arithmetic and division by zero report
    /// [`Evaluation::Error`].
    ///
    /// # Examples
    ///
    /// ```
    /// use desksheets::domain::{Spreadsheet, FormulaEvaluator, Evaluation};
    ///
    /// let sheet = Spreadsheet::default();
    /// let evaluator = FormulaEvaluator::new(&sheet);
    ///
    /// assert_eq!(evaluator.evaluate_formula("=2+3"), Evaluation::Number(5.0));
    /// assert_eq!(
    ///     evaluator.evaluate_formula("=FOO(1)"),
    ///     Evaluation::Literal("=FOO(1)".to_string())
    /// );
    /// ```
    pub fn evaluate_formula(&self, formula: &str) -> Evaluation {
        let Some(expr) = formula.strip_prefix('=') else {
            return Evaluation::Literal(formula.to_string());
        };

        match self.parse_and_evaluate(expr.trim()) {
            Ok(result) => Evaluation::Number(result),
            Err(err) if err.is_unrecognized() => Evaluation::Literal(formula.to_string()),
            Err(_) => Evaluation::Error,
        }
    }

    /// Parses and evaluates an expression.
    fn parse_and_evaluate(&self, expr: &str) -> DomainResult<f64> {
        let mut parser = Parser::new(expr)?;
        let ast = parser.parse()?;

        let function_registry = FunctionRegistry::new();
        let evaluator = ExpressionEvaluator::new(self.spreadsheet, &function_registry);
        evaluator.evaluate(&ast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CellAddress, CellData, CellValue};

    fn create_test_spreadsheet() -> Spreadsheet {
        let mut sheet = Spreadsheet::default();
        let values = [
            ((0, 0), "10"),
            ((0, 1), "20"),
            ((0, 2), "30"),
            ((1, 0), "5"),
            ((1, 1), "15"),
            ((1, 2), "25"),
        ];
        for ((row, col), value) in values {
            sheet.set_cell(
                CellAddress::new(row, col),
                CellData {
                    value: CellValue::Text(value.to_string()),
                    formula: None,
                },
            );
        }
        sheet
    }

    fn number(evaluation: Evaluation) -> f64 {
        match evaluation {
            Evaluation::Number(n) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_non_formula_passthrough() {
        let sheet = create_test_spreadsheet();
        let evaluator = FormulaEvaluator::new(&sheet);

        assert_eq!(
            evaluator.evaluate_formula("hello"),
            Evaluation::Literal("hello".to_string())
        );
        assert_eq!(
            evaluator.evaluate_formula("123"),
            Evaluation::Literal("123".to_string())
        );
        assert_eq!(
            evaluator.evaluate_formula(""),
            Evaluation::Literal(String::new())
        );
    }

    #[test]
    fn test_simple_arithmetic() {
        let sheet = create_test_spreadsheet();
        let evaluator = FormulaEvaluator::new(&sheet);

        assert_eq!(number(evaluator.evaluate_formula("=2+3")), 5.0);
        assert_eq!(number(evaluator.evaluate_formula("=10-3")), 7.0);
        assert_eq!(number(evaluator.evaluate_formula("=4*5")), 20.0);
        assert_eq!(number(evaluator.evaluate_formula("=15/3")), 5.0);
        assert_eq!(number(evaluator.evaluate_formula("=2+3*4")), 14.0);
        assert_eq!(number(evaluator.evaluate_formula("=(2+3)*4")), 20.0);
        assert_eq!(number(evaluator.evaluate_formula("=-5+10")), 5.0);
        assert_eq!(number(evaluator.evaluate_formula("=1/3")), 1.0 / 3.0);
    }

    #[test]
    fn test_cell_references() {
        let sheet = create_test_spreadsheet();
        let evaluator = FormulaEvaluator::new(&sheet);

        assert_eq!(number(evaluator.evaluate_formula("=A1")), 10.0);
        assert_eq!(number(evaluator.evaluate_formula("=A1+B1")), 30.0);
        assert_eq!(number(evaluator.evaluate_formula("=C1-A1")), 20.0);
        assert_eq!(number(evaluator.evaluate_formula("=B1/A2")), 4.0);
    }

    #[test]
    fn test_empty_and_non_numeric_references_are_zero() {
        let mut sheet = create_test_spreadsheet();
        sheet.set_cell(
            CellAddress::new(4, 0),
            CellData {
                value: CellValue::Text("words".to_string()),
                formula: None,
            },
        );
        let evaluator = FormulaEvaluator::new(&sheet);

        assert_eq!(number(evaluator.evaluate_formula("=A5+1")), 1.0);
        assert_eq!(number(evaluator.evaluate_formula("=Z99+A1")), 10.0);
    }

    #[test]
    fn test_unrepresentable_references_are_zero() {
        let sheet = create_test_spreadsheet();
        let evaluator = FormulaEvaluator::new(&sheet);

        // Column labels too long for an index coerce to 0 like any other
        // out-of-grid reference, without panicking
        assert_eq!(number(evaluator.evaluate_formula("=AAAAAAAAAAAAAAAA1+1")), 1.0);
        assert_eq!(number(evaluator.evaluate_formula("=A0+A1")), 10.0);
        assert_eq!(
            number(evaluator.evaluate_formula(&format!("=SUM({}1:B2)", "Z".repeat(40)))),
            0.0
        );
    }

    #[test]
    fn test_sum_function() {
        let sheet = create_test_spreadsheet();
        let evaluator = FormulaEvaluator::new(&sheet);

        assert_eq!(number(evaluator.evaluate_formula("=SUM(A1,B1,C1)")), 60.0);
        assert_eq!(number(evaluator.evaluate_formula("=SUM(A1:C1)")), 60.0);
        assert_eq!(number(evaluator.evaluate_formula("=SUM(A1:A2)")), 15.0);
        assert_eq!(number(evaluator.evaluate_formula("=SUM(5,10,15)")), 30.0);
        assert_eq!(number(evaluator.evaluate_formula("=sum(A1,B1)")), 30.0);
        // Reversed corners cover the same rectangle
        assert_eq!(number(evaluator.evaluate_formula("=SUM(C1:A1)")), 60.0);
    }

    #[test]
    fn test_error_cases() {
        let sheet = create_test_spreadsheet();
        let evaluator = FormulaEvaluator::new(&sheet);

        assert_eq!(evaluator.evaluate_formula("=1/0"), Evaluation::Error);
        assert_eq!(evaluator.evaluate_formula("=2+"), Evaluation::Error);
        assert_eq!(evaluator.evaluate_formula("=(2+3"), Evaluation::Error);
        assert_eq!(evaluator.evaluate_formula("=1.5.2"), Evaluation::Error);
    }

    #[test]
    fn test_unrecognized_formula_falls_back_to_literal() {
        let sheet = create_test_spreadsheet();
        let evaluator = FormulaEvaluator::new(&sheet);

        assert_eq!(
            evaluator.evaluate_formula("=FOO(1)"),
            Evaluation::Literal("=FOO(1)".to_string())
        );
        assert_eq!(
            evaluator.evaluate_formula("=hello world"),
            Evaluation::Literal("=hello world".to_string())
        );
        assert_eq!(
            evaluator.evaluate_formula("=A1:A5"),
            Evaluation::Literal("=A1:A5".to_string())
        );
        assert_eq!(
            evaluator.evaluate_formula("=50%"),
            Evaluation::Literal("=50%".to_string())
        );
    }

    #[test]
    fn test_whitespace_handling() {
        let sheet = create_test_spreadsheet();
        let evaluator = FormulaEvaluator::new(&sheet);

        assert_eq!(number(evaluator.evaluate_formula("= 2 + 3 ")), 5.0);
        assert_eq!(number(evaluator.evaluate_formula("=SUM( A1 , B1 )")), 30.0);
        assert_eq!(number(evaluator.evaluate_formula("= A1 * 2 ")), 20.0);
    }

    #[test]
    fn test_formula_reads_computed_display_values() {
        let mut sheet = create_test_spreadsheet();
        // A formula cell is read through its display value, not re-derived
        sheet.set_cell(
            CellAddress::new(9, 0),
            CellData {
                value: CellValue::Number(40.0),
                formula: Some("=A1*4".to_string()),
            },
        );
        let evaluator = FormulaEvaluator::new(&sheet);

        assert_eq!(number(evaluator.evaluate_formula("=A10+2")), 42.0);
    }
}
