//! Seams to the collaborators the engine does not implement: a formula
//! parser and a function interpreter.

use gridflow_common::{AbsoluteCellRange, Ast, CellValue, Dependency, SimpleCellAddress};
use smallvec::SmallVec;
use thiserror::Error;

use crate::engine::SheetRegistry;

/* ───────────────────────────── Parsing ───────────────────────────── */

/// A parsed formula together with what it reads, resolved at its position.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFormula {
    pub ast: Ast,
    pub dependencies: SmallVec<[Dependency; 4]>,
}

impl ParsedFormula {
    pub fn new(ast: Ast, base: SimpleCellAddress) -> Self {
        let dependencies = ast.dependencies(base);
        Self { ast, dependencies }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("parse error at {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

pub trait Parser {
    /// Parse `formula` (without the leading `=`) written at `base`. Sheet
    /// names are resolved through `sheets`.
    fn parse(
        &self,
        formula: &str,
        base: SimpleCellAddress,
        sheets: &SheetRegistry,
    ) -> Result<ParsedFormula, ParseError>;
}

/* ─────────────────────────── Evaluation ──────────────────────────── */

/// Read access to computed values, handed to the interpreter.
pub trait EvaluationContext {
    fn cell_value(&self, address: SimpleCellAddress) -> CellValue;

    /// Row-major values of `range`. Whole-column/row ranges are clipped to
    /// the cells in use.
    fn range_values(&self, range: &AbsoluteCellRange) -> Vec<Vec<CellValue>>;

    /// Aggregate a previous evaluation stored for exactly this range.
    fn cached_range_value(&self, _range: &AbsoluteCellRange, _function: &str) -> Option<CellValue> {
        None
    }

    fn store_range_value(&mut self, _range: &AbsoluteCellRange, _function: &str, _value: CellValue) {}
}

pub trait Interpreter {
    fn evaluate(
        &self,
        ast: &Ast,
        address: SimpleCellAddress,
        ctx: &mut dyn EvaluationContext,
    ) -> CellValue;
}
