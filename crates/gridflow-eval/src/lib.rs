//! Incremental spreadsheet evaluation over a dependency graph.
//!
//! The [`engine::Engine`] owns the graph of cells and ranges, recomputes the
//! transitive dependents of every edit, and rewrites formula references under
//! row, column, move and sheet edits. Formula syntax and function semantics
//! come from outside through the [`traits::Parser`] and
//! [`traits::Interpreter`] seams.

pub mod engine;
pub mod error;
pub mod traits;

pub use engine::{Engine, EvalConfig, EvalResult};
pub use error::EngineError;
pub use traits::{EvaluationContext, Interpreter, ParseError, ParsedFormula, Parser};

pub use gridflow_common::{
    AbsoluteCellRange, Ast, CellError, CellValue, ErrorType, SheetId, SimpleCellAddress,
};

#[cfg(test)]
pub mod test_utils;
