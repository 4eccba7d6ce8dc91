//! Common test helpers
use gridflow_common::{Ast, CellValue};

use crate::engine::{Engine, EvalConfig};
use crate::test_utils::{TestInterpreter, TestParser, cell};
use crate::traits::Parser;

pub type TestEngine = Engine<TestInterpreter>;

/// An engine with a single sheet named `Sheet1` (id 0).
pub fn engine() -> TestEngine {
    engine_with(EvalConfig::default())
}

pub fn engine_with(config: EvalConfig) -> TestEngine {
    let mut engine = Engine::new(TestInterpreter::new(), config).unwrap();
    engine.add_sheet("Sheet1").unwrap();
    engine
}

pub fn iterative(max_iterations: u32) -> EvalConfig {
    EvalConfig::default()
        .with_iterative_calculation(true)
        .with_max_iterations(max_iterations)
}

/// Enter raw text into a cell of `Sheet1`, the way a user would type it.
pub fn set(engine: &mut TestEngine, label: &str, text: &str) {
    engine
        .set_cell_contents(&TestParser, cell(label), text)
        .unwrap();
}

pub fn value(engine: &TestEngine, label: &str) -> CellValue {
    engine.get_cell_value(cell(label))
}

pub fn num(engine: &TestEngine, label: &str) -> f64 {
    match value(engine, label) {
        CellValue::Number(n) => n,
        other => panic!("{label} is not a number: {other:?}"),
    }
}

/// The tree `formula` parses to when written at `label`.
pub fn parse_at(engine: &TestEngine, formula: &str, label: &str) -> Ast {
    TestParser
        .parse(formula, cell(label), engine.sheets())
        .unwrap()
        .ast
}
