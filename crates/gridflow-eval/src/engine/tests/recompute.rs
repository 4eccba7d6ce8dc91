//! Dirty propagation: what gets recomputed after a cell edit, and what the
//! edit leaves behind in the graph.
use gridflow_common::{AbsoluteCellRange, CellValue, Dependency, ErrorType, SimpleCellAddress};

use super::common::*;
use crate::error::EngineError;
use crate::test_utils::{TestParser, cell};

#[test]
fn only_transitive_dependents_are_recomputed() {
    let mut engine = engine();
    set(&mut engine, "A1", "1");
    set(&mut engine, "B1", "=A1+1");
    set(&mut engine, "C1", "=B1*2");
    set(&mut engine, "D1", "5");
    set(&mut engine, "E1", "=D1");
    assert_eq!(num(&engine, "C1"), 4.0);

    engine.interpreter().reset();
    set(&mut engine, "A1", "2");

    assert_eq!(engine.interpreter().calls(), 2);
    assert_eq!(num(&engine, "B1"), 3.0);
    assert_eq!(num(&engine, "C1"), 6.0);
    assert_eq!(num(&engine, "E1"), 5.0);
    assert_eq!(engine.last_result().unwrap().computed_vertices, 2);
}

#[test]
fn diamond_reader_is_computed_once() {
    let mut engine = engine();
    set(&mut engine, "A1", "1");
    set(&mut engine, "B1", "=A1+1");
    set(&mut engine, "B2", "=A1*10");
    set(&mut engine, "C1", "=B1+B2");

    engine.interpreter().reset();
    set(&mut engine, "A1", "3");
    assert_eq!(engine.interpreter().calls(), 3);
    assert_eq!(num(&engine, "C1"), 34.0);
}

#[test]
fn cell_contents_are_classified() {
    let mut engine = engine();
    set(&mut engine, "A1", "42");
    set(&mut engine, "A2", "true");
    set(&mut engine, "A3", "hello");
    set(&mut engine, "A4", "=1+");
    set(&mut engine, "A5", "=A1/0");

    assert_eq!(value(&engine, "A1"), CellValue::Number(42.0));
    assert_eq!(value(&engine, "A2"), CellValue::Boolean(true));
    assert_eq!(value(&engine, "A3"), CellValue::from("hello"));
    assert_eq!(value(&engine, "A4").error_kind(), Some(ErrorType::Error));
    assert_eq!(value(&engine, "A5").error_kind(), Some(ErrorType::DivByZero));

    set(&mut engine, "A1", "");
    assert_eq!(value(&engine, "A1"), CellValue::Empty);
    assert_eq!(value(&engine, "A5").error_kind(), Some(ErrorType::DivByZero));
}

#[test]
fn only_finite_decimals_are_typed_as_numbers() {
    let mut engine = engine();
    for (label, text) in [("A1", "nan"), ("A2", "inf"), ("A3", "Infinity"), ("A4", "1e999")] {
        set(&mut engine, label, text);
        assert_eq!(value(&engine, label), CellValue::from(text), "{label}");
    }
    set(&mut engine, "A5", " -1.5e2 ");
    assert_eq!(num(&engine, "A5"), -150.0);
}

#[test]
fn replacing_a_formula_rewires_its_edges() {
    let mut engine = engine();
    set(&mut engine, "A1", "1");
    set(&mut engine, "A2", "2");
    set(&mut engine, "B1", "=A1");
    set(&mut engine, "B1", "=A2*3");
    assert_eq!(num(&engine, "B1"), 6.0);

    engine.interpreter().reset();
    set(&mut engine, "A1", "100");
    assert_eq!(engine.interpreter().calls(), 0);
    assert_eq!(engine.dependencies_of(cell("B1")), vec![Dependency::Cell(cell("A2"))]);
}

#[test]
fn dependencies_list_cells_before_ranges() {
    let mut engine = engine();
    set(&mut engine, "C1", "=SUM(A1:A3)+B1");
    let range = AbsoluteCellRange::new(cell("A1"), cell("A3")).unwrap();
    assert_eq!(
        engine.dependencies_of(cell("C1")),
        vec![Dependency::Cell(cell("B1")), Dependency::Range(range)]
    );
    assert!(engine.dependencies_of(cell("Z9")).is_empty());
}

#[test]
fn range_readers_follow_every_cell_of_the_range() {
    let mut engine = engine();
    for (label, n) in [("A1", "1"), ("A2", "2"), ("A3", "3")] {
        set(&mut engine, label, n);
    }
    set(&mut engine, "B1", "=SUM(A1:A3)");
    set(&mut engine, "B2", "=COUNTBLANK(A1:A4)");
    assert_eq!(num(&engine, "B1"), 6.0);
    assert_eq!(num(&engine, "B2"), 1.0);

    set(&mut engine, "A2", "");
    assert_eq!(num(&engine, "B1"), 4.0);
    assert_eq!(num(&engine, "B2"), 2.0);

    set(&mut engine, "A4", "10");
    assert_eq!(num(&engine, "B2"), 1.0);
}

#[test]
fn ranges_sharing_a_prefix_stay_consistent() {
    let mut engine = engine();
    for (label, n) in [("A1", "1"), ("A2", "2"), ("A3", "3"), ("A4", "4")] {
        set(&mut engine, label, n);
    }
    set(&mut engine, "B1", "=SUM(A1:A3)");
    set(&mut engine, "B2", "=SUM(A1:A4)");
    set(&mut engine, "B3", "=SUM(A1:A2)");
    assert_eq!(num(&engine, "B2"), 10.0);

    set(&mut engine, "A1", "11");
    assert_eq!(num(&engine, "B1"), 16.0);
    assert_eq!(num(&engine, "B2"), 20.0);
    assert_eq!(num(&engine, "B3"), 13.0);
}

#[test]
fn errors_propagate_to_readers() {
    let mut engine = engine();
    set(&mut engine, "A1", "=#N/A");
    set(&mut engine, "B1", "=A1+1");
    set(&mut engine, "C1", "=SUM(A1:A2)");
    assert_eq!(value(&engine, "B1").error_kind(), Some(ErrorType::Na));
    assert_eq!(value(&engine, "C1").error_kind(), Some(ErrorType::Na));
}

#[test]
fn out_of_grid_references_become_ref_errors() {
    let mut engine = engine();
    set(&mut engine, "A1", "=Missing!B2");
    assert_eq!(value(&engine, "A1").error_kind(), Some(ErrorType::Ref));
}

#[test]
fn writes_outside_the_workbook_are_rejected() {
    let mut engine = engine();
    let off_grid = SimpleCellAddress::new(0, 0, u32::MAX);
    assert!(matches!(
        engine.set_value(off_grid, 1.0),
        Err(EngineError::InvalidAddress(_))
    ));
    let unknown_sheet = SimpleCellAddress::new(7, 0, 0);
    assert!(!engine.is_it_possible_to_set_cell(unknown_sheet));
    assert!(engine
        .set_cell_contents(&TestParser, unknown_sheet, "=1")
        .is_err());
}

#[test]
fn recompute_all_evaluates_every_formula() {
    let mut engine = engine();
    set(&mut engine, "A1", "1");
    set(&mut engine, "B1", "=A1");
    set(&mut engine, "B2", "=A1*2");

    engine.interpreter().reset();
    let result = engine.recompute_all();
    assert_eq!(result.computed_vertices, 2);
    assert_eq!(engine.interpreter().calls(), 2);

    // Nothing is dirty afterwards.
    engine.interpreter().reset();
    assert_eq!(engine.recalculate().computed_vertices, 0);
    assert_eq!(engine.interpreter().calls(), 0);
}

#[test]
fn sheet_names_must_be_unique() {
    let mut engine = engine();
    assert!(matches!(
        engine.add_sheet("SHEET1"),
        Err(EngineError::SheetNameTaken(_))
    ));
    let data = engine.add_sheet("Data").unwrap();
    assert_eq!(engine.sheet_id("data"), Some(data));
    assert_eq!(engine.sheet_name(data), Some("Data"));
}
