//! Column lookups through the column index and the scanning fallback.
use gridflow_common::{AbsoluteCellRange, CellValue};

use super::common::*;
use crate::engine::EvalConfig;
use crate::error::EngineError;
use crate::test_utils::cell;

fn column(from: &str, to: &str) -> AbsoluteCellRange {
    AbsoluteCellRange::new(cell(from), cell(to)).unwrap()
}

fn find(engine: &mut TestEngine, key: impl Into<CellValue>, range: AbsoluteCellRange) -> Option<u32> {
    engine.find_in_column(&key.into(), &range, true).unwrap()
}

fn fill(engine: &mut TestEngine) {
    for (label, n) in [("A1", "100"), ("A2", "200"), ("A3", "200"), ("A4", "200")] {
        set(engine, label, n);
    }
}

#[test]
fn lower_bound_within_the_range() {
    for use_index in [true, false] {
        let mut engine = engine_with(EvalConfig::default().with_column_index(use_index));
        fill(&mut engine);
        assert_eq!(find(&mut engine, 200.0, column("A2", "A4")), Some(1), "index: {use_index}");
        assert_eq!(find(&mut engine, 200.0, column("A3", "A4")), Some(2), "index: {use_index}");
        assert_eq!(find(&mut engine, 300.0, column("A1", "A4")), None, "index: {use_index}");
        assert_eq!(find(&mut engine, 100.0, column("A2", "A4")), None, "index: {use_index}");
    }
}

#[test]
fn unsorted_scan_without_the_index() {
    let mut engine = engine_with(EvalConfig::default().with_column_index(false));
    for (label, text) in [("A1", "pear"), ("A2", "apple"), ("A3", "fig")] {
        set(&mut engine, label, text);
    }
    let key = CellValue::from("apple");
    assert_eq!(engine.find_in_column(&key, &column("A1", "A3"), false).unwrap(), Some(1));
    assert_eq!(engine.find_in_column(&key, &column("A3", "A9"), false).unwrap(), None);
}

#[test]
fn computed_values_are_indexed() {
    let mut engine = engine();
    set(&mut engine, "A1", "2");
    set(&mut engine, "B3", "=A1*150");
    let whole_b = AbsoluteCellRange::columns(0, 1, 1);
    assert_eq!(find(&mut engine, 300.0, whole_b), Some(2));

    set(&mut engine, "A1", "3");
    assert_eq!(find(&mut engine, 300.0, whole_b), None);
    assert_eq!(find(&mut engine, 450.0, whole_b), Some(2));

    set(&mut engine, "B3", "");
    assert_eq!(find(&mut engine, 450.0, whole_b), None);
}

#[test]
fn row_edits_reach_the_index() {
    let mut engine = engine();
    fill(&mut engine);

    engine.add_rows(0, &[(0, 2)]).unwrap();
    assert_eq!(find(&mut engine, 100.0, column("A1", "A9")), Some(2));
    assert_eq!(find(&mut engine, 200.0, column("A1", "A9")), Some(3));

    engine.remove_rows(0, &[(2, 2)]).unwrap();
    assert_eq!(find(&mut engine, 100.0, column("A1", "A9")), None);
    assert_eq!(find(&mut engine, 200.0, column("A1", "A9")), Some(2));
}

#[test]
fn column_edits_and_moves_reach_the_index() {
    let mut engine = engine();
    fill(&mut engine);

    engine.add_columns(0, &[(0, 1)]).unwrap();
    assert_eq!(find(&mut engine, 100.0, column("A1", "A4")), None);
    assert_eq!(find(&mut engine, 100.0, column("B1", "B4")), Some(0));

    engine
        .move_cells(column("B1", "B1"), 1, 5, 0)
        .unwrap();
    assert_eq!(find(&mut engine, 100.0, column("B1", "B9")), None);
    assert_eq!(find(&mut engine, 100.0, column("C1", "C9")), Some(5));
}

#[test]
fn rejects_wide_ranges_and_unknown_sheets() {
    let mut engine = engine();
    let key = CellValue::Number(1.0);
    assert!(matches!(
        engine.find_in_column(&key, &column("A1", "B3"), true),
        Err(EngineError::InvalidRange(_))
    ));
    let elsewhere = AbsoluteCellRange::columns(4, 0, 0);
    assert!(matches!(
        engine.find_in_column(&key, &elsewhere, true),
        Err(EngineError::NoSuchSheet(4))
    ));
}
