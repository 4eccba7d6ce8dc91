use gridflow_common::{
    CellAddress, ColumnAddress, MAX_COL, MAX_ROW, RowAddress, SheetId, SimpleCellAddress,
};

use super::{Rewrite, Transformer};

/// Replaces references that resolve outside the grid with `#REF!`.
///
/// Applied once to a freshly parsed formula (a relative reference copied too
/// far left or up), never logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOutOfScopeTransformer;

fn in_grid(index: i64, limit: u32) -> bool {
    (0..=limit as i64).contains(&index)
}

impl Transformer for CleanOutOfScopeTransformer {
    fn sheet(&self) -> SheetId {
        SheetId::MAX
    }

    fn transform_cell(
        &self,
        dependency: &CellAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<CellAddress> {
        match dependency.to_simple(formula) {
            Some(_) => Rewrite::Unchanged,
            None => Rewrite::Ref,
        }
    }

    fn transform_cell_range(
        &self,
        start: &CellAddress,
        end: &CellAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(CellAddress, CellAddress)> {
        if start.to_simple(formula).is_some() && end.to_simple(formula).is_some() {
            Rewrite::Unchanged
        } else {
            Rewrite::Ref
        }
    }

    fn transform_column_range(
        &self,
        start: &ColumnAddress,
        end: &ColumnAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(ColumnAddress, ColumnAddress)> {
        let ok = |c: &ColumnAddress| in_grid(c.col.resolve(formula.col), MAX_COL);
        if ok(start) && ok(end) {
            Rewrite::Unchanged
        } else {
            Rewrite::Ref
        }
    }

    fn transform_row_range(
        &self,
        start: &RowAddress,
        end: &RowAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(RowAddress, RowAddress)> {
        let ok = |r: &RowAddress| in_grid(r.row.resolve(formula.row), MAX_ROW);
        if ok(start) && ok(end) {
            Rewrite::Unchanged
        } else {
            Rewrite::Ref
        }
    }

    fn is_irreversible(&self) -> bool {
        true
    }
}
