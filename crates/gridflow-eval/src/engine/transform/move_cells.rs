use gridflow_common::{
    AbsoluteCellRange, AxisRef, CellAddress, ColumnAddress, RowAddress, SheetId, SheetRef,
    SimpleCellAddress,
};

use super::{Rewrite, Transformer};

/// Relocation of the block `source` by `(dx, dy)` onto `to_sheet`.
///
/// Formulas are handled in two groups:
/// - **moved** (inside `source`): references into the block travel with it,
///   references into the cells the block lands on become `#REF!`, and every
///   other reference keeps its absolute target
/// - **dependent** (outside `source`): references into the block follow it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCellsTransformer {
    pub source: AbsoluteCellRange,
    pub dx: i64,
    pub dy: i64,
    pub to_sheet: SheetId,
}

impl MoveCellsTransformer {
    pub fn new(source: AbsoluteCellRange, dx: i64, dy: i64, to_sheet: SheetId) -> Self {
        Self {
            source,
            dx,
            dy,
            to_sheet,
        }
    }

    fn target(&self) -> Option<AbsoluteCellRange> {
        self.source.shifted(self.to_sheet, self.dx, self.dy)
    }

    fn in_source(&self, address: Option<SimpleCellAddress>) -> bool {
        address.is_some_and(|a| self.source.contains(&a))
    }

    fn in_target(&self, address: Option<SimpleCellAddress>) -> bool {
        match (address, self.target()) {
            (Some(a), Some(target)) => target.contains(&a),
            _ => false,
        }
    }

    fn is_moving(&self, formula: SimpleCellAddress) -> bool {
        self.source.contains(&formula)
    }

    /// Sheet reference after the formula holding it left the source sheet.
    fn pinned_sheet(&self, sheet: SheetRef) -> SheetRef {
        match sheet {
            SheetRef::Current if self.to_sheet != self.source.sheet() => {
                SheetRef::Id(self.source.sheet())
            }
            other => other,
        }
    }

    /// Sheet reference to a cell travelling with the formula.
    fn travelling_sheet(&self, sheet: SheetRef) -> SheetRef {
        match sheet {
            SheetRef::Id(id) if id == self.source.sheet() => SheetRef::Id(self.to_sheet),
            other => other,
        }
    }

    fn travel(&self, reference: &CellAddress) -> CellAddress {
        let shifted = reference.shift_absolute(self.dx, self.dy);
        CellAddress::new(self.travelling_sheet(reference.sheet), shifted.col, shifted.row)
    }

    fn stay(&self, reference: &CellAddress) -> CellAddress {
        let shifted = reference.shift_relative(-self.dx, -self.dy);
        CellAddress::new(self.pinned_sheet(reference.sheet), shifted.col, shifted.row)
    }

    fn moved_formula_cell(&self, reference: &CellAddress, formula: SimpleCellAddress) -> Rewrite<CellAddress> {
        let absolute = reference.to_simple(formula);
        if self.in_source(absolute) {
            return Rewrite::compare(reference, self.travel(reference));
        }
        if self.in_target(absolute) {
            return Rewrite::Ref;
        }
        let new = self.stay(reference);
        if new.to_simple(self.fix_node_address(formula)).is_none() {
            return Rewrite::Ref;
        }
        Rewrite::compare(reference, new)
    }

    fn moved_formula_range(
        &self,
        start: &CellAddress,
        end: &CellAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(CellAddress, CellAddress)> {
        let (a, b) = (start.to_simple(formula), end.to_simple(formula));
        if self.in_source(a) && self.in_source(b) {
            return Rewrite::compare(&(*start, *end), (self.travel(start), self.travel(end)));
        }
        if self.in_target(a) || self.in_target(b) {
            return Rewrite::Ref;
        }
        let new = (self.stay(start), self.stay(end));
        let base = self.fix_node_address(formula);
        if new.0.to_simple(base).is_none() || new.1.to_simple(base).is_none() {
            return Rewrite::Ref;
        }
        Rewrite::compare(&(*start, *end), new)
    }

    fn follows(&self, reference: &CellAddress, formula: SimpleCellAddress) -> bool {
        self.in_source(reference.to_simple(formula))
    }

    fn follow(&self, reference: &CellAddress, formula: SimpleCellAddress) -> CellAddress {
        reference.moved(formula.sheet, self.to_sheet, self.dx, self.dy)
    }

    fn shift_axis(&self, r: AxisRef, by: i64, moving: bool) -> AxisRef {
        if moving {
            r.shift_relative(-by)
        } else {
            AxisRef {
                index: r.index + by,
                absolute: r.absolute,
            }
        }
    }

    fn whole_axis_sheet(&self, sheet: SheetRef, formula: SimpleCellAddress, moving: bool) -> SheetRef {
        if moving {
            self.pinned_sheet(sheet)
        } else if sheet == SheetRef::Current && self.to_sheet == formula.sheet {
            SheetRef::Current
        } else {
            SheetRef::Id(self.to_sheet)
        }
    }
}

impl Transformer for MoveCellsTransformer {
    fn sheet(&self) -> SheetId {
        self.source.sheet()
    }

    fn transform_cell(
        &self,
        dependency: &CellAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<CellAddress> {
        if self.is_moving(formula) {
            return self.moved_formula_cell(dependency, formula);
        }
        if self.follows(dependency, formula) {
            return Rewrite::compare(dependency, self.follow(dependency, formula));
        }
        Rewrite::Unchanged
    }

    fn transform_cell_range(
        &self,
        start: &CellAddress,
        end: &CellAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(CellAddress, CellAddress)> {
        if self.is_moving(formula) {
            return self.moved_formula_range(start, end, formula);
        }
        if self.follows(start, formula) && self.follows(end, formula) {
            return Rewrite::compare(
                &(*start, *end),
                (self.follow(start, formula), self.follow(end, formula)),
            );
        }
        Rewrite::Unchanged
    }

    fn transform_column_range(
        &self,
        start: &ColumnAddress,
        end: &ColumnAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(ColumnAddress, ColumnAddress)> {
        let moving = self.is_moving(formula);
        if !moving {
            // Whole columns only travel when the moved block is whole columns.
            let sheet = start.sheet.resolve(formula.sheet);
            let inside = |c: &ColumnAddress| {
                let col = c.col.resolve(formula.col);
                col >= 0 && self.source.col_in_range(col as u32)
            };
            if sheet != self.source.sheet()
                || !self.source.is_whole_columns()
                || !inside(start)
                || !inside(end)
            {
                return Rewrite::Unchanged;
            }
        }
        let shift = |c: &ColumnAddress| {
            ColumnAddress::new(
                self.whole_axis_sheet(c.sheet, formula, moving),
                self.shift_axis(c.col, self.dx, moving),
            )
        };
        Rewrite::compare(&(*start, *end), (shift(start), shift(end)))
    }

    fn transform_row_range(
        &self,
        start: &RowAddress,
        end: &RowAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(RowAddress, RowAddress)> {
        let moving = self.is_moving(formula);
        if !moving {
            let sheet = start.sheet.resolve(formula.sheet);
            let inside = |r: &RowAddress| {
                let row = r.row.resolve(formula.row);
                row >= 0 && self.source.row_in_range(row as u32)
            };
            if sheet != self.source.sheet()
                || !self.source.is_whole_rows()
                || !inside(start)
                || !inside(end)
            {
                return Rewrite::Unchanged;
            }
        }
        let shift = |r: &RowAddress| {
            RowAddress::new(
                self.whole_axis_sheet(r.sheet, formula, moving),
                self.shift_axis(r.row, self.dy, moving),
            )
        };
        Rewrite::compare(&(*start, *end), (shift(start), shift(end)))
    }

    fn fix_node_address(&self, address: SimpleCellAddress) -> SimpleCellAddress {
        if !self.is_moving(address) {
            return address;
        }
        address
            .moved(self.to_sheet, self.dx, self.dy)
            .unwrap_or(address)
    }

    fn is_irreversible(&self) -> bool {
        true
    }
}
