use gridflow_common::{
    AxisRef, CellAddress, ColumnAddress, MAX_COL, MAX_ROW, RowAddress, SheetId,
    SimpleCellAddress, Span,
};

use super::{Rewrite, Transformer};
use crate::engine::graph::{Axis, shift_index, shift_interval};

/// Insertion or removal of a block of rows or columns.
///
/// Every reference keeps pointing at the same cell content: targets after the
/// span shift, targets inside a removed span become `#REF!`, and ranges
/// partly inside a removed span shrink. Relative references are re-encoded
/// against the formula's own new position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanTransformer {
    pub axis: Axis,
    pub span: Span,
    pub insert: bool,
}

impl SpanTransformer {
    pub fn add_rows(span: Span) -> Self {
        Self {
            axis: Axis::Rows,
            span,
            insert: true,
        }
    }

    pub fn remove_rows(span: Span) -> Self {
        Self {
            axis: Axis::Rows,
            span,
            insert: false,
        }
    }

    pub fn add_columns(span: Span) -> Self {
        Self {
            axis: Axis::Columns,
            span,
            insert: true,
        }
    }

    pub fn remove_columns(span: Span) -> Self {
        Self {
            axis: Axis::Columns,
            span,
            insert: false,
        }
    }

    fn coordinate(&self, address: SimpleCellAddress) -> u32 {
        match self.axis {
            Axis::Rows => address.row,
            Axis::Columns => address.col,
        }
    }

    fn axis_ref(&self, address: &CellAddress) -> AxisRef {
        match self.axis {
            Axis::Rows => address.row,
            Axis::Columns => address.col,
        }
    }

    fn with_axis_ref(&self, address: &CellAddress, r: AxisRef) -> CellAddress {
        match self.axis {
            Axis::Rows => CellAddress::new(address.sheet, address.col, r),
            Axis::Columns => CellAddress::new(address.sheet, r, address.row),
        }
    }

    fn untouched(&self, dependency_sheet: SheetId, formula: SimpleCellAddress) -> bool {
        dependency_sheet != self.span.sheet && formula.sheet != self.span.sheet
    }

    /// Re-encode one coordinate of a reference to a single cell.
    fn retarget(
        &self,
        r: AxisRef,
        dependency_sheet: SheetId,
        formula: SimpleCellAddress,
    ) -> Option<AxisRef> {
        let target = r.resolve(self.coordinate(formula));
        let target = if dependency_sheet == self.span.sheet {
            shift_index(target, &self.span, self.insert)?
        } else {
            target
        };
        Some(r.retarget(target, self.coordinate(self.fix_node_address(formula))))
    }

    /// Re-encode both ends of an interval, shrinking or dropping it on removal.
    fn retarget_pair(
        &self,
        (a, b): (AxisRef, AxisRef),
        dependency_sheet: SheetId,
        formula: SimpleCellAddress,
    ) -> Rewrite<(AxisRef, AxisRef)> {
        let base = self.coordinate(formula);
        let (first, second) = (a.resolve(base), b.resolve(base));
        let (lo, hi) = (first.min(second), first.max(second));
        let (new_lo, new_hi) = if dependency_sheet == self.span.sheet {
            match shift_interval(lo, hi, &self.span, self.insert) {
                Some(interval) => interval,
                None => return Rewrite::Ref,
            }
        } else {
            (lo, hi)
        };
        let new_base = self.coordinate(self.fix_node_address(formula));
        let (new_first, new_second) = if first <= second {
            (new_lo, new_hi)
        } else {
            (new_hi, new_lo)
        };
        Rewrite::compare(
            &(a, b),
            (a.retarget(new_first, new_base), b.retarget(new_second, new_base)),
        )
    }

    fn limit(&self) -> i64 {
        match self.axis {
            Axis::Rows => MAX_ROW as i64,
            Axis::Columns => MAX_COL as i64,
        }
    }
}

impl Transformer for SpanTransformer {
    fn sheet(&self) -> SheetId {
        self.span.sheet
    }

    fn transform_cell(
        &self,
        dependency: &CellAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<CellAddress> {
        let dependency_sheet = dependency.sheet_at(formula);
        if self.untouched(dependency_sheet, formula) {
            return Rewrite::Unchanged;
        }
        let r = self.axis_ref(dependency);
        match self.retarget(r, dependency_sheet, formula) {
            Some(new) => Rewrite::compare(dependency, self.with_axis_ref(dependency, new)),
            None => Rewrite::Ref,
        }
    }

    fn transform_cell_range(
        &self,
        start: &CellAddress,
        end: &CellAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(CellAddress, CellAddress)> {
        let dependency_sheet = start.sheet_at(formula);
        if self.untouched(dependency_sheet, formula) {
            return Rewrite::Unchanged;
        }
        let base = self.coordinate(formula);
        let pair = (self.axis_ref(start), self.axis_ref(end));
        // A rectangle spanning the whole axis is a whole-column/row range in
        // disguise and is left alone, like the range vertex it maps to.
        let (lo, hi) = (pair.0.resolve(base), pair.1.resolve(base));
        if lo.min(hi) == 0 && lo.max(hi) == self.limit() {
            return Rewrite::Unchanged;
        }
        match self.retarget_pair(pair, dependency_sheet, formula) {
            Rewrite::Unchanged => Rewrite::Unchanged,
            Rewrite::Ref => Rewrite::Ref,
            Rewrite::Replaced((a, b)) => Rewrite::Replaced((
                self.with_axis_ref(start, a),
                self.with_axis_ref(end, b),
            )),
        }
    }

    fn transform_column_range(
        &self,
        start: &ColumnAddress,
        end: &ColumnAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(ColumnAddress, ColumnAddress)> {
        if self.axis == Axis::Rows {
            return Rewrite::Unchanged;
        }
        let dependency_sheet = start.sheet.resolve(formula.sheet);
        if self.untouched(dependency_sheet, formula) {
            return Rewrite::Unchanged;
        }
        match self.retarget_pair((start.col, end.col), dependency_sheet, formula) {
            Rewrite::Unchanged => Rewrite::Unchanged,
            Rewrite::Ref => Rewrite::Ref,
            Rewrite::Replaced((a, b)) => Rewrite::Replaced((
                ColumnAddress::new(start.sheet, a),
                ColumnAddress::new(end.sheet, b),
            )),
        }
    }

    fn transform_row_range(
        &self,
        start: &RowAddress,
        end: &RowAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(RowAddress, RowAddress)> {
        if self.axis == Axis::Columns {
            return Rewrite::Unchanged;
        }
        let dependency_sheet = start.sheet.resolve(formula.sheet);
        if self.untouched(dependency_sheet, formula) {
            return Rewrite::Unchanged;
        }
        match self.retarget_pair((start.row, end.row), dependency_sheet, formula) {
            Rewrite::Unchanged => Rewrite::Unchanged,
            Rewrite::Ref => Rewrite::Ref,
            Rewrite::Replaced((a, b)) => Rewrite::Replaced((
                RowAddress::new(start.sheet, a),
                RowAddress::new(end.sheet, b),
            )),
        }
    }

    fn fix_node_address(&self, address: SimpleCellAddress) -> SimpleCellAddress {
        if address.sheet != self.span.sheet {
            return address;
        }
        // Formulas inside a removed span are deleted with it; keep them put.
        let Some(index) = shift_index(self.coordinate(address) as i64, &self.span, self.insert)
        else {
            return address;
        };
        let index = index.clamp(0, self.limit()) as u32;
        match self.axis {
            Axis::Rows => SimpleCellAddress::new(address.sheet, address.col, index),
            Axis::Columns => SimpleCellAddress::new(address.sheet, index, address.row),
        }
    }

    fn is_irreversible(&self) -> bool {
        !self.insert
    }
}
