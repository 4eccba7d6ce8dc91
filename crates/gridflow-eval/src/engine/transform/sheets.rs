use gridflow_common::{
    CellAddress, ColumnAddress, RowAddress, SheetId, SheetRef, SimpleCellAddress,
};

use super::{Rewrite, Transformer};

/// Every reference into a removed sheet becomes `#REF!`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveSheetTransformer {
    pub sheet: SheetId,
}

impl RemoveSheetTransformer {
    pub fn new(sheet: SheetId) -> Self {
        Self { sheet }
    }

    fn hits(&self, sheet: SheetRef, formula: SimpleCellAddress) -> bool {
        sheet.resolve(formula.sheet) == self.sheet
    }

    fn rewrite<T>(&self, sheet: SheetRef, formula: SimpleCellAddress) -> Rewrite<T> {
        if self.hits(sheet, formula) {
            Rewrite::Ref
        } else {
            Rewrite::Unchanged
        }
    }
}

impl Transformer for RemoveSheetTransformer {
    fn sheet(&self) -> SheetId {
        self.sheet
    }

    fn transform_cell(
        &self,
        dependency: &CellAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<CellAddress> {
        self.rewrite(dependency.sheet, formula)
    }

    fn transform_cell_range(
        &self,
        start: &CellAddress,
        _end: &CellAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(CellAddress, CellAddress)> {
        self.rewrite(start.sheet, formula)
    }

    fn transform_column_range(
        &self,
        start: &ColumnAddress,
        _end: &ColumnAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(ColumnAddress, ColumnAddress)> {
        self.rewrite(start.sheet, formula)
    }

    fn transform_row_range(
        &self,
        start: &RowAddress,
        _end: &RowAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(RowAddress, RowAddress)> {
        self.rewrite(start.sheet, formula)
    }

    fn is_irreversible(&self) -> bool {
        true
    }
}

/// Folds sheet `from` into sheet `to`: references to `from` now name `to`,
/// and formulas living on `from` move there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameSheetTransformer {
    pub from: SheetId,
    pub to: SheetId,
}

impl RenameSheetTransformer {
    pub fn new(from: SheetId, to: SheetId) -> Self {
        Self { from, to }
    }

    fn renamed(&self, sheet: SheetRef) -> SheetRef {
        match sheet {
            SheetRef::Id(id) if id == self.from => SheetRef::Id(self.to),
            other => other,
        }
    }
}

impl Transformer for RenameSheetTransformer {
    fn sheet(&self) -> SheetId {
        self.from
    }

    fn transform_cell(
        &self,
        dependency: &CellAddress,
        _formula: SimpleCellAddress,
    ) -> Rewrite<CellAddress> {
        let sheet = self.renamed(dependency.sheet);
        Rewrite::compare(dependency, CellAddress::new(sheet, dependency.col, dependency.row))
    }

    fn transform_cell_range(
        &self,
        start: &CellAddress,
        end: &CellAddress,
        formula: SimpleCellAddress,
    ) -> Rewrite<(CellAddress, CellAddress)> {
        let rename = |a: &CellAddress| match self.transform_cell(a, formula) {
            Rewrite::Replaced(new) => new,
            _ => *a,
        };
        Rewrite::compare(&(*start, *end), (rename(start), rename(end)))
    }

    fn transform_column_range(
        &self,
        start: &ColumnAddress,
        end: &ColumnAddress,
        _formula: SimpleCellAddress,
    ) -> Rewrite<(ColumnAddress, ColumnAddress)> {
        Rewrite::compare(
            &(*start, *end),
            (
                ColumnAddress::new(self.renamed(start.sheet), start.col),
                ColumnAddress::new(self.renamed(end.sheet), end.col),
            ),
        )
    }

    fn transform_row_range(
        &self,
        start: &RowAddress,
        end: &RowAddress,
        _formula: SimpleCellAddress,
    ) -> Rewrite<(RowAddress, RowAddress)> {
        Rewrite::compare(
            &(*start, *end),
            (
                RowAddress::new(self.renamed(start.sheet), start.row),
                RowAddress::new(self.renamed(end.sheet), end.row),
            ),
        )
    }

    fn fix_node_address(&self, address: SimpleCellAddress) -> SimpleCellAddress {
        if address.sheet == self.from {
            SimpleCellAddress::new(self.to, address.col, address.row)
        } else {
            address
        }
    }

    fn is_irreversible(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridflow_common::{Ast, AxisRef};

    fn on(sheet: SheetRef) -> CellAddress {
        CellAddress::new(sheet, AxisRef::relative(0), AxisRef::relative(0))
    }

    #[test]
    fn references_into_removed_sheet_become_ref() {
        let t = RemoveSheetTransformer::new(1);
        let formula = SimpleCellAddress::new(0, 0, 0);
        let ast = Ast::function(
            "SUM",
            vec![Ast::CellReference(on(SheetRef::Id(1))), Ast::CellReference(on(SheetRef::Current))],
        );
        let out = t.transform_ast(&ast, formula).unwrap();
        assert_eq!(
            out,
            Ast::function("SUM", vec![Ast::ref_error(), Ast::CellReference(on(SheetRef::Current))])
        );
    }

    #[test]
    fn same_sheet_references_of_removed_sheet_formulas_are_ref_too() {
        let t = RemoveSheetTransformer::new(1);
        let out = t.transform_cell(&on(SheetRef::Current), SimpleCellAddress::new(1, 0, 0));
        assert_eq!(out, Rewrite::Ref);
    }

    #[test]
    fn rename_points_explicit_references_at_the_new_sheet() {
        let t = RenameSheetTransformer::new(2, 5);
        let formula = SimpleCellAddress::new(0, 3, 3);
        assert_eq!(
            t.transform_cell(&on(SheetRef::Id(2)), formula),
            Rewrite::Replaced(on(SheetRef::Id(5)))
        );
        assert_eq!(t.transform_cell(&on(SheetRef::Current), formula), Rewrite::Unchanged);
        assert_eq!(
            t.fix_node_address(SimpleCellAddress::new(2, 1, 1)),
            SimpleCellAddress::new(5, 1, 1)
        );
        assert!(t.is_irreversible());
    }
}
