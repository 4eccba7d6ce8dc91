//! Reference rewriters for structural edits.
//!
//! A [`Transformer`] has one hook per reference kind, each defaulting to
//! [`Rewrite::Unchanged`]. The provided [`Transformer::transform_ast`] walks a
//! tree, calls the hooks and rebuilds only the nodes that changed.

use gridflow_common::{
    Ast, CellAddress, ColumnAddress, RowAddress, SheetId, SimpleCellAddress,
};

mod axis;
mod clean;
mod move_cells;
mod sheets;

pub use axis::SpanTransformer;
pub use clean::CleanOutOfScopeTransformer;
pub use move_cells::MoveCellsTransformer;
pub use sheets::{RemoveSheetTransformer, RenameSheetTransformer};

/// Outcome of rewriting one reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Rewrite<T> {
    Unchanged,
    Replaced(T),
    /// The reference no longer points anywhere; the node becomes `#REF!`.
    Ref,
}

impl<T> Rewrite<T> {
    /// `Unchanged` when `new` equals `old`.
    pub fn compare(old: &T, new: T) -> Self
    where
        T: PartialEq,
    {
        if *old == new {
            Rewrite::Unchanged
        } else {
            Rewrite::Replaced(new)
        }
    }
}

pub trait Transformer {
    /// Sheet the edit happens on.
    fn sheet(&self) -> SheetId;

    fn transform_cell(
        &self,
        _dependency: &CellAddress,
        _formula: SimpleCellAddress,
    ) -> Rewrite<CellAddress> {
        Rewrite::Unchanged
    }

    fn transform_cell_range(
        &self,
        _start: &CellAddress,
        _end: &CellAddress,
        _formula: SimpleCellAddress,
    ) -> Rewrite<(CellAddress, CellAddress)> {
        Rewrite::Unchanged
    }

    fn transform_column_range(
        &self,
        _start: &ColumnAddress,
        _end: &ColumnAddress,
        _formula: SimpleCellAddress,
    ) -> Rewrite<(ColumnAddress, ColumnAddress)> {
        Rewrite::Unchanged
    }

    fn transform_row_range(
        &self,
        _start: &RowAddress,
        _end: &RowAddress,
        _formula: SimpleCellAddress,
    ) -> Rewrite<(RowAddress, RowAddress)> {
        Rewrite::Unchanged
    }

    /// Where a formula at `address` lives after the edit.
    fn fix_node_address(&self, address: SimpleCellAddress) -> SimpleCellAddress {
        address
    }

    /// Whether the edit loses information, so it cannot be undone by its inverse.
    fn is_irreversible(&self) -> bool {
        false
    }

    /// Rewrite a formula's tree and position.
    fn transform_single_ast(
        &self,
        ast: &Ast,
        address: SimpleCellAddress,
    ) -> (Option<Ast>, SimpleCellAddress) {
        (self.transform_ast(ast, address), self.fix_node_address(address))
    }

    /// Rewritten tree, or `None` when no reference in it changed.
    fn transform_ast(&self, ast: &Ast, address: SimpleCellAddress) -> Option<Ast> {
        match ast {
            Ast::CellReference(reference) => match self.transform_cell(reference, address) {
                Rewrite::Unchanged => None,
                Rewrite::Replaced(new) => Some(Ast::CellReference(new)),
                Rewrite::Ref => Some(Ast::ref_error()),
            },
            Ast::CellRange { start, end } => {
                match self.transform_cell_range(start, end, address) {
                    Rewrite::Unchanged => None,
                    Rewrite::Replaced((start, end)) => Some(Ast::CellRange { start, end }),
                    Rewrite::Ref => Some(Ast::ref_error()),
                }
            }
            Ast::ColumnRange { start, end } => {
                match self.transform_column_range(start, end, address) {
                    Rewrite::Unchanged => None,
                    Rewrite::Replaced((start, end)) => Some(Ast::ColumnRange { start, end }),
                    Rewrite::Ref => Some(Ast::ref_error()),
                }
            }
            Ast::RowRange { start, end } => match self.transform_row_range(start, end, address) {
                Rewrite::Unchanged => None,
                Rewrite::Replaced((start, end)) => Some(Ast::RowRange { start, end }),
                Rewrite::Ref => Some(Ast::ref_error()),
            },
            Ast::Function { name, args } => {
                let args = self.transform_all(args, address)?;
                Some(Ast::Function {
                    name: name.clone(),
                    args,
                })
            }
            Ast::Binary { op, left, right } => {
                let new_left = self.transform_ast(left, address);
                let new_right = self.transform_ast(right, address);
                if new_left.is_none() && new_right.is_none() {
                    return None;
                }
                Some(Ast::binary(
                    *op,
                    new_left.unwrap_or_else(|| (**left).clone()),
                    new_right.unwrap_or_else(|| (**right).clone()),
                ))
            }
            Ast::Unary { op, operand } => Some(Ast::Unary {
                op: *op,
                operand: Box::new(self.transform_ast(operand, address)?),
            }),
            Ast::Array(rows) => {
                let mut changed = false;
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    match self.transform_all(row, address) {
                        Some(new_row) => {
                            changed = true;
                            out.push(new_row);
                        }
                        None => out.push(row.clone()),
                    }
                }
                changed.then_some(Ast::Array(out))
            }
            Ast::Number(_) | Ast::Text(_) | Ast::Boolean(_) | Ast::Error(_) => None,
        }
    }

    #[doc(hidden)]
    fn transform_all(&self, nodes: &[Ast], address: SimpleCellAddress) -> Option<Vec<Ast>> {
        let rewritten: Vec<Option<Ast>> = nodes
            .iter()
            .map(|n| self.transform_ast(n, address))
            .collect();
        if rewritten.iter().all(Option::is_none) {
            return None;
        }
        Some(
            rewritten
                .into_iter()
                .zip(nodes)
                .map(|(new, old)| new.unwrap_or_else(|| old.clone()))
                .collect(),
        )
    }
}
