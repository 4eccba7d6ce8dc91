//! Structural edits: rows, columns, moves and sheets.
//!
//! Every edit updates the address map eagerly, commits one transformation
//! per span to the lazy log and rewrites array formulas straight away. Other
//! formulas pick the edit up when they are next read.

use gridflow_common::{AbsoluteCellRange, CellValue, SheetId, SimpleCellAddress, Span};

use super::eval::Engine;
use super::evaluator::current_formula;
use super::graph::Axis;
use super::transform::{
    MoveCellsTransformer, RemoveSheetTransformer, RenameSheetTransformer, SpanTransformer,
};
use crate::error::{EngineError, Result};
use crate::traits::Interpreter;

impl<I> Engine<I>
where
    I: Interpreter,
{
    /* ───────────────────────── rows and columns ───────────────────────── */

    pub fn add_rows(&mut self, sheet: SheetId, spans: &[(u32, u32)]) -> Result<()> {
        self.check_add(Axis::Rows, sheet, spans)?;
        self.apply_spans(Axis::Rows, Span::normalize_added(sheet, spans), true);
        Ok(())
    }

    pub fn remove_rows(&mut self, sheet: SheetId, spans: &[(u32, u32)]) -> Result<()> {
        self.check_remove(Axis::Rows, sheet, spans)?;
        self.apply_spans(Axis::Rows, Span::normalize_removed(sheet, spans), false);
        Ok(())
    }

    pub fn add_columns(&mut self, sheet: SheetId, spans: &[(u32, u32)]) -> Result<()> {
        self.check_add(Axis::Columns, sheet, spans)?;
        self.apply_spans(Axis::Columns, Span::normalize_added(sheet, spans), true);
        Ok(())
    }

    pub fn remove_columns(&mut self, sheet: SheetId, spans: &[(u32, u32)]) -> Result<()> {
        self.check_remove(Axis::Columns, sheet, spans)?;
        self.apply_spans(Axis::Columns, Span::normalize_removed(sheet, spans), false);
        Ok(())
    }

    pub fn is_it_possible_to_add_rows(&self, sheet: SheetId, spans: &[(u32, u32)]) -> bool {
        self.check_add(Axis::Rows, sheet, spans).is_ok()
    }

    pub fn is_it_possible_to_remove_rows(&self, sheet: SheetId, spans: &[(u32, u32)]) -> bool {
        self.check_remove(Axis::Rows, sheet, spans).is_ok()
    }

    pub fn is_it_possible_to_add_columns(&self, sheet: SheetId, spans: &[(u32, u32)]) -> bool {
        self.check_add(Axis::Columns, sheet, spans).is_ok()
    }

    pub fn is_it_possible_to_remove_columns(&self, sheet: SheetId, spans: &[(u32, u32)]) -> bool {
        self.check_remove(Axis::Columns, sheet, spans).is_ok()
    }

    fn check_spans(&self, axis: Axis, sheet: SheetId, spans: &[(u32, u32)]) -> Result<()> {
        if !self.sheets.contains(sheet) {
            return Err(EngineError::NoSuchSheet(sheet));
        }
        if spans.is_empty() || spans.iter().any(|&(_, count)| count == 0) {
            return Err(EngineError::NonPositiveSpan);
        }
        if spans.iter().any(|&(start, _)| start > axis.limit()) {
            return Err(EngineError::SheetSizeLimit);
        }
        Ok(())
    }

    fn check_add(&self, axis: Axis, sheet: SheetId, spans: &[(u32, u32)]) -> Result<()> {
        self.check_spans(axis, sheet, spans)?;
        let inserted: u64 = spans.iter().map(|&(_, count)| count as u64).sum();
        let first = spans.iter().map(|&(start, _)| start).min().unwrap_or(0);
        let pushed_off = self.graph.cells_on_sheet(sheet).iter().any(|(a, _)| {
            let index = axis_of(axis, a);
            index >= first && index as u64 + inserted > axis.limit() as u64
        });
        if pushed_off {
            return Err(EngineError::SheetSizeLimit);
        }
        for (_, area) in self.graph.matrices_on(sheet) {
            let (lo, hi) = axis_bounds(axis, &area);
            if spans.iter().any(|&(start, _)| lo < start && start <= hi) {
                return Err(EngineError::MatrixIntersection(area.start));
            }
        }
        Ok(())
    }

    fn check_remove(&self, axis: Axis, sheet: SheetId, spans: &[(u32, u32)]) -> Result<()> {
        self.check_spans(axis, sheet, spans)?;
        for (_, area) in self.graph.matrices_on(sheet) {
            let (lo, hi) = axis_bounds(axis, &area);
            for span in Span::normalize_removed(sheet, spans) {
                let covers_some = span.start <= hi && span.end() >= lo;
                let covers_all = span.start <= lo && span.end() >= hi;
                if covers_some && !covers_all {
                    return Err(EngineError::MatrixIntersection(area.start));
                }
            }
        }
        Ok(())
    }

    fn apply_spans(&mut self, axis: Axis, spans: Vec<Span>, insert: bool) {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("apply_spans", ?axis, insert, spans = spans.len()).entered();

        for span in spans {
            let edit = if insert {
                self.graph.insert_span(axis, span)
            } else {
                self.graph.remove_span(axis, span)
            };
            // Row edits reach the column index lazily through the log.
            let transformer = match (axis, insert) {
                (Axis::Rows, true) => SpanTransformer::add_rows(span),
                (Axis::Rows, false) => SpanTransformer::remove_rows(span),
                (Axis::Columns, true) => {
                    self.column_index.add_columns(span);
                    SpanTransformer::add_columns(span)
                }
                (Axis::Columns, false) => {
                    self.column_index.remove_columns(span);
                    SpanTransformer::remove_columns(span)
                }
            };
            self.lazy.commit(transformer);
            self.absorb(edit);
            self.perform_eager_transformations();
        }
        self.finish_operation();
    }

    /// Bring every array formula up to date with the log.
    fn perform_eager_transformations(&mut self) {
        for id in self.graph.matrix_vertices() {
            current_formula(&mut self.graph, &self.lazy, id);
        }
    }

    /* ───────────────────────────── moves ───────────────────────────── */

    /// Move the content of `source` by `(dx, dy)` onto `to_sheet`. Whatever
    /// sits in the target area is overwritten. Moved formulas that read the
    /// overwritten cells get `#REF!`; other readers see the moved content.
    pub fn move_cells(
        &mut self,
        source: AbsoluteCellRange,
        dx: i64,
        dy: i64,
        to_sheet: SheetId,
    ) -> Result<()> {
        let target = self.check_move(&source, dx, dy, to_sheet)?;

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "move_cells",
            start = %source.start,
            end = %source.end,
            dx,
            dy,
            to_sheet
        ).entered();

        let moved_values: Vec<(SimpleCellAddress, SimpleCellAddress, CellValue)> = self
            .graph
            .cells_in(&source)
            .into_iter()
            .filter_map(|(from, id)| {
                let vertex = self.graph.vertex(id)?;
                if vertex.cell() != Some(from) {
                    return None;
                }
                let to = from.moved(to_sheet, dx, dy)?;
                Some((from, to, vertex.value()?.clone()))
            })
            .collect();

        let edit = self.graph.move_cells(&source, &target);
        for (address, value) in &edit.removed_values {
            self.column_index.remove(&self.lazy, value, *address);
        }
        self.column_index.move_values(&self.lazy, &moved_values);
        self.lazy
            .commit(MoveCellsTransformer::new(source, dx, dy, to_sheet));
        self.absorb(edit);
        self.perform_eager_transformations();
        self.finish_operation();
        Ok(())
    }

    pub fn is_it_possible_to_move_cells(
        &self,
        source: &AbsoluteCellRange,
        dx: i64,
        dy: i64,
        to_sheet: SheetId,
    ) -> bool {
        self.check_move(source, dx, dy, to_sheet).is_ok()
    }

    fn check_move(
        &self,
        source: &AbsoluteCellRange,
        dx: i64,
        dy: i64,
        to_sheet: SheetId,
    ) -> Result<AbsoluteCellRange> {
        for sheet in [source.sheet(), to_sheet] {
            if !self.sheets.contains(sheet) {
                return Err(EngineError::NoSuchSheet(sheet));
            }
        }
        let target = source
            .shifted(to_sheet, dx, dy)
            .ok_or(EngineError::SheetSizeLimit)?;
        for area in [source, &target] {
            for (_, matrix) in self.graph.matrices_on(area.sheet()) {
                if matrix.intersects(area) && !area.contains_range(&matrix) {
                    return Err(EngineError::MatrixIntersection(matrix.start));
                }
            }
        }
        Ok(target)
    }

    /// Move `count` rows from `start` to sit before row `target`.
    pub fn move_rows(&mut self, sheet: SheetId, start: u32, count: u32, target: u32) -> Result<()> {
        self.check_move_span(Axis::Rows, sheet, start, count, target)?;
        self.batch(|engine| {
            engine.add_rows(sheet, &[(target, count)])?;
            let from = if target < start { start + count } else { start };
            let source = AbsoluteCellRange::rows(sheet, from, from + count - 1);
            engine.move_cells(source, 0, target as i64 - from as i64, sheet)?;
            engine.remove_rows(sheet, &[(from, count)])
        })
    }

    /// Move `count` columns from `start` to sit before column `target`.
    pub fn move_columns(&mut self, sheet: SheetId, start: u32, count: u32, target: u32) -> Result<()> {
        self.check_move_span(Axis::Columns, sheet, start, count, target)?;
        self.batch(|engine| {
            engine.add_columns(sheet, &[(target, count)])?;
            let from = if target < start { start + count } else { start };
            let source = AbsoluteCellRange::columns(sheet, from, from + count - 1);
            engine.move_cells(source, target as i64 - from as i64, 0, sheet)?;
            engine.remove_columns(sheet, &[(from, count)])
        })
    }

    pub fn is_it_possible_to_move_rows(&self, sheet: SheetId, start: u32, count: u32, target: u32) -> bool {
        self.check_move_span(Axis::Rows, sheet, start, count, target).is_ok()
    }

    pub fn is_it_possible_to_move_columns(
        &self,
        sheet: SheetId,
        start: u32,
        count: u32,
        target: u32,
    ) -> bool {
        self.check_move_span(Axis::Columns, sheet, start, count, target).is_ok()
    }

    fn check_move_span(&self, axis: Axis, sheet: SheetId, start: u32, count: u32, target: u32) -> Result<()> {
        self.check_spans(axis, sheet, &[(start, count)])?;
        if start as u64 + count as u64 > axis.limit() as u64 + 1 || target > axis.limit() {
            return Err(EngineError::SheetSizeLimit);
        }
        if (start..=start + count).contains(&target) {
            return Err(EngineError::InvalidMoveTarget);
        }
        self.check_add(axis, sheet, &[(target, count)])?;
        let end = start + count - 1;
        for (_, area) in self.graph.matrices_on(sheet) {
            let (lo, hi) = axis_bounds(axis, &area);
            let covers_some = start <= hi && end >= lo;
            let covers_all = start <= lo && end >= hi;
            if covers_some && !covers_all {
                return Err(EngineError::MatrixIntersection(area.start));
            }
        }
        Ok(())
    }

    /* ───────────────────────────── sheets ───────────────────────────── */

    /// Remove a sheet with everything on it. References to it become `#REF!`,
    /// even if a sheet of the same name is added later.
    pub fn remove_sheet(&mut self, sheet: SheetId) -> Result<()> {
        if !self.sheets.contains(sheet) {
            return Err(EngineError::NoSuchSheet(sheet));
        }
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("remove_sheet", sheet).entered();

        self.column_index.remove_sheet(sheet);
        let edit = self.graph.remove_sheet(sheet);
        self.lazy.commit(RemoveSheetTransformer::new(sheet));
        self.sheets.retire(sheet);
        self.absorb(edit);
        self.perform_eager_transformations();
        self.finish_operation();
        Ok(())
    }

    /// Blank every cell of a sheet. References to it stay valid.
    pub fn clear_sheet(&mut self, sheet: SheetId) -> Result<()> {
        if !self.sheets.contains(sheet) {
            return Err(EngineError::NoSuchSheet(sheet));
        }
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("clear_sheet", sheet).entered();

        self.column_index.remove_sheet(sheet);
        let edit = self.graph.clear_sheet(sheet);
        self.absorb(edit);
        self.finish_operation();
        Ok(())
    }

    /// Merge sheet `from` into the empty sheet `to` and retire `from`.
    /// References to `from` now name `to`.
    pub fn rename_sheet(&mut self, from: SheetId, to: SheetId) -> Result<()> {
        self.check_rename(from, to)?;
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("rename_sheet", from, to).entered();

        self.graph.merge_sheet(from, to);
        self.column_index.merge_sheet(&self.lazy, from, to);
        self.lazy.commit(RenameSheetTransformer::new(from, to));
        self.sheets.retire(from);
        self.perform_eager_transformations();
        self.finish_operation();
        Ok(())
    }

    pub fn is_it_possible_to_rename_sheet(&self, from: SheetId, to: SheetId) -> bool {
        self.check_rename(from, to).is_ok()
    }

    fn check_rename(&self, from: SheetId, to: SheetId) -> Result<()> {
        for sheet in [from, to] {
            if !self.sheets.contains(sheet) {
                return Err(EngineError::NoSuchSheet(sheet));
            }
        }
        if from == to || self.graph.has_content_on(to) {
            return Err(EngineError::SheetNotEmpty(to));
        }
        Ok(())
    }
}

fn axis_of(axis: Axis, address: &SimpleCellAddress) -> u32 {
    match axis {
        Axis::Rows => address.row,
        Axis::Columns => address.col,
    }
}

fn axis_bounds(axis: Axis, range: &AbsoluteCellRange) -> (u32, u32) {
    (axis_of(axis, &range.start), axis_of(axis, &range.end))
}
